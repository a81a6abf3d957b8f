//! Request metadata carried into audited mutations.
//!
//! Built by the transport layer from inbound headers and passed explicitly
//! into importer and service calls.

use serde::Serialize;
use uuid::Uuid;

const MAX_USER_AGENT_CHARS: usize = 512;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub actor_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    /// Correlation id; generated when the caller supplies none.
    pub request_id: String,
}

impl RequestContext {
    /// Context for work that did not originate from a request.
    pub fn system() -> Self {
        Self {
            request_id: generate_request_id(),
            ..Self::default()
        }
    }

    /// Builds a context from header name/value pairs.
    ///
    /// Header names are matched case-insensitively. The client IP is the first
    /// `x-forwarded-for` hop, falling back to `x-real-ip`.
    pub fn from_headers<'a>(headers: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut forwarded_for = None;
        let mut real_ip = None;
        let mut user_agent = None;
        let mut request_id = None;

        for (name, value) in headers {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match name.trim().to_ascii_lowercase().as_str() {
                "x-forwarded-for" => {
                    forwarded_for = value
                        .split(',')
                        .map(str::trim)
                        .find(|hop| !hop.is_empty())
                        .map(str::to_string);
                }
                "x-real-ip" => real_ip = Some(value.to_string()),
                "user-agent" => {
                    user_agent = Some(value.chars().take(MAX_USER_AGENT_CHARS).collect());
                }
                "x-request-id" => request_id = Some(value.to_string()),
                _ => {}
            }
        }

        Self {
            actor_id: None,
            ip_address: forwarded_for.or(real_ip),
            user_agent,
            request_id: request_id.unwrap_or_else(generate_request_id),
        }
    }

    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }
}

/// Generates `req_<hex epoch ms>_<8 hex chars>`.
pub fn generate_request_id() -> String {
    let millis = crate::model::now_epoch_ms().max(0);
    let random = Uuid::new_v4().simple().to_string();
    format!("req_{millis:x}_{}", &random[..8])
}
