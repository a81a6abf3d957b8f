//! Field value sanitization applied before anything reaches storage.
//!
//! # Responsibility
//! - Escape HTML in free text and normalize whitespace in plain text.
//! - Parse URLs and gate them through a protocol allow-list.
//! - Coerce loosely typed numbers and booleans into clamped values.
//!
//! # Invariants
//! - Sanitizers are pure; they never touch the store.
//! - A rejected URL yields `None`, never a partially cleaned value.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use url::Url;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));
const BLOCKED_SCHEMES: &[&str] = &["javascript", "data", "vbscript", "file"];
const ALLOWED_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Value sanitization contract consumed by the importer and services.
pub trait Sanitizer {
    /// Plain single-line text: HTML-escaped, whitespace collapsed, trimmed.
    fn sanitize_text(&self, value: &str) -> String;
    /// Free-form text: HTML-escaped, line structure preserved.
    fn sanitize_rich_text(&self, value: &str) -> String;
    /// Returns a safe absolute URL, or `None` when the value is rejected.
    fn sanitize_url(&self, value: &str) -> Option<String>;
    /// Coerces `value` to a number clamped to `min..=max`.
    ///
    /// Missing or non-numeric input yields `default`.
    fn sanitize_number(&self, value: &Value, min: f64, max: f64, default: Option<f64>)
        -> Option<f64>;
    /// Coerces `value` to a boolean, falling back to `default`.
    fn sanitize_boolean(&self, value: &Value, default: bool) -> bool;
}

/// Sanitizer used when callers do not inject their own.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSanitizer;

impl Sanitizer for DefaultSanitizer {
    fn sanitize_text(&self, value: &str) -> String {
        let collapsed = WHITESPACE_RE.replace_all(value.trim(), " ");
        escape_html(&collapsed)
    }

    fn sanitize_rich_text(&self, value: &str) -> String {
        escape_html(value.trim())
    }

    fn sanitize_url(&self, value: &str) -> Option<String> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.chars().any(|c| c.is_whitespace() || "<>\"'`".contains(c))
        {
            return None;
        }
        if let Some(rest) = trimmed.strip_prefix("//") {
            return self.sanitize_url(&format!("https://{rest}"));
        }

        match Url::parse(trimmed) {
            Ok(url) if BLOCKED_SCHEMES.contains(&url.scheme()) => None,
            Ok(url) if ALLOWED_SCHEMES.contains(&url.scheme()) => accept_url(url),
            _ if trimmed.contains("://") => None,
            // Bare domains, including `host:port`, which parses as a scheme.
            _ => Url::parse(&format!("https://{trimmed}"))
                .ok()
                .filter(|url| {
                    url.host_str()
                        .is_some_and(|host| host == "localhost" || host.contains('.'))
                })
                .map(String::from),
        }
    }

    fn sanitize_number(
        &self,
        value: &Value,
        min: f64,
        max: f64,
        default: Option<f64>,
    ) -> Option<f64> {
        let parsed = match value {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        };
        match parsed {
            Some(number) if number.is_finite() => Some(number.clamp(min, max)),
            _ => default,
        }
    }

    fn sanitize_boolean(&self, value: &Value, default: bool) -> bool {
        match value {
            Value::Bool(flag) => *flag,
            Value::Number(number) => number.as_f64().map_or(default, |n| n != 0.0),
            Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => true,
                "false" | "no" | "n" | "0" => false,
                _ => default,
            },
            _ => default,
        }
    }
}

fn accept_url(url: Url) -> Option<String> {
    let usable = match url.scheme() {
        "mailto" => !url.path().is_empty(),
        _ => url.host_str().is_some_and(|host| !host.is_empty()),
    };
    usable.then(|| String::from(url))
}

/// Escapes the five HTML-significant characters.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::{DefaultSanitizer, Sanitizer};
    use serde_json::{json, Value};

    #[test]
    fn text_is_escaped_and_whitespace_collapsed() {
        let sanitizer = DefaultSanitizer;
        assert_eq!(
            sanitizer.sanitize_text("  <b>Senior</b>\n\t Engineer  "),
            "&lt;b&gt;Senior&lt;/b&gt; Engineer"
        );
    }

    #[test]
    fn rich_text_keeps_line_structure() {
        let sanitizer = DefaultSanitizer;
        assert_eq!(
            sanitizer.sanitize_rich_text("Built A & B\n- shipped"),
            "Built A &amp; B\n- shipped"
        );
    }

    #[test]
    fn url_rejects_dangerous_schemes() {
        let sanitizer = DefaultSanitizer;
        for url in [
            "javascript:alert(1)",
            "JAVASCRIPT:alert(1)",
            "data:text/html;base64,xyz",
            "vbscript:msgbox",
            "file:///etc/passwd",
            "ftp://example.com",
            "not a url",
        ] {
            assert_eq!(sanitizer.sanitize_url(url), None, "{url} should be rejected");
        }
    }

    #[test]
    fn url_prefixes_bare_domains_and_keeps_http() {
        let sanitizer = DefaultSanitizer;
        assert_eq!(
            sanitizer.sanitize_url("github.com/octo/repo").as_deref(),
            Some("https://github.com/octo/repo")
        );
        assert_eq!(
            sanitizer.sanitize_url("example.com:8080/x").as_deref(),
            Some("https://example.com:8080/x")
        );
        assert_eq!(
            sanitizer.sanitize_url("HTTP://example.com").as_deref(),
            Some("http://example.com/")
        );
        assert_eq!(
            sanitizer.sanitize_url("//cdn.example.org/a.js").as_deref(),
            Some("https://cdn.example.org/a.js")
        );
        assert_eq!(
            sanitizer.sanitize_url("https://localhost:3000/app").as_deref(),
            Some("https://localhost:3000/app")
        );
        assert_eq!(
            sanitizer.sanitize_url("localhost:3000").as_deref(),
            Some("https://localhost:3000/")
        );
        assert_eq!(
            sanitizer.sanitize_url("https://bücher.de/x").as_deref(),
            Some("https://xn--bcher-kva.de/x")
        );
        assert_eq!(
            sanitizer.sanitize_url("https://user@github.com/o/r").as_deref(),
            Some("https://user@github.com/o/r")
        );
        assert_eq!(
            sanitizer.sanitize_url("https://my_site.example.com").as_deref(),
            Some("https://my_site.example.com/")
        );
        assert_eq!(
            sanitizer.sanitize_url("mailto:ada@example.com").as_deref(),
            Some("mailto:ada@example.com")
        );
    }

    #[test]
    fn url_without_usable_host_is_rejected() {
        let sanitizer = DefaultSanitizer;
        for url in ["http://", "https://", "Analyst", "mailto:"] {
            assert_eq!(sanitizer.sanitize_url(url), None, "{url} should be rejected");
        }
    }

    #[test]
    fn number_is_clamped_with_default_fallback() {
        let sanitizer = DefaultSanitizer;
        assert_eq!(sanitizer.sanitize_number(&json!(4.7), 0.0, 4.0, None), Some(4.0));
        assert_eq!(sanitizer.sanitize_number(&json!("3.5"), 0.0, 4.0, None), Some(3.5));
        assert_eq!(sanitizer.sanitize_number(&json!(-2), 0.0, 100.0, Some(0.0)), Some(0.0));
        assert_eq!(sanitizer.sanitize_number(&json!("n/a"), 0.0, 4.0, None), None);
        assert_eq!(sanitizer.sanitize_number(&Value::Null, 0.0, 4.0, Some(1.0)), Some(1.0));
    }

    #[test]
    fn boolean_accepts_common_spellings() {
        let sanitizer = DefaultSanitizer;
        assert!(sanitizer.sanitize_boolean(&json!("Yes"), false));
        assert!(!sanitizer.sanitize_boolean(&json!(0), true));
        assert!(sanitizer.sanitize_boolean(&json!("maybe"), true));
        assert!(!sanitizer.sanitize_boolean(&Value::Null, false));
    }
}
