//! Single-entity profile use-cases.
//!
//! # Responsibility
//! - Update settings and delete skills through the transaction coordinator.
//! - Record one audit entry per committed mutation.
//! - Serve a read-only snapshot of a user's whole profile.
//!
//! # Invariants
//! - Audit entries are recorded only after the mutation committed.
//! - A skill owned by another user is reported as not found.

use crate::audit::{snapshot, AuditEvent, AuditRecorder};
use crate::model::audit::AuditAction;
use crate::model::profile::{
    Education, EntityId, Experience, Profile, Project, Settings, SettingsPatch, Skill,
};
use crate::repo::audit_repo::SqliteAuditRepository;
use crate::repo::entry_repo::{EntryRepository, SqliteEntryRepository};
use crate::repo::profile_repo::{ProfileRepository, SqliteProfileRepository};
use crate::repo::RepoError;
use crate::request_context::RequestContext;
use crate::tx::{TransactionCoordinator, TxError};
use rusqlite::Connection;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ProfileServiceError {
    InvalidUser,
    NotFound { entity: &'static str, id: String },
    Tx(TxError),
    Repo(RepoError),
}

impl ProfileServiceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Tx(err) if err.is_retryable())
    }
}

impl Display for ProfileServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUser => write!(f, "user id cannot be empty"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Tx(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ProfileServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Tx(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TxError> for ProfileServiceError {
    fn from(value: TxError) -> Self {
        match value {
            TxError::Repo(RepoError::NotFound { entity, id }) => Self::NotFound { entity, id },
            other => Self::Tx(other),
        }
    }
}

impl From<RepoError> for ProfileServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Repo(other),
        }
    }
}

/// Everything stored for one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSnapshot {
    pub profile: Option<Profile>,
    pub settings: Option<Settings>,
    pub experiences: Vec<Experience>,
    pub educations: Vec<Education>,
    pub skills: Vec<Skill>,
    pub projects: Vec<Project>,
}

pub struct ProfileService {
    coordinator: TransactionCoordinator,
}

impl ProfileService {
    pub fn new(coordinator: TransactionCoordinator) -> Self {
        Self { coordinator }
    }

    /// Applies `patch` to the user's settings, creating them when absent.
    ///
    /// Records `UPDATE` with a before/after diff, or `CREATE` for a first write.
    pub fn update_settings(
        &self,
        conn: &mut Connection,
        user_id: &str,
        patch: &SettingsPatch,
        ctx: &RequestContext,
    ) -> Result<Settings, ProfileServiceError> {
        let user_id = require_user(user_id)?;
        let (before, after) = self.coordinator.run_with_retry(conn, None, |tx| {
            let repo = SqliteProfileRepository::new(tx);
            let before = repo.get_settings(user_id)?;
            let mut after = before.clone().unwrap_or_else(|| Settings::new(user_id));
            patch.apply(&mut after);
            repo.upsert_settings(&after)?;
            Ok((before, after))
        })?;

        let event = match &before {
            Some(before) => AuditEvent::new(AuditAction::Update, "Settings")
                .old_values(snapshot(before))
                .new_values(snapshot(&after)),
            None => AuditEvent::new(AuditAction::Create, "Settings").new_values(snapshot(&after)),
        };
        audit(conn, event.entity_id(user_id).context(ctx).default_actor(user_id));
        Ok(after)
    }

    /// Deletes one skill and returns it.
    ///
    /// # Errors
    /// - `NotFound` when the skill does not exist for `user_id`.
    pub fn delete_skill(
        &self,
        conn: &mut Connection,
        user_id: &str,
        skill_id: EntityId,
        ctx: &RequestContext,
    ) -> Result<Skill, ProfileServiceError> {
        let user_id = require_user(user_id)?;
        let deleted = self.coordinator.run_with_retry(conn, None, |tx| {
            let repo = SqliteEntryRepository::new(tx);
            let skill = repo
                .get_skill(user_id, skill_id)?
                .ok_or_else(|| RepoError::NotFound {
                    entity: "Skill",
                    id: skill_id.to_string(),
                })?;
            repo.delete_skill(user_id, skill_id)?;
            Ok(skill)
        })?;

        audit(
            conn,
            AuditEvent::new(AuditAction::Delete, "Skill")
                .entity_id(skill_id.to_string())
                .old_values(snapshot(&deleted))
                .context(ctx)
                .default_actor(user_id),
        );
        Ok(deleted)
    }

    /// Reads profile, settings and every entry collection for `user_id`.
    pub fn get_profile_snapshot(
        &self,
        conn: &Connection,
        user_id: &str,
    ) -> Result<ProfileSnapshot, ProfileServiceError> {
        let user_id = require_user(user_id)?;
        let profiles = SqliteProfileRepository::new(conn);
        let entries = SqliteEntryRepository::new(conn);
        Ok(ProfileSnapshot {
            profile: profiles.get_profile(user_id)?,
            settings: profiles.get_settings(user_id)?,
            experiences: entries.list_experiences(user_id)?,
            educations: entries.list_educations(user_id)?,
            skills: entries.list_skills(user_id)?,
            projects: entries.list_projects(user_id)?,
        })
    }
}

fn require_user(user_id: &str) -> Result<&str, ProfileServiceError> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() {
        return Err(ProfileServiceError::InvalidUser);
    }
    Ok(trimmed)
}

fn audit(conn: &Connection, event: AuditEvent) {
    AuditRecorder::new(SqliteAuditRepository::new(conn)).record(event);
}
