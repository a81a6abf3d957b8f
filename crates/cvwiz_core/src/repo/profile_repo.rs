//! Profile and settings repository.
//!
//! # Invariants
//! - One `profiles` row and one `settings` row per user.
//! - Profile upserts never clear a stored field with an absent value.

use crate::model::profile::{Profile, ResumeTemplate, Settings, ValidationError};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::{Map, Value};

pub trait ProfileRepository {
    /// Inserts or merges profile fields; returns the stored row.
    fn upsert_profile(&self, profile: &Profile) -> RepoResult<Profile>;
    fn get_profile(&self, user_id: &str) -> RepoResult<Option<Profile>>;
    /// Inserts or replaces the user's settings row.
    fn upsert_settings(&self, settings: &Settings) -> RepoResult<()>;
    fn get_settings(&self, user_id: &str) -> RepoResult<Option<Settings>>;
}

pub struct SqliteProfileRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProfileRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ProfileRepository for SqliteProfileRepository<'_> {
    fn upsert_profile(&self, profile: &Profile) -> RepoResult<Profile> {
        if profile.user_id.trim().is_empty() {
            return Err(ValidationError::EmptyUserId.into());
        }

        self.conn.execute(
            "INSERT INTO profiles (user_id, name, summary, email, phone, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user_id) DO UPDATE SET
                name = COALESCE(excluded.name, profiles.name),
                summary = COALESCE(excluded.summary, profiles.summary),
                email = COALESCE(excluded.email, profiles.email),
                phone = COALESCE(excluded.phone, profiles.phone),
                updated_at = excluded.updated_at;",
            params![
                profile.user_id.as_str(),
                profile.name.as_deref(),
                profile.summary.as_deref(),
                profile.email.as_deref(),
                profile.phone.as_deref(),
                profile.updated_at,
            ],
        )?;

        self.get_profile(&profile.user_id)?
            .ok_or_else(|| RepoError::NotFound {
                entity: "Profile",
                id: profile.user_id.clone(),
            })
    }

    fn get_profile(&self, user_id: &str) -> RepoResult<Option<Profile>> {
        self.conn
            .query_row(
                "SELECT user_id, name, summary, email, phone, updated_at
                 FROM profiles
                 WHERE user_id = ?1;",
                [user_id],
                |row| {
                    Ok(Profile {
                        user_id: row.get("user_id")?,
                        name: row.get("name")?,
                        summary: row.get("summary")?,
                        email: row.get("email")?,
                        phone: row.get("phone")?,
                        updated_at: row.get("updated_at")?,
                    })
                },
            )
            .optional()
            .map_err(RepoError::from)
    }

    fn upsert_settings(&self, settings: &Settings) -> RepoResult<()> {
        if settings.user_id.trim().is_empty() {
            return Err(ValidationError::EmptyUserId.into());
        }
        let preferences = serde_json::to_string(&settings.resume_preferences)
            .map_err(|err| RepoError::InvalidData(format!("cannot encode preferences: {err}")))?;

        self.conn.execute(
            "INSERT INTO settings (user_id, selected_template, resume_preferences, updated_at)
             VALUES (?1, ?2, ?3, (strftime('%s', 'now') * 1000))
             ON CONFLICT(user_id) DO UPDATE SET
                selected_template = excluded.selected_template,
                resume_preferences = excluded.resume_preferences,
                updated_at = excluded.updated_at;",
            params![
                settings.user_id.as_str(),
                settings.selected_template.as_str(),
                preferences,
            ],
        )?;
        Ok(())
    }

    fn get_settings(&self, user_id: &str) -> RepoResult<Option<Settings>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, selected_template, resume_preferences
             FROM settings
             WHERE user_id = ?1;",
        )?;
        let mut rows = stmt.query([user_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_settings_row(row)?)),
            None => Ok(None),
        }
    }
}

fn parse_settings_row(row: &Row<'_>) -> RepoResult<Settings> {
    let template_text: String = row.get("selected_template")?;
    let selected_template = ResumeTemplate::parse(&template_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid template `{template_text}` in settings.selected_template"
        ))
    })?;

    let preferences_text: String = row.get("resume_preferences")?;
    let resume_preferences = match serde_json::from_str::<Value>(&preferences_text) {
        Ok(Value::Object(map)) => map,
        Ok(Value::Null) => Map::new(),
        _ => {
            return Err(RepoError::InvalidData(
                "settings.resume_preferences is not a json object".to_string(),
            ))
        }
    };

    Ok(Settings {
        user_id: row.get("user_id")?,
        selected_template,
        resume_preferences,
    })
}
