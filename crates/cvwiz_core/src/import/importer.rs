//! Batch importer: one coordinator invocation per extracted profile.

use super::dedup::SkillDedupSet;
use super::normalize::ImportBatch;
use super::raw::RawProfile;
use super::{EntityGroup, ImportReport, RecordOutcome, RecordReport};
use crate::audit::{snapshot, AuditEvent, AuditRecorder};
use crate::config::CoreConfig;
use crate::model::audit::{AuditAction, JsonMap};
use crate::model::now_epoch_ms;
use crate::model::profile::{Education, Experience, Profile, Project, Settings, Skill};
use crate::repo::audit_repo::SqliteAuditRepository;
use crate::repo::entry_repo::{EntryRepository, SqliteEntryRepository};
use crate::repo::profile_repo::{ProfileRepository, SqliteProfileRepository};
use crate::request_context::RequestContext;
use crate::sanitize::{DefaultSanitizer, Sanitizer};
use crate::tx::{TransactionCoordinator, TxError, TxOptions, TxResult};
use log::{error, info};
use rusqlite::{Connection, Transaction};
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

#[derive(Debug)]
pub enum ImportError {
    /// The target user id is empty.
    InvalidUser,
    /// The top-level input is not a JSON object.
    MalformedInput,
    Tx(TxError),
}

impl ImportError {
    /// Whether the same import may succeed when submitted again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Tx(err) => err.is_retryable(),
            Self::InvalidUser | Self::MalformedInput => false,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidUser => "import_invalid_user",
            Self::MalformedInput => "import_malformed_input",
            Self::Tx(err) => err.code(),
        }
    }
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUser => write!(f, "import requires a non-empty user id"),
            Self::MalformedInput => write!(f, "import input must be a JSON object"),
            Self::Tx(err) => write!(f, "import failed: {err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Tx(err) => Some(err),
            Self::InvalidUser | Self::MalformedInput => None,
        }
    }
}

impl From<TxError> for ImportError {
    fn from(value: TxError) -> Self {
        Self::Tx(value)
    }
}

/// Skills written by one import, plus the names skipped as duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillImport {
    pub created: Vec<Skill>,
    pub duplicates: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportCounts {
    pub experiences: usize,
    pub educations: usize,
    pub skills: usize,
    pub projects: usize,
    pub duplicates: usize,
    pub dropped: usize,
}

/// Everything one committed import wrote, with per-record outcomes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub profile: Option<Profile>,
    pub settings: Option<Settings>,
    pub experiences: Vec<Experience>,
    pub educations: Vec<Education>,
    pub skills: SkillImport,
    pub projects: Vec<Project>,
    pub counts: ImportCounts,
    pub report: ImportReport,
}

impl ImportResult {
    /// Records that were dropped before reaching the store.
    pub fn dropped(&self) -> impl Iterator<Item = &RecordReport> {
        self.report.dropped()
    }
}

/// Imports extracted profiles atomically.
pub struct BatchImporter<S: Sanitizer = DefaultSanitizer> {
    coordinator: TransactionCoordinator,
    sanitizer: S,
    options: TxOptions,
}

impl BatchImporter<DefaultSanitizer> {
    pub fn new(coordinator: TransactionCoordinator) -> Self {
        Self::with_sanitizer(coordinator, DefaultSanitizer)
    }

    /// Builds an importer with the configured retry policy and import options.
    pub fn from_config(config: &CoreConfig) -> Self {
        let coordinator = TransactionCoordinator::new(config.tx.clone(), config.retry);
        Self::new(coordinator).with_options(config.import_tx.clone())
    }
}

impl<S: Sanitizer> BatchImporter<S> {
    pub fn with_sanitizer(coordinator: TransactionCoordinator, sanitizer: S) -> Self {
        Self {
            coordinator,
            sanitizer,
            options: TxOptions::extended().named("import_batch"),
        }
    }

    pub fn with_options(mut self, options: TxOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &TxOptions {
        &self.options
    }

    /// Imports a profile given as arbitrary JSON.
    pub fn import_value(
        &self,
        conn: &mut Connection,
        user_id: &str,
        value: &Value,
        ctx: &RequestContext,
    ) -> Result<ImportResult, ImportError> {
        let raw = RawProfile::from_value(value).ok_or(ImportError::MalformedInput)?;
        self.import_batch(conn, user_id, raw, ctx)
    }

    /// Normalizes `raw` and persists every accepted record in one transaction.
    ///
    /// Contention is retried per the coordinator's policy; each attempt
    /// re-reads the persisted skill names. After commit one `IMPORT` audit
    /// entry is recorded on a best-effort basis.
    ///
    /// # Errors
    /// - `InvalidUser` for a blank `user_id`.
    /// - `Tx` when the transaction failed; nothing was written.
    pub fn import_batch(
        &self,
        conn: &mut Connection,
        user_id: &str,
        raw: RawProfile,
        ctx: &RequestContext,
    ) -> Result<ImportResult, ImportError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(ImportError::InvalidUser);
        }

        let started_at = Instant::now();
        let batch = ImportBatch::normalize(raw, user_id, &self.sanitizer, now_epoch_ms());
        info!(
            "event=import_batch module=import status=start request_id={} candidates={} dropped={}",
            ctx.request_id,
            batch.candidate_count(),
            batch.report.records.len()
        );

        let result = match self
            .coordinator
            .run_with_retry(conn, Some(&self.options), |tx| write_batch(tx, &batch))
        {
            Ok(result) => result,
            Err(err) => {
                error!(
                    "event=import_batch module=import status=error request_id={} duration_ms={} error_code={} retryable={}",
                    ctx.request_id,
                    started_at.elapsed().as_millis(),
                    err.code(),
                    err.is_retryable()
                );
                return Err(err.into());
            }
        };

        info!(
            "event=import_batch module=import status=ok request_id={} duration_ms={} experiences={} educations={} skills={} projects={} duplicates={} dropped={}",
            ctx.request_id,
            started_at.elapsed().as_millis(),
            result.counts.experiences,
            result.counts.educations,
            result.counts.skills,
            result.counts.projects,
            result.counts.duplicates,
            result.counts.dropped
        );

        AuditRecorder::new(SqliteAuditRepository::new(conn)).record(import_event(user_id, &result, ctx));
        Ok(result)
    }
}

/// Writes one batch. Runs once per transaction attempt.
fn write_batch(tx: &Transaction<'_>, batch: &ImportBatch) -> TxResult<ImportResult> {
    let profiles = SqliteProfileRepository::new(tx);
    let entries = SqliteEntryRepository::new(tx);
    let mut report = batch.report.clone();

    let profile = match &batch.profile {
        Some(profile) => Some(profiles.upsert_profile(profile)?),
        None => None,
    };
    let settings = match &batch.settings {
        Some(patch) => {
            let mut settings = profiles
                .get_settings(&batch.user_id)?
                .unwrap_or_else(|| Settings::new(batch.user_id.as_str()));
            patch.apply(&mut settings);
            profiles.upsert_settings(&settings)?;
            Some(settings)
        }
        None => None,
    };

    let mut experiences = Vec::with_capacity(batch.experiences.len());
    for (index, experience) in &batch.experiences {
        entries.create_experience(experience)?;
        report.push(EntityGroup::Experience, *index, RecordOutcome::Accepted);
        experiences.push(experience.clone());
    }

    let mut educations = Vec::with_capacity(batch.educations.len());
    for (index, education) in &batch.educations {
        entries.create_education(education)?;
        report.push(EntityGroup::Education, *index, RecordOutcome::Accepted);
        educations.push(education.clone());
    }

    let mut dedup = SkillDedupSet::from_names(entries.list_skill_names(&batch.user_id)?);
    let mut skills = SkillImport::default();
    for (index, skill) in &batch.skills {
        if !dedup.admit(&skill.name) {
            report.push(EntityGroup::Skill, *index, RecordOutcome::Duplicate);
            skills.duplicates.push(skill.name.clone());
            continue;
        }
        entries.create_skill(skill)?;
        report.push(EntityGroup::Skill, *index, RecordOutcome::Accepted);
        skills.created.push(skill.clone());
    }

    let mut projects = Vec::with_capacity(batch.projects.len());
    for (index, project) in &batch.projects {
        entries.create_project(project)?;
        report.push(EntityGroup::Project, *index, RecordOutcome::Accepted);
        projects.push(project.clone());
    }

    let counts = ImportCounts {
        experiences: experiences.len(),
        educations: educations.len(),
        skills: skills.created.len(),
        projects: projects.len(),
        duplicates: skills.duplicates.len(),
        dropped: report.dropped().count(),
    };

    Ok(ImportResult {
        profile,
        settings,
        experiences,
        educations,
        skills,
        projects,
        counts,
        report,
    })
}

fn import_event(user_id: &str, result: &ImportResult, ctx: &RequestContext) -> AuditEvent {
    let mut metadata = JsonMap::new();
    metadata.insert(
        "duplicates".to_string(),
        Value::from(result.skills.duplicates.clone()),
    );
    metadata.insert(
        "dropped".to_string(),
        serde_json::to_value(result.dropped().collect::<Vec<_>>()).unwrap_or(Value::Null),
    );

    AuditEvent::new(AuditAction::Import, "Profile")
        .entity_id(user_id)
        .new_values(snapshot(&result.counts))
        .metadata(metadata)
        .context(ctx)
        .default_actor(user_id)
}
