//! Batch profile import.
//!
//! # Responsibility
//! - Turn one loosely typed extracted profile into validated entities.
//! - Persist every accepted entity in a single coordinator invocation.
//! - Report per-record outcomes and record one `IMPORT` audit entry.
//!
//! # Invariants
//! - A batch persists all accepted records or none of them.
//! - Dropped and duplicate records are reported, never raised as errors.
//! - Skill names are unique per user, compared case-insensitively.

pub mod dedup;
pub mod importer;
pub mod normalize;
pub mod raw;

pub use dedup::SkillDedupSet;
pub use importer::{BatchImporter, ImportCounts, ImportError, ImportResult, SkillImport};
pub use normalize::ImportBatch;
pub use raw::RawProfile;

use serde::Serialize;

/// Record group inside an import batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityGroup {
    Experience,
    Education,
    Skill,
    Project,
}

impl EntityGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Experience => "experience",
            Self::Education => "education",
            Self::Skill => "skill",
            Self::Project => "project",
        }
    }
}

/// Why a candidate never reached the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "field", rename_all = "camelCase")]
pub enum DropReason {
    MissingField(&'static str),
    /// The record was not a JSON object.
    MalformedRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "camelCase")]
pub enum RecordOutcome {
    Accepted,
    Dropped(DropReason),
    Duplicate,
}

/// Outcome of one input record, addressed by group and input position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordReport {
    pub group: EntityGroup,
    pub index: usize,
    pub outcome: RecordOutcome,
}

/// Per-record outcomes of one batch, in input order within each group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub records: Vec<RecordReport>,
}

impl ImportReport {
    pub fn push(&mut self, group: EntityGroup, index: usize, outcome: RecordOutcome) {
        self.records.push(RecordReport {
            group,
            index,
            outcome,
        });
    }

    pub fn dropped(&self) -> impl Iterator<Item = &RecordReport> {
        self.records
            .iter()
            .filter(|record| matches!(record.outcome, RecordOutcome::Dropped(_)))
    }

    pub fn count(&self, group: EntityGroup, outcome: &RecordOutcome) -> usize {
        self.records
            .iter()
            .filter(|record| record.group == group && &record.outcome == outcome)
            .count()
    }
}
