//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate coordinator-run repository calls into use-case level APIs.
//! - Record audit entries for completed single-entity mutations.

pub mod profile_service;

pub use profile_service::{ProfileService, ProfileServiceError, ProfileSnapshot};
