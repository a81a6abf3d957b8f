//! Profile entity model.
//!
//! # Responsibility
//! - Define Profile, Settings, Experience, Education, Skill and Project.
//! - Provide write-time validation shared by every repository.
//!
//! # Invariants
//! - Experience requires non-empty `company` and `title`.
//! - Education requires non-empty `institution`, `degree` and `field`.
//! - `gpa` stays within 0..=4, `years_exp` within 0..=100.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for entity rows.
pub type EntityId = Uuid;

pub const GPA_MIN: f64 = 0.0;
pub const GPA_MAX: f64 = 4.0;
pub const YEARS_EXP_MAX: u32 = 100;
pub const DEFAULT_SKILL_CATEGORY: &str = "Other";

/// Write-time validation failure for profile entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyUserId,
    MissingField {
        entity: &'static str,
        field: &'static str,
    },
    OutOfRange {
        entity: &'static str,
        field: &'static str,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyUserId => write!(f, "user id cannot be empty"),
            Self::MissingField { entity, field } => {
                write!(f, "{entity} requires non-empty `{field}`")
            }
            Self::OutOfRange { entity, field } => {
                write!(f, "{entity} field `{field}` is out of range")
            }
        }
    }
}

impl Error for ValidationError {}

/// Resume layout stored in user settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResumeTemplate {
    #[default]
    ExperienceSkillsProjects,
    EducationResearchSkills,
    ProjectsSkillsExperience,
    CompactTechnical,
}

impl ResumeTemplate {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExperienceSkillsProjects => "experience-skills-projects",
            Self::EducationResearchSkills => "education-research-skills",
            Self::ProjectsSkillsExperience => "projects-skills-experience",
            Self::CompactTechnical => "compact-technical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "experience-skills-projects" => Some(Self::ExperienceSkillsProjects),
            "education-research-skills" => Some(Self::EducationResearchSkills),
            "projects-skills-experience" => Some(Self::ProjectsSkillsExperience),
            "compact-technical" => Some(Self::CompactTechnical),
            _ => None,
        }
    }
}

/// Top-level profile fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: String,
    pub name: Option<String>,
    pub summary: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub updated_at: i64,
}

impl Profile {
    /// Returns whether no profile field carries a value.
    pub fn is_blank(&self) -> bool {
        self.name.is_none() && self.summary.is_none() && self.email.is_none() && self.phone.is_none()
    }
}

/// Per-user resume settings. One row per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub user_id: String,
    pub selected_template: ResumeTemplate,
    /// Opaque key/value preferences owned by the UI.
    pub resume_preferences: Map<String, Value>,
}

impl Settings {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            selected_template: ResumeTemplate::default(),
            resume_preferences: Map::new(),
        }
    }
}

/// Partial settings update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    /// Unknown template names fall back to the default template.
    pub selected_template: Option<String>,
    /// Merged key by key; a `null` value removes the key.
    pub resume_preferences: Option<Map<String, Value>>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.selected_template.is_none() && self.resume_preferences.is_none()
    }

    pub fn apply(&self, settings: &mut Settings) {
        if let Some(template) = &self.selected_template {
            settings.selected_template = ResumeTemplate::parse(template).unwrap_or_default();
        }
        if let Some(preferences) = &self.resume_preferences {
            for (key, value) in preferences {
                if value.is_null() {
                    settings.resume_preferences.remove(key);
                } else {
                    settings.resume_preferences.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    pub id: EntityId,
    pub user_id: String,
    pub company: String,
    pub title: String,
    pub location: Option<String>,
    pub start_date: i64,
    /// Always `None` while `current` is set.
    pub end_date: Option<i64>,
    pub current: bool,
    pub description: String,
    pub highlights: Vec<String>,
    pub keywords: Vec<String>,
}

impl Experience {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_user(&self.user_id)?;
        require("Experience", "company", &self.company)?;
        require("Experience", "title", &self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Education {
    pub id: EntityId,
    pub user_id: String,
    pub institution: String,
    pub degree: String,
    pub field: String,
    pub start_date: i64,
    pub end_date: Option<i64>,
    pub gpa: Option<f64>,
    pub honors: Vec<String>,
}

impl Education {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_user(&self.user_id)?;
        require("Education", "institution", &self.institution)?;
        require("Education", "degree", &self.degree)?;
        require("Education", "field", &self.field)?;
        match self.gpa {
            Some(gpa) if !(GPA_MIN..=GPA_MAX).contains(&gpa) => Err(ValidationError::OutOfRange {
                entity: "Education",
                field: "gpa",
            }),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: EntityId,
    pub user_id: String,
    pub name: String,
    pub category: String,
    pub proficiency: Option<String>,
    pub years_exp: Option<u32>,
}

impl Skill {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_user(&self.user_id)?;
        require("Skill", "name", &self.name)?;
        match self.years_exp {
            Some(years) if years > YEARS_EXP_MAX => Err(ValidationError::OutOfRange {
                entity: "Skill",
                field: "yearsExp",
            }),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: EntityId,
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub url: Option<String>,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub technologies: Vec<String>,
    pub highlights: Vec<String>,
}

impl Project {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_user(&self.user_id)?;
        require("Project", "name", &self.name)
    }
}

fn require_user(user_id: &str) -> Result<(), ValidationError> {
    if user_id.trim().is_empty() {
        return Err(ValidationError::EmptyUserId);
    }
    Ok(())
}

fn require(entity: &'static str, field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField { entity, field });
    }
    Ok(())
}
