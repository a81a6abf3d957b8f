//! Coercion, sanitization and validation of raw import records.
//!
//! # Invariants
//! - Every text value that reaches a candidate went through the sanitizer.
//! - A candidate is either fully formed or dropped with a reason.
//! - Normalization never touches the store; skill dedup happens at write time.

use super::raw::{
    group_records, settings_record, skill_records, RawEducation, RawExperience, RawProfile,
    RawProject, RawSettings, RawSkill,
};
use super::{DropReason, EntityGroup, ImportReport, RecordOutcome};
use crate::model::profile::{
    Education, Experience, Profile, Project, SettingsPatch, Skill, DEFAULT_SKILL_CATEGORY,
    GPA_MAX, GPA_MIN, YEARS_EXP_MAX,
};
use crate::sanitize::Sanitizer;
use chrono::{DateTime, NaiveDate};
use serde_json::Value;
use uuid::Uuid;

/// Alias-resolved, validated candidates for one import call.
///
/// Record lists keep the input index of each accepted candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportBatch {
    pub user_id: String,
    pub profile: Option<Profile>,
    /// Merged into stored settings at write time.
    pub settings: Option<SettingsPatch>,
    pub experiences: Vec<(usize, Experience)>,
    pub educations: Vec<(usize, Education)>,
    pub skills: Vec<(usize, Skill)>,
    pub projects: Vec<(usize, Project)>,
    /// Normalization outcomes; dropped records only.
    pub report: ImportReport,
}

/// Parsed date input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateInput {
    At(i64),
    /// "present" and friends.
    Ongoing,
}

impl ImportBatch {
    /// Normalizes `raw` for `user_id`. `now_ms` fills missing start dates.
    pub fn normalize<S: Sanitizer>(
        raw: RawProfile,
        user_id: &str,
        sanitizer: &S,
        now_ms: i64,
    ) -> Self {
        let normalizer = Normalizer {
            sanitizer,
            user_id,
            now_ms,
        };
        let mut report = ImportReport::default();

        let experiences = collect(
            group_records::<RawExperience>(raw.experiences.as_ref()),
            EntityGroup::Experience,
            &mut report,
            |record| normalizer.experience(record),
        );
        let educations = collect(
            group_records::<RawEducation>(raw.education.as_ref()),
            EntityGroup::Education,
            &mut report,
            |record| normalizer.education(record),
        );
        let skills = collect(
            skill_records(raw.skills.as_ref()),
            EntityGroup::Skill,
            &mut report,
            |record| normalizer.skill(record),
        );
        let projects = collect(
            group_records::<RawProject>(raw.projects.as_ref()),
            EntityGroup::Project,
            &mut report,
            |record| normalizer.project(record),
        );
        let settings = settings_record(raw.settings.as_ref())
            .map(|record| normalizer.settings(record))
            .filter(|patch| !patch.is_empty());
        let profile = Some(normalizer.profile(&raw)).filter(|profile| !profile.is_blank());

        Self {
            user_id: user_id.to_string(),
            profile,
            settings,
            experiences,
            educations,
            skills,
            projects,
            report,
        }
    }

    /// Accepted candidates across all record groups.
    pub fn candidate_count(&self) -> usize {
        self.experiences.len() + self.educations.len() + self.skills.len() + self.projects.len()
    }
}

fn collect<R, T>(
    records: Vec<Option<R>>,
    group: EntityGroup,
    report: &mut ImportReport,
    normalize: impl Fn(R) -> Result<T, DropReason>,
) -> Vec<(usize, T)> {
    let mut accepted = Vec::new();
    for (index, record) in records.into_iter().enumerate() {
        let outcome = record
            .ok_or(DropReason::MalformedRecord)
            .and_then(&normalize);
        match outcome {
            Ok(candidate) => accepted.push((index, candidate)),
            Err(reason) => report.push(group, index, RecordOutcome::Dropped(reason)),
        }
    }
    accepted
}

struct Normalizer<'a, S: Sanitizer> {
    sanitizer: &'a S,
    user_id: &'a str,
    now_ms: i64,
}

impl<S: Sanitizer> Normalizer<'_, S> {
    fn plain(&self, value: &Option<Value>) -> Option<String> {
        coerce_text(value)
            .map(|text| self.sanitizer.sanitize_text(&text))
            .filter(|text| !text.is_empty())
    }

    fn rich(&self, value: &Option<Value>) -> Option<String> {
        coerce_text(value)
            .map(|text| self.sanitizer.sanitize_rich_text(&text))
            .filter(|text| !text.is_empty())
    }

    fn required(&self, value: &Option<Value>, field: &'static str) -> Result<String, DropReason> {
        self.plain(value).ok_or(DropReason::MissingField(field))
    }

    fn list(&self, value: &Option<Value>) -> Vec<String> {
        let items = match value {
            Some(Value::Array(items)) => items.iter().map(|item| Some(item.clone())).collect(),
            Some(other) => vec![Some(other.clone())],
            None => Vec::new(),
        };
        items.iter().filter_map(|item| self.plain(item)).collect()
    }

    fn number(&self, value: &Option<Value>, min: f64, max: f64) -> Option<f64> {
        value
            .as_ref()
            .and_then(|value| self.sanitizer.sanitize_number(value, min, max, None))
    }

    fn profile(&self, raw: &RawProfile) -> Profile {
        Profile {
            user_id: self.user_id.to_string(),
            name: self.plain(&raw.name),
            summary: self.rich(&raw.summary),
            email: self.plain(&raw.email),
            phone: self.plain(&raw.phone),
            updated_at: self.now_ms,
        }
    }

    fn settings(&self, raw: RawSettings) -> SettingsPatch {
        let resume_preferences = match raw.resume_preferences {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        };
        SettingsPatch {
            selected_template: coerce_text(&raw.selected_template),
            resume_preferences,
        }
    }

    fn experience(&self, raw: RawExperience) -> Result<Experience, DropReason> {
        let company = self.required(&raw.company, "company")?;
        let title = self.required(&raw.title, "title")?;
        let end = raw.end_date.as_ref().and_then(parse_date);
        let current = raw
            .current
            .as_ref()
            .map(|value| self.sanitizer.sanitize_boolean(value, false))
            .unwrap_or(false)
            || end == Some(DateInput::Ongoing);

        Ok(Experience {
            id: Uuid::new_v4(),
            user_id: self.user_id.to_string(),
            company,
            title,
            location: self.plain(&raw.location),
            start_date: self.start_date(&raw.start_date),
            end_date: if current { None } else { end.and_then(DateInput::at) },
            current,
            description: self.rich(&raw.description).unwrap_or_default(),
            highlights: self.list(&raw.highlights),
            keywords: self.list(&raw.keywords),
        })
    }

    fn education(&self, raw: RawEducation) -> Result<Education, DropReason> {
        let institution = self.required(&raw.institution, "institution")?;
        let degree = self.required(&raw.degree, "degree")?;
        let field = self.required(&raw.field, "field")?;

        Ok(Education {
            id: Uuid::new_v4(),
            user_id: self.user_id.to_string(),
            institution,
            degree,
            field,
            start_date: self.start_date(&raw.start_date),
            end_date: raw.end_date.as_ref().and_then(parse_date).and_then(DateInput::at),
            gpa: self.number(&raw.gpa, GPA_MIN, GPA_MAX),
            honors: self.list(&raw.honors),
        })
    }

    fn skill(&self, raw: RawSkill) -> Result<Skill, DropReason> {
        let name = self.required(&raw.name, "name")?;
        let years_exp = self
            .number(&raw.years_exp, 0.0, f64::from(YEARS_EXP_MAX))
            .map(|years| years.round() as u32);

        Ok(Skill {
            id: Uuid::new_v4(),
            user_id: self.user_id.to_string(),
            name,
            category: self
                .plain(&raw.category)
                .unwrap_or_else(|| DEFAULT_SKILL_CATEGORY.to_string()),
            proficiency: self.plain(&raw.proficiency),
            years_exp,
        })
    }

    fn project(&self, raw: RawProject) -> Result<Project, DropReason> {
        let name = self.required(&raw.name, "name")?;
        let url = coerce_text(&raw.url).and_then(|url| self.sanitizer.sanitize_url(&url));

        Ok(Project {
            id: Uuid::new_v4(),
            user_id: self.user_id.to_string(),
            name,
            description: self.rich(&raw.description).unwrap_or_default(),
            url,
            start_date: raw.start_date.as_ref().and_then(parse_date).map(|date| match date {
                DateInput::At(ms) => ms,
                DateInput::Ongoing => self.now_ms,
            }),
            end_date: raw.end_date.as_ref().and_then(parse_date).and_then(DateInput::at),
            technologies: self.list(&raw.technologies),
            highlights: self.list(&raw.highlights),
        })
    }

    /// Missing or unparseable start dates default to now.
    fn start_date(&self, value: &Option<Value>) -> i64 {
        match value.as_ref().and_then(parse_date) {
            Some(DateInput::At(ms)) => ms,
            Some(DateInput::Ongoing) | None => self.now_ms,
        }
    }
}

impl DateInput {
    fn at(self) -> Option<i64> {
        match self {
            Self::At(ms) => Some(ms),
            Self::Ongoing => None,
        }
    }
}

/// Strings pass through; numbers and booleans are rendered.
fn coerce_text(value: &Option<Value>) -> Option<String> {
    match value.as_ref()? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Parses a date into epoch milliseconds (UTC midnight for calendar dates).
///
/// Accepts epoch-ms numbers, four-digit years (number or string), `YYYY-MM`,
/// `YYYY-MM-DD`, `MM/YYYY`, `Mon YYYY`, RFC 3339 timestamps and
/// "present"/"current"/"now".
pub fn parse_date(value: &Value) -> Option<DateInput> {
    match value {
        Value::Number(number) => {
            if let Some(year) = number.as_i64().filter(|year| (1000..=9999).contains(year)) {
                return ymd_ms(i32::try_from(year).ok()?, 1, 1).map(DateInput::At);
            }
            number
                .as_i64()
                .or_else(|| number.as_f64().filter(|ms| ms.is_finite()).map(|ms| ms as i64))
                .map(DateInput::At)
        }
        Value::String(text) => parse_date_text(text.trim()),
        _ => None,
    }
}

fn parse_date_text(text: &str) -> Option<DateInput> {
    if text.is_empty() {
        return None;
    }
    if matches!(
        text.to_ascii_lowercase().as_str(),
        "present" | "current" | "now" | "ongoing"
    ) {
        return Some(DateInput::Ongoing);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Some(DateInput::At(timestamp.timestamp_millis()));
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date_ms(date).map(DateInput::At);
    }
    if text.len() == 4 && text.chars().all(|c| c.is_ascii_digit()) {
        return ymd_ms(text.parse().ok()?, 1, 1).map(DateInput::At);
    }

    let first_of_month = [
        (format!("{text}-01"), "%Y-%m-%d"),
        (format!("01/{text}"), "%d/%m/%Y"),
        (format!("1 {text}"), "%d %B %Y"),
    ];
    first_of_month
        .iter()
        .find_map(|(candidate, format)| NaiveDate::parse_from_str(candidate, format).ok())
        .and_then(date_ms)
        .map(DateInput::At)
}

fn ymd_ms(year: i32, month: u32, day: u32) -> Option<i64> {
    NaiveDate::from_ymd_opt(year, month, day).and_then(date_ms)
}

fn date_ms(date: NaiveDate) -> Option<i64> {
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::{parse_date, DateInput, ImportBatch};
    use crate::import::raw::RawProfile;
    use crate::import::{DropReason, EntityGroup, RecordOutcome};
    use crate::model::profile::{ResumeTemplate, Settings};
    use crate::sanitize::DefaultSanitizer;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000_000;
    const JAN_2020: i64 = 1_577_836_800_000;
    const MAR_2020: i64 = 1_583_020_800_000;

    fn normalize(value: serde_json::Value) -> ImportBatch {
        let raw = RawProfile::from_value(&value).unwrap();
        ImportBatch::normalize(raw, "user-1", &DefaultSanitizer, NOW)
    }

    #[test]
    fn dates_accept_common_shapes() {
        assert_eq!(parse_date(&json!(2020)), Some(DateInput::At(JAN_2020)));
        assert_eq!(parse_date(&json!("2020")), Some(DateInput::At(JAN_2020)));
        assert_eq!(parse_date(&json!("2020-03")), Some(DateInput::At(MAR_2020)));
        assert_eq!(parse_date(&json!("2020-03-01")), Some(DateInput::At(MAR_2020)));
        assert_eq!(parse_date(&json!("03/2020")), Some(DateInput::At(MAR_2020)));
        assert_eq!(parse_date(&json!("Mar 2020")), Some(DateInput::At(MAR_2020)));
        assert_eq!(parse_date(&json!("March 2020")), Some(DateInput::At(MAR_2020)));
        assert_eq!(
            parse_date(&json!("2020-03-01T00:00:00Z")),
            Some(DateInput::At(MAR_2020))
        );
        assert_eq!(parse_date(&json!(MAR_2020)), Some(DateInput::At(MAR_2020)));
        assert_eq!(parse_date(&json!("Present")), Some(DateInput::Ongoing));
        assert_eq!(parse_date(&json!("someday")), None);
        assert_eq!(parse_date(&json!(true)), None);
    }

    #[test]
    fn experience_present_end_marks_current() {
        let batch = normalize(json!({
            "experiences": [{
                "company": "Acme",
                "position": "Engineer",
                "startDate": "2020-03",
                "endDate": "present"
            }]
        }));
        let (index, experience) = &batch.experiences[0];
        assert_eq!(*index, 0);
        assert_eq!(experience.title, "Engineer");
        assert_eq!(experience.start_date, MAR_2020);
        assert!(experience.current);
        assert_eq!(experience.end_date, None);
        assert!(experience.highlights.is_empty());
    }

    #[test]
    fn current_flag_discards_end_date_and_missing_start_is_now() {
        let batch = normalize(json!({
            "experience": [{
                "company": "Acme",
                "title": "Lead",
                "current": "yes",
                "end_date": "2021"
            }]
        }));
        let (_, experience) = &batch.experiences[0];
        assert!(experience.current);
        assert_eq!(experience.end_date, None);
        assert_eq!(experience.start_date, NOW);
    }

    #[test]
    fn incomplete_records_are_dropped_with_reason() {
        let batch = normalize(json!({
            "education": [
                {"school": "MIT", "degree": "BSc", "major": "Physics", "gpa": 4.6},
                {"institution": "CMU", "field": "CS"},
                "garbage"
            ],
            "experiences": [{"company": "  ", "title": "Dev"}]
        }));

        assert_eq!(batch.educations.len(), 1);
        assert_eq!(batch.educations[0].1.gpa, Some(4.0));
        assert_eq!(batch.educations[0].1.institution, "MIT");
        assert_eq!(
            batch.report.count(
                EntityGroup::Education,
                &RecordOutcome::Dropped(DropReason::MissingField("degree"))
            ),
            1
        );
        assert_eq!(
            batch.report.count(
                EntityGroup::Education,
                &RecordOutcome::Dropped(DropReason::MalformedRecord)
            ),
            1
        );
        assert!(batch.experiences.is_empty());
        assert_eq!(batch.report.dropped().count(), 3);
    }

    #[test]
    fn skills_and_projects_get_defaults_and_sanitized_values() {
        let batch = normalize(json!({
            "skills": ["<b>Rust</b>", {"name": "Go", "years_exp": "250"}],
            "projects": [
                {"name": "Site", "url": "javascript:alert(1)"},
                {"name": "Lib", "url": "github.com/o/lib", "technologies": ["Rust", 42]}
            ]
        }));

        let names: Vec<&str> = batch.skills.iter().map(|(_, skill)| skill.name.as_str()).collect();
        assert_eq!(names, vec!["&lt;b&gt;Rust&lt;/b&gt;", "Go"]);
        assert_eq!(batch.skills[0].1.category, "Other");
        assert_eq!(batch.skills[1].1.years_exp, Some(100));

        assert_eq!(batch.projects[0].1.url, None);
        assert_eq!(batch.projects[0].1.description, "");
        assert_eq!(
            batch.projects[1].1.url.as_deref(),
            Some("https://github.com/o/lib")
        );
        assert_eq!(batch.projects[1].1.technologies, vec!["Rust", "42"]);
    }

    #[test]
    fn blank_profile_fields_produce_no_profile() {
        let batch = normalize(json!({"skills": []}));
        assert!(batch.profile.is_none());
        assert!(batch.settings.is_none());

        let batch = normalize(json!({
            "name": "  Ada  Lovelace ",
            "about": "Math & engines",
            "settings": {"template": "compact-technical", "resumePreferences": {"font": "serif"}}
        }));
        let profile = batch.profile.unwrap();
        assert_eq!(profile.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(profile.summary.as_deref(), Some("Math &amp; engines"));
        let patch = batch.settings.unwrap();
        assert_eq!(patch.selected_template.as_deref(), Some("compact-technical"));
        assert_eq!(patch.resume_preferences.unwrap()["font"], json!("serif"));
    }

    #[test]
    fn unknown_template_falls_back_to_default() {
        let batch = normalize(json!({"settings": {"selectedTemplate": "fancy"}}));
        let mut settings = Settings::new("user-1");
        settings.selected_template = ResumeTemplate::CompactTechnical;
        batch.settings.unwrap().apply(&mut settings);
        assert_eq!(settings.selected_template, ResumeTemplate::default());
    }

    #[test]
    fn settings_without_known_fields_produce_no_patch() {
        let batch = normalize(json!({"settings": {"theme": "dark"}}));
        assert!(batch.settings.is_none());

        let batch = normalize(json!({"settings": {"template": "compact-technical"}}));
        assert!(batch.settings.unwrap().resume_preferences.is_none());
    }
}
