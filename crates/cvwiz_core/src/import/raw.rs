//! Loosely typed import input and alias resolution.
//!
//! Every leaf is kept as an optional JSON value; coercion into typed fields
//! happens during normalization. Alias fields are folded into their canonical
//! field by `resolve_aliases`, with the canonical spelling winning when both
//! are present.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

type Field = Option<Value>;

/// Extracted profile as handed over by the parser.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProfile {
    pub name: Field,
    pub email: Field,
    pub phone: Field,
    pub summary: Field,
    pub about: Field,
    pub experiences: Field,
    pub experience: Field,
    pub education: Field,
    pub educations: Field,
    pub skills: Field,
    pub projects: Field,
    pub settings: Field,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExperience {
    pub company: Field,
    pub title: Field,
    pub position: Field,
    pub location: Field,
    pub start_date: Field,
    #[serde(rename = "start_date")]
    pub start_date_snake: Field,
    pub end_date: Field,
    #[serde(rename = "end_date")]
    pub end_date_snake: Field,
    pub current: Field,
    pub description: Field,
    pub highlights: Field,
    pub keywords: Field,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEducation {
    pub institution: Field,
    pub school: Field,
    pub degree: Field,
    pub field: Field,
    pub major: Field,
    pub field_of_study: Field,
    pub start_date: Field,
    #[serde(rename = "start_date")]
    pub start_date_snake: Field,
    pub end_date: Field,
    #[serde(rename = "end_date")]
    pub end_date_snake: Field,
    pub gpa: Field,
    pub honors: Field,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSkill {
    pub name: Field,
    pub category: Field,
    pub proficiency: Field,
    pub years_exp: Field,
    #[serde(rename = "years_exp")]
    pub years_exp_snake: Field,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProject {
    pub name: Field,
    pub description: Field,
    pub url: Field,
    pub start_date: Field,
    #[serde(rename = "start_date")]
    pub start_date_snake: Field,
    pub end_date: Field,
    #[serde(rename = "end_date")]
    pub end_date_snake: Field,
    pub technologies: Field,
    pub highlights: Field,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSettings {
    pub selected_template: Field,
    pub template: Field,
    pub resume_preferences: Field,
}

/// Folds alias spellings into canonical fields.
pub trait ResolveAliases {
    fn resolve_aliases(&mut self);
}

fn fold(canonical: &mut Field, alias: &mut Field) {
    if canonical.is_none() {
        *canonical = alias.take();
    } else {
        *alias = None;
    }
}

impl ResolveAliases for RawProfile {
    fn resolve_aliases(&mut self) {
        fold(&mut self.summary, &mut self.about);
        fold(&mut self.experiences, &mut self.experience);
        fold(&mut self.education, &mut self.educations);
    }
}

impl ResolveAliases for RawExperience {
    fn resolve_aliases(&mut self) {
        fold(&mut self.title, &mut self.position);
        fold(&mut self.start_date, &mut self.start_date_snake);
        fold(&mut self.end_date, &mut self.end_date_snake);
    }
}

impl ResolveAliases for RawEducation {
    fn resolve_aliases(&mut self) {
        fold(&mut self.institution, &mut self.school);
        fold(&mut self.field, &mut self.major);
        fold(&mut self.field, &mut self.field_of_study);
        fold(&mut self.start_date, &mut self.start_date_snake);
        fold(&mut self.end_date, &mut self.end_date_snake);
    }
}

impl ResolveAliases for RawSkill {
    fn resolve_aliases(&mut self) {
        fold(&mut self.years_exp, &mut self.years_exp_snake);
    }
}

impl ResolveAliases for RawProject {
    fn resolve_aliases(&mut self) {
        fold(&mut self.start_date, &mut self.start_date_snake);
        fold(&mut self.end_date, &mut self.end_date_snake);
    }
}

impl ResolveAliases for RawSettings {
    fn resolve_aliases(&mut self) {
        fold(&mut self.selected_template, &mut self.template);
    }
}

impl RawProfile {
    /// Reads a profile from an arbitrary JSON value.
    ///
    /// Returns `None` when `value` is not an object.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        let mut raw: Self = serde_json::from_value(value.clone()).ok()?;
        raw.resolve_aliases();
        Some(raw)
    }
}

impl RawSkill {
    fn from_name(name: &str) -> Self {
        Self {
            name: Some(Value::String(name.to_string())),
            ..Self::default()
        }
    }
}

/// Splits a group into records. `None` marks a record that is not an object.
///
/// A missing group yields no records; a non-array group is treated as a
/// single record.
pub fn group_records<T>(group: Option<&Value>) -> Vec<Option<T>>
where
    T: DeserializeOwned + ResolveAliases,
{
    parse_group(group, |_| None)
}

/// Like [`group_records`], but bare strings become a skill named after them.
pub fn skill_records(group: Option<&Value>) -> Vec<Option<RawSkill>> {
    parse_group(group, |value| value.as_str().map(RawSkill::from_name))
}

fn parse_group<T>(group: Option<&Value>, from_scalar: impl Fn(&Value) -> Option<T>) -> Vec<Option<T>>
where
    T: DeserializeOwned + ResolveAliases,
{
    let items: Vec<&Value> = match group {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    };
    items
        .into_iter()
        .map(|item| {
            let mut record = if item.is_object() {
                serde_json::from_value::<T>(item.clone()).ok()
            } else {
                from_scalar(item)
            }?;
            record.resolve_aliases();
            Some(record)
        })
        .collect()
}

/// Reads the settings object, if any.
pub fn settings_record(value: Option<&Value>) -> Option<RawSettings> {
    let value = value.filter(|value| value.is_object())?;
    let mut raw: RawSettings = serde_json::from_value(value.clone()).ok()?;
    raw.resolve_aliases();
    Some(raw)
}

#[cfg(test)]
mod tests {
    use super::{group_records, skill_records, RawEducation, RawExperience, RawProfile};
    use serde_json::json;

    #[test]
    fn profile_aliases_resolve_to_canonical_fields() {
        let raw = RawProfile::from_value(&json!({
            "about": "Builder",
            "experience": [{"company": "Acme"}],
            "educations": []
        }))
        .unwrap();
        assert_eq!(raw.summary, Some(json!("Builder")));
        assert_eq!(raw.experiences, Some(json!([{"company": "Acme"}])));
        assert_eq!(raw.education, Some(json!([])));
        assert!(raw.about.is_none());
    }

    #[test]
    fn canonical_spelling_wins_over_alias() {
        let records: Vec<Option<RawEducation>> = group_records(Some(&json!([{
            "institution": "MIT",
            "school": "Harvard",
            "major": "Physics",
            "start_date": "2019"
        }])));
        let education = records[0].clone().unwrap();
        assert_eq!(education.institution, Some(json!("MIT")));
        assert_eq!(education.field, Some(json!("Physics")));
        assert_eq!(education.start_date, Some(json!("2019")));
        assert!(education.school.is_none());
    }

    #[test]
    fn non_object_records_are_marked() {
        let records: Vec<Option<RawExperience>> =
            group_records(Some(&json!([{"position": "Dev"}, "oops", 3])));
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].as_ref().unwrap().title, Some(json!("Dev")));
        assert!(records[1].is_none());
        assert!(records[2].is_none());
    }

    #[test]
    fn skills_accept_bare_strings() {
        let records = skill_records(Some(&json!(["Rust", {"name": "Go", "years_exp": 2}, 7])));
        assert_eq!(records[0].as_ref().unwrap().name, Some(json!("Rust")));
        assert_eq!(records[1].as_ref().unwrap().years_exp, Some(json!(2)));
        assert!(records[2].is_none());
    }

    #[test]
    fn non_object_profile_is_rejected() {
        assert!(RawProfile::from_value(&json!(["not", "a", "profile"])).is_none());
    }
}
