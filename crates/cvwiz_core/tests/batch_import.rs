use cvwiz_core::import::{DropReason, EntityGroup, RecordOutcome};
use cvwiz_core::repo::entry_repo::{EntryRepository, SqliteEntryRepository};
use cvwiz_core::repo::profile_repo::{ProfileRepository, SqliteProfileRepository};
use cvwiz_core::{
    open_db_in_memory, AuditAction, AuditRecorder, BatchImporter, ImportError, ProfileService,
    RequestContext, RetryPolicy, SettingsPatch, SqliteAuditRepository, TransactionCoordinator,
    TxError, TxOptions,
};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::time::Duration;

const USER: &str = "user-1";

fn importer() -> BatchImporter {
    let retry = RetryPolicy {
        retries: 3,
        base_delay: Duration::from_millis(1),
    };
    BatchImporter::new(TransactionCoordinator::new(TxOptions::default(), retry))
}

fn ctx() -> RequestContext {
    RequestContext::from_headers([("x-request-id", "req-import-1"), ("x-real-ip", "10.0.0.9")])
}

fn full_profile() -> Value {
    json!({
        "name": "Ada Lovelace",
        "email": "ada@example.com",
        "about": "Analyst",
        "experience": [
            {"company": "Analytical Engines", "position": "Engineer", "startDate": "1843-01", "endDate": "present"},
            {"company": "", "title": "Ghost"}
        ],
        "education": [
            {"school": "Home", "degree": "Private", "major": "Mathematics", "gpa": "3.9"}
        ],
        "skills": ["Mathematics", {"name": "Poetry", "category": "Arts"}],
        "projects": [{"name": "Note G", "url": "example.org/note-g"}],
        "settings": {"selectedTemplate": "education-research-skills"}
    })
}

fn row_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| row.get(0))
        .unwrap()
}

#[test]
fn import_persists_every_group_and_reports_outcomes() {
    let mut conn = open_db_in_memory().unwrap();
    let result = importer()
        .import_value(&mut conn, USER, &full_profile(), &ctx())
        .unwrap();

    assert_eq!(result.counts.experiences, 1);
    assert_eq!(result.counts.educations, 1);
    assert_eq!(result.counts.skills, 2);
    assert_eq!(result.counts.projects, 1);
    assert_eq!(result.counts.dropped, 1);
    assert!(result.experiences[0].current);
    assert_eq!(result.educations[0].gpa, Some(3.9));
    assert_eq!(
        result.projects[0].url.as_deref(),
        Some("https://example.org/note-g")
    );
    assert_eq!(
        result.report.count(
            EntityGroup::Experience,
            &RecordOutcome::Dropped(DropReason::MissingField("company"))
        ),
        1
    );

    let entries = SqliteEntryRepository::new(&conn);
    let counts = entries.count_entries(USER).unwrap();
    assert_eq!(counts.total(), 5);
    let profiles = SqliteProfileRepository::new(&conn);
    assert_eq!(
        profiles.get_profile(USER).unwrap().unwrap().summary.as_deref(),
        Some("Analyst")
    );
    assert_eq!(
        profiles
            .get_settings(USER)
            .unwrap()
            .unwrap()
            .selected_template
            .as_str(),
        "education-research-skills"
    );
}

#[test]
fn import_records_one_audit_entry_after_commit() {
    let mut conn = open_db_in_memory().unwrap();
    importer()
        .import_value(&mut conn, USER, &full_profile(), &ctx())
        .unwrap();

    let recorder = AuditRecorder::new(SqliteAuditRepository::new(&conn));
    let entries = recorder.recent(None, &[AuditAction::Import]).unwrap();
    assert_eq!(entries.len(), 1);

    let entry = &entries[0];
    assert_eq!(entry.entity_type, "Profile");
    assert_eq!(entry.entity_id.as_deref(), Some(USER));
    assert_eq!(entry.user_id.as_deref(), Some(USER));
    assert_eq!(entry.request_id.as_deref(), Some("req-import-1"));
    assert_eq!(entry.ip_address.as_deref(), Some("10.0.0.9"));
    let new_values = entry.new_values.as_ref().unwrap();
    assert_eq!(new_values["skills"], json!(2));
    assert_eq!(new_values["dropped"], json!(1));
    let metadata = entry.metadata.as_ref().unwrap();
    assert_eq!(metadata["duplicates"], json!([]));
    assert_eq!(metadata["dropped"].as_array().unwrap().len(), 1);
}

#[test]
fn skills_are_deduplicated_against_store_and_batch() {
    let mut conn = open_db_in_memory().unwrap();
    importer()
        .import_value(&mut conn, USER, &json!({"skills": ["JavaScript"]}), &ctx())
        .unwrap();

    let result = importer()
        .import_value(
            &mut conn,
            USER,
            &json!({"skills": ["javascript", "Python", "PYTHON "]}),
            &ctx(),
        )
        .unwrap();

    let created: Vec<&str> = result
        .skills
        .created
        .iter()
        .map(|skill| skill.name.as_str())
        .collect();
    assert_eq!(created, vec!["Python"]);
    assert_eq!(result.skills.duplicates, vec!["javascript", "PYTHON"]);
    assert_eq!(
        result
            .report
            .count(EntityGroup::Skill, &RecordOutcome::Duplicate),
        2
    );

    let names = SqliteEntryRepository::new(&conn)
        .list_skill_names(USER)
        .unwrap();
    assert_eq!(names, vec!["JavaScript", "Python"]);
}

#[test]
fn dedup_is_scoped_per_user() {
    let mut conn = open_db_in_memory().unwrap();
    importer()
        .import_value(&mut conn, "user-a", &json!({"skills": ["Rust"]}), &ctx())
        .unwrap();
    let result = importer()
        .import_value(&mut conn, "user-b", &json!({"skills": ["rust"]}), &ctx())
        .unwrap();
    assert_eq!(result.counts.skills, 1);
    assert!(result.skills.duplicates.is_empty());
}

#[test]
fn education_missing_degree_is_dropped_and_siblings_persist() {
    let mut conn = open_db_in_memory().unwrap();
    let result = importer()
        .import_value(
            &mut conn,
            USER,
            &json!({
                "education": [
                    {"institution": "MIT", "field": "Physics"},
                    {"institution": "CMU", "degree": "MSc", "fieldOfStudy": "CS"}
                ],
                "skills": ["Rust"]
            }),
            &ctx(),
        )
        .unwrap();

    assert_eq!(result.educations.len(), 1);
    assert_eq!(result.educations[0].institution, "CMU");
    assert_eq!(result.counts.skills, 1);
    let dropped: Vec<_> = result.dropped().collect();
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].index, 0);
    assert_eq!(
        dropped[0].outcome,
        RecordOutcome::Dropped(DropReason::MissingField("degree"))
    );

    let educations = SqliteEntryRepository::new(&conn)
        .list_educations(USER)
        .unwrap();
    assert_eq!(educations.len(), 1);
    assert_eq!(educations[0].field, "CS");
}

#[test]
fn failure_in_last_group_rolls_back_every_group() {
    let mut conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TEMP TRIGGER fail_project_insert
         BEFORE INSERT ON projects
         BEGIN
             SELECT RAISE(ABORT, 'forced project failure');
         END;",
    )
    .unwrap();

    let err = importer()
        .import_value(&mut conn, USER, &full_profile(), &ctx())
        .unwrap_err();
    assert!(matches!(err, ImportError::Tx(TxError::Repo(_))));
    assert!(!err.is_retryable());

    for table in [
        "profiles",
        "settings",
        "experiences",
        "educations",
        "skills",
        "projects",
        "audit_logs",
    ] {
        assert_eq!(row_count(&conn, table), 0, "{table} should be empty");
    }
}

#[test]
fn audit_store_failure_does_not_change_import_outcome() {
    let mut conn = open_db_in_memory().unwrap();
    conn.execute_batch("DROP TABLE audit_logs;").unwrap();

    let result = importer()
        .import_value(&mut conn, USER, &full_profile(), &ctx())
        .unwrap();

    assert_eq!(result.counts.skills, 2);
    assert_eq!(row_count(&conn, "skills"), 2);
    assert_eq!(row_count(&conn, "projects"), 1);
}

#[test]
fn import_timeout_rolls_back_and_is_retryable() {
    let mut conn = open_db_in_memory().unwrap();
    let importer = importer().with_options(
        TxOptions::default()
            .named("import_batch")
            .with_timeout(Duration::ZERO),
    );

    let err = importer
        .import_value(&mut conn, USER, &full_profile(), &ctx())
        .unwrap_err();
    assert!(matches!(err, ImportError::Tx(TxError::Timeout { .. })));
    assert!(err.is_retryable());
    assert_eq!(row_count(&conn, "skills"), 0);
}

#[test]
fn invalid_input_is_rejected_before_any_write() {
    let mut conn = open_db_in_memory().unwrap();
    let importer = importer();

    let err = importer
        .import_value(&mut conn, "  ", &full_profile(), &ctx())
        .unwrap_err();
    assert!(matches!(err, ImportError::InvalidUser));

    let err = importer
        .import_value(&mut conn, USER, &json!(["not", "an", "object"]), &ctx())
        .unwrap_err();
    assert!(matches!(err, ImportError::MalformedInput));
    assert_eq!(row_count(&conn, "audit_logs"), 0);
}

#[test]
fn repeated_profile_import_merges_fields() {
    let mut conn = open_db_in_memory().unwrap();
    importer()
        .import_value(&mut conn, USER, &json!({"name": "Ada", "phone": "123"}), &ctx())
        .unwrap();
    let result = importer()
        .import_value(&mut conn, USER, &json!({"email": "ada@example.com"}), &ctx())
        .unwrap();

    let profile = result.profile.unwrap();
    assert_eq!(profile.name.as_deref(), Some("Ada"));
    assert_eq!(profile.phone.as_deref(), Some("123"));
    assert_eq!(profile.email.as_deref(), Some("ada@example.com"));
}

#[test]
fn imported_settings_merge_into_stored_preferences() {
    let mut conn = open_db_in_memory().unwrap();
    let retry = RetryPolicy {
        retries: 2,
        base_delay: Duration::from_millis(1),
    };
    let patch: SettingsPatch =
        serde_json::from_value(json!({"resumePreferences": {"font": "serif", "margins": 1}}))
            .unwrap();
    ProfileService::new(TransactionCoordinator::new(TxOptions::default(), retry))
        .update_settings(&mut conn, USER, &patch, &ctx())
        .unwrap();

    let result = importer()
        .import_value(
            &mut conn,
            USER,
            &json!({"settings": {"template": "compact-technical"}}),
            &ctx(),
        )
        .unwrap();
    let imported = result.settings.unwrap();
    assert_eq!(imported.selected_template.as_str(), "compact-technical");
    assert_eq!(
        Value::Object(imported.resume_preferences),
        json!({"font": "serif", "margins": 1})
    );

    importer()
        .import_value(
            &mut conn,
            USER,
            &json!({"settings": {"resumePreferences": {"margins": null, "color": "blue"}}}),
            &ctx(),
        )
        .unwrap();
    let stored = SqliteProfileRepository::new(&conn)
        .get_settings(USER)
        .unwrap()
        .unwrap();
    assert_eq!(stored.selected_template.as_str(), "compact-technical");
    assert_eq!(
        Value::Object(stored.resume_preferences),
        json!({"font": "serif", "color": "blue"})
    );
}
