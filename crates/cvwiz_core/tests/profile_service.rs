use cvwiz_core::model::profile::ResumeTemplate;
use cvwiz_core::repo::audit_repo::Pagination;
use cvwiz_core::{
    open_db_in_memory, AuditAction, AuditRecorder, BatchImporter, ProfileService,
    ProfileServiceError, RequestContext, RetryPolicy, SettingsPatch, SqliteAuditRepository,
    TransactionCoordinator, TxOptions,
};
use rusqlite::Connection;
use serde_json::json;
use std::time::Duration;

const USER: &str = "user-1";

fn coordinator() -> TransactionCoordinator {
    TransactionCoordinator::new(
        TxOptions::default(),
        RetryPolicy {
            retries: 2,
            base_delay: Duration::from_millis(1),
        },
    )
}

fn service() -> ProfileService {
    ProfileService::new(coordinator())
}

fn ctx() -> RequestContext {
    RequestContext::from_headers([("x-request-id", "req-settings")]).with_actor(USER)
}

fn patch(value: serde_json::Value) -> SettingsPatch {
    serde_json::from_value(value).unwrap()
}

fn seed_skills(conn: &mut Connection, user_id: &str, names: &[&str]) -> Vec<uuid::Uuid> {
    BatchImporter::new(coordinator())
        .import_value(conn, user_id, &json!({ "skills": names }), &RequestContext::system())
        .unwrap()
        .skills
        .created
        .iter()
        .map(|skill| skill.id)
        .collect()
}

#[test]
fn first_settings_write_records_create_then_update_records_diff() {
    let mut conn = open_db_in_memory().unwrap();
    let service = service();

    let created = service
        .update_settings(
            &mut conn,
            USER,
            &patch(json!({"resumePreferences": {"font": "serif"}})),
            &ctx(),
        )
        .unwrap();
    assert_eq!(created.selected_template, ResumeTemplate::default());

    let updated = service
        .update_settings(
            &mut conn,
            USER,
            &patch(json!({"selectedTemplate": "compact-technical"})),
            &ctx(),
        )
        .unwrap();
    assert_eq!(updated.selected_template, ResumeTemplate::CompactTechnical);
    assert_eq!(updated.resume_preferences["font"], json!("serif"));

    let history = AuditRecorder::new(SqliteAuditRepository::new(&conn))
        .by_entity("Settings", USER, &[], Pagination::default())
        .unwrap();
    assert_eq!(history.len(), 2);
    let actions: Vec<AuditAction> = history.iter().map(|entry| entry.action).collect();
    assert!(actions.contains(&AuditAction::Create));
    assert!(actions.contains(&AuditAction::Update));

    let update = history
        .iter()
        .find(|entry| entry.action == AuditAction::Update)
        .unwrap();
    assert_eq!(
        serde_json::Value::Object(update.old_values.clone().unwrap()),
        json!({"selectedTemplate": "experience-skills-projects"})
    );
    assert_eq!(
        serde_json::Value::Object(update.new_values.clone().unwrap()),
        json!({"selectedTemplate": "compact-technical"})
    );
    assert_eq!(update.request_id.as_deref(), Some("req-settings"));
    assert_eq!(update.user_id.as_deref(), Some(USER));
}

#[test]
fn delete_skill_removes_row_and_records_snapshot() {
    let mut conn = open_db_in_memory().unwrap();
    let ids = seed_skills(&mut conn, USER, &["Rust", "Go"]);

    let deleted = service()
        .delete_skill(&mut conn, USER, ids[0], &ctx())
        .unwrap();
    assert_eq!(deleted.name, "Rust");

    let snapshot = service().get_profile_snapshot(&conn, USER).unwrap();
    let names: Vec<&str> = snapshot
        .skills
        .iter()
        .map(|skill| skill.name.as_str())
        .collect();
    assert_eq!(names, vec!["Go"]);

    let history = AuditRecorder::new(SqliteAuditRepository::new(&conn))
        .by_entity("Skill", &ids[0].to_string(), &[], Pagination::default())
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, AuditAction::Delete);
    assert_eq!(history[0].old_values.as_ref().unwrap()["name"], json!("Rust"));
    assert!(history[0].new_values.is_none());
}

#[test]
fn deleting_another_users_skill_is_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let ids = seed_skills(&mut conn, "user-2", &["Haskell"]);

    let err = service()
        .delete_skill(&mut conn, USER, ids[0], &ctx())
        .unwrap_err();
    assert!(matches!(err, ProfileServiceError::NotFound { entity: "Skill", .. }));
    assert!(!err.is_retryable());

    let remaining = service().get_profile_snapshot(&conn, "user-2").unwrap();
    assert_eq!(remaining.skills.len(), 1);
    let deletes = AuditRecorder::new(SqliteAuditRepository::new(&conn))
        .recent(None, &[AuditAction::Delete])
        .unwrap();
    assert!(deletes.is_empty());
}

#[test]
fn snapshot_of_unknown_user_is_empty() {
    let conn = open_db_in_memory().unwrap();
    let snapshot = service().get_profile_snapshot(&conn, "nobody").unwrap();
    assert!(snapshot.profile.is_none());
    assert!(snapshot.settings.is_none());
    assert!(snapshot.experiences.is_empty());
    assert!(snapshot.skills.is_empty());

    let err = service().get_profile_snapshot(&conn, " ").unwrap_err();
    assert!(matches!(err, ProfileServiceError::InvalidUser));
}
