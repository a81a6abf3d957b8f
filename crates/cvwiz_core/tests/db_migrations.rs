use cvwiz_core::db::migrations::latest_version;
use cvwiz_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

const TABLES: &[&str] = &[
    "profiles",
    "settings",
    "experiences",
    "educations",
    "skills",
    "projects",
    "audit_logs",
];

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in TABLES {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cvwiz.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "audit_logs");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn audit_rows_reject_updates() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO audit_logs (id, action, entity_type, created_at)
         VALUES ('a1', 'CREATE', 'Skill', 1);",
        [],
    )
    .unwrap();

    let err = conn
        .execute("UPDATE audit_logs SET entity_type = 'Other' WHERE id = 'a1';", [])
        .unwrap_err();
    assert!(err.to_string().contains("immutable"));

    let deleted = conn
        .execute("DELETE FROM audit_logs WHERE id = 'a1';", [])
        .unwrap();
    assert_eq!(deleted, 1);
}

#[test]
fn audit_action_is_constrained() {
    let conn = open_db_in_memory().unwrap();
    let result = conn.execute(
        "INSERT INTO audit_logs (id, action, entity_type, created_at)
         VALUES ('a1', 'PURGE', 'Skill', 1);",
        [],
    );
    assert!(result.is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
