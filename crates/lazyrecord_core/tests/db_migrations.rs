use lazyrecord_core::db::migrations::latest_version;
use lazyrecord_core::db::{open_db, open_db_in_memory, DbError};
use lazyrecord_core::{Backend, BackendMode, BackendOptions};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "counters");
    assert_table_exists(&conn, "greetings");
    assert_table_exists(&conn, "hello");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lazyrecord.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "greetings");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = Backend::open(&path, &BackendOptions::default()).unwrap_err();
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
fn backend_open_creates_file_and_pool() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pooled.db");
    let options = BackendOptions {
        pool_size: 3,
        ..BackendOptions::default()
    };

    let backend = Backend::open(&path, &options).unwrap();
    assert!(path.exists());
    assert_eq!(backend.mode(), &BackendMode::File(path.clone()));
    assert_eq!(backend.pool_state().0, 3);

    let journal_mode: String = Connection::open(&path)
        .unwrap()
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(journal_mode.to_ascii_lowercase(), "wal");
}

#[test]
fn counter_table_rejects_non_integer_values() {
    let conn = open_db_in_memory().unwrap();
    let err = conn
        .execute("INSERT INTO counters (id, count) VALUES (1, 1.5);", [])
        .unwrap_err();
    assert!(err.to_string().contains("CHECK"));
}

#[test]
fn hello_table_rejects_empty_messages() {
    let conn = open_db_in_memory().unwrap();
    assert!(conn
        .execute("INSERT INTO hello (message) VALUES ('');", [])
        .is_err());
    conn.execute("INSERT INTO hello (message) VALUES ('hi');", [])
        .unwrap();
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
