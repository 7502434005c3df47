use rusqlite::Connection;
use xerodb_core::db::migrations::{latest_version, schema_version};
use xerodb_core::db::{open_db, open_db_in_memory, recreate_db, DbError};

const TABLES: [&str; 11] = [
    "species",
    "genes",
    "gene_info",
    "experiments",
    "gene_expressions",
    "differential_expressions",
    "go_terms",
    "gene_go_annotations",
    "arabidopsis_homologues",
    "common_names",
    "gene_homologues",
];

#[test]
fn open_db_in_memory_creates_every_table() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    for table in TABLES {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn reopening_a_store_keeps_schema_and_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("xerophyta_db.sqlite");

    let first = open_db(&path).unwrap();
    first
        .execute("INSERT INTO species (name) VALUES ('Xerophyta elegans');", [])
        .unwrap();
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(schema_version(&second).unwrap(), latest_version());
    assert_eq!(count(&second, "species"), 1);
}

#[test]
fn recreate_discards_existing_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("xerophyta_db.sqlite");

    let conn = open_db(&path).unwrap();
    conn.execute("INSERT INTO species (name) VALUES ('Xerophyta viscosa');", [])
        .unwrap();
    drop(conn);

    let fresh = recreate_db(&path).unwrap();
    assert_eq!(schema_version(&fresh).unwrap(), latest_version());
    assert_eq!(count(&fresh, "species"), 0);
}

#[test]
fn recreate_creates_a_missing_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("new.sqlite");

    let conn = recreate_db(&path).unwrap();
    assert!(path.exists());
    assert_table_exists(&conn, "genes");
}

#[test]
fn opening_store_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite");

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
fn foreign_keys_are_enforced() {
    let conn = open_db_in_memory().unwrap();
    let err = conn
        .execute(
            "INSERT INTO genes (gene_name, species_id) VALUES ('Xe_0001', 42);",
            [],
        )
        .unwrap_err();
    assert!(err.to_string().contains("FOREIGN KEY"));
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
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
