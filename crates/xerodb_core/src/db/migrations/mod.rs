//! Schema migration registry for the gene-expression store.
//!
//! # Responsibility
//! - List schema steps (genes, experiments, GO terms, homologues) in order.
//! - Bring a connection up to the latest step inside one transaction.
//!
//! # Invariants
//! - Step versions are strictly increasing.
//! - `PRAGMA user_version` always equals the last applied step.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "genes",
        sql: include_str!("0001_genes.sql"),
    },
    SchemaStep {
        version: 2,
        name: "experiments",
        sql: include_str!("0002_experiments.sql"),
    },
    SchemaStep {
        version: 3,
        name: "go_terms",
        sql: include_str!("0003_go_terms.sql"),
    },
    SchemaStep {
        version: 4,
        name: "homologues",
        sql: include_str!("0004_homologues.sql"),
    },
];

/// Returns the newest schema version this build can create.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Reads the schema version recorded in the store.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

/// Applies every schema step newer than the stored version.
///
/// Refuses to touch a store written by a newer build.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let stored = schema_version(conn)?;
    let latest = latest_version();

    if stored > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: stored,
            latest_supported: latest,
        });
    }
    if stored == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in SCHEMA_STEPS.iter().filter(|step| step.version > stored) {
        tx.execute_batch(step.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", step.version))?;
        info!(
            "event=db_migrate module=db status=ok version={} step={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    Ok(())
}
