//! Opening, configuring and recreating the store file.
//!
//! # Invariants
//! - Returned connections enforce foreign keys.
//! - Returned connections are migrated to `latest_version()`.

use super::migrations::apply_migrations;
use super::DbResult;
use log::{error, info, warn};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// File name used when callers do not configure a database path.
pub const DEFAULT_DATABASE_NAME: &str = "xerophyta_db.sqlite";

/// Bulk loads hold the write lock for a whole window.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

enum Target<'a> {
    File(&'a Path),
    Memory,
}

impl Target<'_> {
    fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory => "memory",
        }
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        match self {
            Self::File(path) => Connection::open(path),
            Self::Memory => Connection::open_in_memory(),
        }
    }
}

/// Opens the store at `path`, creating the file when it does not exist.
///
/// Emits `db_open` events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_target(Target::File(path.as_ref()))
}

/// Opens a private in-memory store with the full schema.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_target(Target::Memory)
}

/// Deletes the store at `path` and creates a fresh, fully migrated one.
///
/// Every stored row is lost; callers gate this behind operator confirmation.
pub fn recreate_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    if path.exists() {
        warn!(
            "event=db_recreate module=db status=start action=delete path={}",
            path.display()
        );
        std::fs::remove_file(path)?;
    } else {
        info!(
            "event=db_recreate module=db status=start action=create path={}",
            path.display()
        );
    }

    let conn = open_db(path)?;
    info!("event=db_recreate module=db status=ok");
    Ok(conn)
}

fn open_target(target: Target<'_>) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = target.mode();
    info!("event=db_open module=db status=start mode={mode}");

    let result = target
        .connect()
        .map_err(Into::into)
        .and_then(|mut conn| configure(&mut conn).map(|()| conn));

    match result {
        Ok(conn) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn configure(conn: &mut Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)
}
