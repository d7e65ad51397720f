//! Relational schema for the share registry.

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::errors::{Result, ShareError};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Creates the tables on a fresh database and checks the version otherwise.
pub fn init_schema(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating share schema v{}", SCHEMA_VERSION);
        conn.execute_batch(SHARES_SCHEMA)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version > SCHEMA_VERSION {
        return Err(ShareError::Config(format!(
            "database schema v{} is newer than supported v{}",
            current_version, SCHEMA_VERSION
        )));
    }

    Ok(())
}

/// Drops every share; file rows follow through `ON DELETE CASCADE`.
pub const CLEAR_SQL: &str = "DELETE FROM shares";

fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;

    let version = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    Ok(())
}

const SHARES_SCHEMA: &str = r#"
-- One row per share; creation order is the ascending id
CREATE TABLE IF NOT EXISTS shares (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    token TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS share_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    share_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    path TEXT NOT NULL,

    FOREIGN KEY (share_id) REFERENCES shares(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_shares_name ON shares(name, id);
CREATE INDEX IF NOT EXISTS idx_share_files_share ON share_files(share_id, position);
"#;
