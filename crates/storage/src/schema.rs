// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite DDL for the run store.

use rusqlite::Connection;

pub(crate) const SCHEMA_VERSION: u32 = 1;

/// Complete DDL. `IF NOT EXISTS` throughout so it can be applied on every open.
const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS task_runs (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    machine_name     TEXT NOT NULL CHECK (length(machine_name) <= 64),
    name             TEXT NOT NULL CHECK (length(name) <= 64),
    started          TEXT NOT NULL,      -- RFC 3339, UTC
    finished         TEXT,
    run_time_seconds INTEGER,
    data             TEXT                -- JSON scratch snapshot
);

CREATE INDEX IF NOT EXISTS idx_task_runs_name ON task_runs(name);

CREATE TABLE IF NOT EXISTS task_run_logs (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id        INTEGER NOT NULL REFERENCES task_runs(id),
    created       TEXT NOT NULL,
    log_type      TEXT NOT NULL CHECK (length(log_type) BETWEEN 1 AND 5),
    message       TEXT,
    stack_trace   TEXT,
    source        TEXT,
    reference_ids TEXT,                  -- JSON array of integers
    data          TEXT                   -- JSON payload
);

CREATE INDEX IF NOT EXISTS idx_task_run_logs_run ON task_run_logs(run_id);
"#;

pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        rusqlite::params![SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

pub(crate) fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_meta WHERE key = 'schema_version'")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => {
            let value: String = row.get(0)?;
            Ok(value.parse().ok())
        }
        None => Ok(None),
    }
}
