// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed run store.
//!
//! Two tables: `task_runs` and `task_run_logs`. Timestamps are stored as
//! RFC 3339 text in UTC.

use crate::schema::{apply_schema, read_schema_version};
use crate::{RunStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tr_core::{LogEntry, NewLogEntry, NewRun, RunId, RunRecord, Severity};

const RUN_COLUMNS: &str = "id, machine_name, name, started, finished, run_time_seconds, data";
const LOG_COLUMNS: &str =
    "id, run_id, created, log_type, message, stack_trace, source, reference_ids, data";

/// Run store over a single SQLite connection.
///
/// Calls run on the blocking pool and race the caller's cancellation token.
/// A cancelled call still completes in the background; its result is dropped.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::with_schema(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_schema(Connection::open_in_memory()?)
    }

    fn with_schema(conn: Connection) -> Result<Self, StoreError> {
        apply_schema(&conn)?;
        tracing::debug!(version = ?read_schema_version(&conn)?, "run store schema ready");
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    async fn with_conn<T, F>(&self, cancel: &CancellationToken, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        let conn = Arc::clone(&self.conn);
        let task = tokio::task::spawn_blocking(move || f(&mut conn.lock()));
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StoreError::Cancelled),
            joined = task => joined?,
        }
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_run(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let started: String = row.get(3)?;
    let finished: Option<String> = row.get(4)?;
    Ok(RunRecord {
        id: RunId(row.get(0)?),
        host: row.get(1)?,
        name: row.get(2)?,
        started_at: parse_timestamp(3, &started)?,
        finished_at: finished.as_deref().map(|raw| parse_timestamp(4, raw)).transpose()?,
        runtime_secs: row.get(5)?,
        data: row.get(6)?,
    })
}

fn row_to_log(row: &Row<'_>) -> rusqlite::Result<LogEntry> {
    let created: String = row.get(2)?;
    let code: String = row.get(3)?;
    let severity = code
        .parse::<Severity>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    Ok(LogEntry {
        id: row.get(0)?,
        run_id: RunId(row.get(1)?),
        created_at: parse_timestamp(2, &created)?,
        severity,
        message: row.get(4)?,
        stack_trace: row.get(5)?,
        source: row.get(6)?,
        reference_ids: row.get(7)?,
        data: row.get(8)?,
    })
}

fn run_exists(conn: &Connection, id: RunId) -> rusqlite::Result<bool> {
    conn.query_row("SELECT 1 FROM task_runs WHERE id = ?1", [id.as_i64()], |_| Ok(()))
        .optional()
        .map(|found| found.is_some())
}

#[async_trait]
impl RunStore for SqliteStore {
    async fn create_run(
        &self,
        run: NewRun,
        cancel: &CancellationToken,
    ) -> Result<RunRecord, StoreError> {
        self.with_conn(cancel, move |conn| {
            conn.execute(
                "INSERT INTO task_runs (machine_name, name, started) VALUES (?1, ?2, ?3)",
                params![run.host, run.name, format_timestamp(run.started_at)],
            )?;
            Ok(RunRecord::from_new(RunId(conn.last_insert_rowid()), run))
        })
        .await
    }

    async fn find_run(
        &self,
        id: RunId,
        cancel: &CancellationToken,
    ) -> Result<RunRecord, StoreError> {
        self.with_conn(cancel, move |conn| {
            conn.query_row(
                &format!("SELECT {RUN_COLUMNS} FROM task_runs WHERE id = ?1"),
                [id.as_i64()],
                row_to_run,
            )
            .optional()?
            .ok_or(StoreError::NotFound(id))
        })
        .await
    }

    async fn update_run(
        &self,
        run: &RunRecord,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        let id = run.id;
        let finished = run.finished_at.map(format_timestamp);
        let runtime = run.runtime_secs;
        let data = run.data.clone();
        self.with_conn(cancel, move |conn| {
            let changed = conn.execute(
                "UPDATE task_runs SET finished = ?1, run_time_seconds = ?2, data = ?3 WHERE id = ?4",
                params![finished, runtime, data, id.as_i64()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn append_log(
        &self,
        entry: NewLogEntry,
        cancel: &CancellationToken,
    ) -> Result<LogEntry, StoreError> {
        self.with_conn(cancel, move |conn| {
            let tx = conn.transaction()?;
            if !run_exists(&tx, entry.run_id)? {
                return Err(StoreError::NotFound(entry.run_id));
            }
            tx.execute(
                "INSERT INTO task_run_logs \
                 (run_id, created, log_type, message, stack_trace, source, reference_ids, data) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    entry.run_id.as_i64(),
                    format_timestamp(entry.created_at),
                    entry.severity.code(),
                    entry.message,
                    entry.stack_trace,
                    entry.source,
                    entry.reference_ids,
                    entry.data,
                ],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(LogEntry::from_new(id, entry))
        })
        .await
    }

    async fn list_logs(
        &self,
        run_id: RunId,
        cancel: &CancellationToken,
    ) -> Result<Vec<LogEntry>, StoreError> {
        self.with_conn(cancel, move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LOG_COLUMNS} FROM task_run_logs WHERE run_id = ?1 ORDER BY id"
            ))?;
            let rows = stmt.query_map([run_id.as_i64()], row_to_log)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn list_runs(
        &self,
        name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<RunRecord>, StoreError> {
        let name = name.map(str::to_string);
        self.with_conn(cancel, move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RUN_COLUMNS} FROM task_runs \
                 WHERE ?1 IS NULL OR name = ?1 ORDER BY id"
            ))?;
            let rows = stmt.query_map([name], row_to_run)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }
}

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;
