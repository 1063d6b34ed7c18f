// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub use std::sync::Arc;
pub use std::time::Duration;
pub use tokio_util::sync::CancellationToken;
pub use tr_core::{DataKey, LogEntry, RunRecord, Severity};
pub use tr_engine::{Scheduler, SchedulerError};
pub use tr_storage::{RunStore, SqliteStore};

/// A store backed by a database file in its own temp directory.
pub struct Db {
    pub store: SqliteStore,
    _dir: tempfile::TempDir,
}

impl Db {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("runs.db")).unwrap();
        Self { store, _dir: dir }
    }

    pub fn shared(&self) -> Arc<dyn RunStore> {
        Arc::new(self.store.clone())
    }

    pub async fn runs(&self, name: &str) -> Vec<RunRecord> {
        self.store.list_runs(Some(name), &CancellationToken::new()).await.unwrap()
    }

    pub async fn logs(&self, run: &RunRecord) -> Vec<LogEntry> {
        self.store.list_logs(run.id, &CancellationToken::new()).await.unwrap()
    }
}

pub fn snapshot(run: &RunRecord) -> serde_json::Value {
    serde_json::from_str(run.data.as_deref().unwrap()).unwrap()
}
