// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process run store.

use crate::{RunStore, StoreError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tr_core::{LogEntry, NewLogEntry, NewRun, RunId, RunRecord};

#[derive(Debug, Default)]
struct MemoryState {
    runs: BTreeMap<RunId, RunRecord>,
    logs: Vec<LogEntry>,
    last_run_id: i64,
    last_log_id: i64,
    unavailable: Option<String>,
}

/// Run store kept entirely in memory.
///
/// Clones share the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(&self, cancel: &CancellationToken) -> Result<(), StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        match &self.state.lock().unavailable {
            Some(reason) => Err(StoreError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl MemoryStore {
    /// Drop a run and its logs, simulating external deletion.
    pub fn remove_run(&self, id: RunId) -> Option<RunRecord> {
        let mut state = self.state.lock();
        state.logs.retain(|entry| entry.run_id != id);
        state.runs.remove(&id)
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, reason: Option<&str>) {
        self.state.lock().unavailable = reason.map(str::to_string);
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn create_run(
        &self,
        run: NewRun,
        cancel: &CancellationToken,
    ) -> Result<RunRecord, StoreError> {
        self.check(cancel)?;
        let mut state = self.state.lock();
        state.last_run_id += 1;
        let record = RunRecord::from_new(RunId(state.last_run_id), run);
        state.runs.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_run(
        &self,
        id: RunId,
        cancel: &CancellationToken,
    ) -> Result<RunRecord, StoreError> {
        self.check(cancel)?;
        self.state.lock().runs.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn update_run(
        &self,
        run: &RunRecord,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        self.check(cancel)?;
        let mut state = self.state.lock();
        let stored = state.runs.get_mut(&run.id).ok_or(StoreError::NotFound(run.id))?;
        stored.finished_at = run.finished_at;
        stored.runtime_secs = run.runtime_secs;
        stored.data = run.data.clone();
        Ok(())
    }

    async fn append_log(
        &self,
        entry: NewLogEntry,
        cancel: &CancellationToken,
    ) -> Result<LogEntry, StoreError> {
        self.check(cancel)?;
        let mut state = self.state.lock();
        if !state.runs.contains_key(&entry.run_id) {
            return Err(StoreError::NotFound(entry.run_id));
        }
        state.last_log_id += 1;
        let stored = LogEntry::from_new(state.last_log_id, entry);
        state.logs.push(stored.clone());
        Ok(stored)
    }

    async fn list_logs(
        &self,
        run_id: RunId,
        cancel: &CancellationToken,
    ) -> Result<Vec<LogEntry>, StoreError> {
        self.check(cancel)?;
        let state = self.state.lock();
        Ok(state.logs.iter().filter(|entry| entry.run_id == run_id).cloned().collect())
    }

    async fn list_runs(
        &self,
        name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<RunRecord>, StoreError> {
        self.check(cancel)?;
        let state = self.state.lock();
        Ok(state
            .runs
            .values()
            .filter(|run| name.map_or(true, |name| run.name == name))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
