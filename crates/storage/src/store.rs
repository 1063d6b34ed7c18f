// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::StoreError;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tr_core::{LogEntry, NewLogEntry, NewRun, RunId, RunRecord};

/// Persistence contract for runs and their log entries.
///
/// Every call observes `cancel` and may fail with [`StoreError::Cancelled`].
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Insert a run and return it with its store-assigned id.
    async fn create_run(
        &self,
        run: NewRun,
        cancel: &CancellationToken,
    ) -> Result<RunRecord, StoreError>;

    /// Load a run by id.
    async fn find_run(&self, id: RunId, cancel: &CancellationToken)
        -> Result<RunRecord, StoreError>;

    /// Commit finish time, duration and snapshot of an existing run.
    ///
    /// Identity fields (id, name, host, start) are never rewritten.
    async fn update_run(&self, run: &RunRecord, cancel: &CancellationToken)
        -> Result<(), StoreError>;

    /// Append a log entry. Entries for unknown runs fail with `NotFound`.
    async fn append_log(
        &self,
        entry: NewLogEntry,
        cancel: &CancellationToken,
    ) -> Result<LogEntry, StoreError>;

    /// Log entries of one run, in append order.
    async fn list_logs(
        &self,
        run_id: RunId,
        cancel: &CancellationToken,
    ) -> Result<Vec<LogEntry>, StoreError>;

    /// Runs in creation order, optionally only those with the given name.
    async fn list_runs(
        &self,
        name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<RunRecord>, StoreError>;
}
