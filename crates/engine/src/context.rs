// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run context: binds one run record to one scratch space for a run.
//!
//! Stages read and write scratch data and counters through the context, and
//! record audit log entries against the run. Nothing reaches storage until
//! [`RunContext::save`] except log entries, which are appended immediately.

use crate::{ContextError, EtaError};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tr_core::{Clock, DataKey, LogDetails, LogEntry, RunId, RunRecord, ScratchError, ScratchSpace, Severity};
use tr_storage::RunStore;

pub struct RunContext {
    store: Arc<dyn RunStore>,
    clock: Arc<dyn Clock>,
    run: RunRecord,
    scratch: ScratchSpace,
    function_start: Option<DateTime<Utc>>,
}

impl RunContext {
    pub fn new(run: RunRecord, store: Arc<dyn RunStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock, run, scratch: ScratchSpace::new(), function_start: None }
    }

    pub fn run(&self) -> &RunRecord {
        &self.run
    }

    pub fn run_id(&self) -> RunId {
        self.run.id
    }

    pub fn scratch(&self) -> &ScratchSpace {
        &self.scratch
    }

    pub fn scratch_mut(&mut self) -> &mut ScratchSpace {
        &mut self.scratch
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ── Scratch data ────────────────────────────────────────────────────

    pub fn get_data(&self, key: &str) -> Option<&Value> {
        self.scratch.get(key)
    }

    pub fn get_data_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ScratchError> {
        self.scratch.get_as(key)
    }

    pub fn set_data<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> Result<(), ScratchError> {
        self.scratch.set(key, value)
    }

    pub fn get_keyed_data_as<T: DeserializeOwned>(
        &self,
        key: DataKey,
        prefix: Option<&str>,
    ) -> Result<Option<T>, ScratchError> {
        self.scratch.get_as(&key.scoped(prefix))
    }

    pub fn set_keyed_data<T: Serialize>(
        &mut self,
        key: DataKey,
        prefix: Option<&str>,
        value: T,
    ) -> Result<(), ScratchError> {
        self.scratch.set(key.scoped(prefix), value)
    }

    /// Add one to `prefix.key` (absent counts as zero).
    pub fn increment(&mut self, key: DataKey, prefix: Option<&str>) -> Result<i64, ScratchError> {
        self.scratch.increment(&key.scoped(prefix))
    }

    /// Subtract one from `prefix.key` (absent counts as zero).
    pub fn decrement(&mut self, key: DataKey, prefix: Option<&str>) -> Result<i64, ScratchError> {
        self.scratch.decrement(&key.scoped(prefix))
    }

    pub fn counter(&self, key: DataKey, prefix: Option<&str>) -> Result<i64, ScratchError> {
        self.scratch.counter(&key.scoped(prefix))
    }

    // ── Timing ──────────────────────────────────────────────────────────

    /// Set the reference instant for [`RunContext::estimate_time_remaining`].
    ///
    /// `None` means now. Independent of the run's start time.
    pub fn set_function_start(&mut self, at: Option<DateTime<Utc>>) {
        self.function_start = Some(at.unwrap_or_else(|| self.clock.now()));
    }

    pub fn function_start(&self) -> Option<DateTime<Utc>> {
        self.function_start
    }

    /// Linear estimate of the time left to process `total - processed` items.
    ///
    /// Elapsed time is measured from the function start, else the run start.
    /// Calling with `processed == 0` is a caller error.
    pub fn estimate_time_remaining(&self, total: u64, processed: u64) -> Result<Duration, EtaError> {
        if processed == 0 {
            return Err(EtaError::NothingProcessed);
        }
        if processed > total {
            return Err(EtaError::ProcessedExceedsTotal { processed, total });
        }
        let since = self.function_start.unwrap_or(self.run.started_at);
        let elapsed = (self.clock.now() - since).to_std().unwrap_or(Duration::ZERO);
        let per_item_ms = elapsed.as_secs_f64() * 1_000.0 / processed as f64;
        let remaining_ms = per_item_ms * (total - processed) as f64;
        Duration::try_from_secs_f64(remaining_ms / 1_000.0).map_err(|_| EtaError::OutOfRange)
    }

    // ── Logging ─────────────────────────────────────────────────────────

    /// Append a log entry for this run.
    pub async fn log(
        &self,
        severity: Severity,
        details: impl Into<LogDetails>,
        cancel: &CancellationToken,
    ) -> Result<LogEntry, ContextError> {
        let entry = details.into().into_entry(self.run.id, severity, self.clock.now())?;
        Ok(self.store.append_log(entry, cancel).await?)
    }

    pub async fn trace(
        &self,
        details: impl Into<LogDetails>,
        cancel: &CancellationToken,
    ) -> Result<LogEntry, ContextError> {
        self.log(Severity::Trace, details, cancel).await
    }

    pub async fn debug(
        &self,
        details: impl Into<LogDetails>,
        cancel: &CancellationToken,
    ) -> Result<LogEntry, ContextError> {
        self.log(Severity::Debug, details, cancel).await
    }

    pub async fn info(
        &self,
        details: impl Into<LogDetails>,
        cancel: &CancellationToken,
    ) -> Result<LogEntry, ContextError> {
        self.log(Severity::Information, details, cancel).await
    }

    pub async fn warn(
        &self,
        details: impl Into<LogDetails>,
        cancel: &CancellationToken,
    ) -> Result<LogEntry, ContextError> {
        self.log(Severity::Warning, details, cancel).await
    }

    pub async fn error(
        &self,
        details: impl Into<LogDetails>,
        cancel: &CancellationToken,
    ) -> Result<LogEntry, ContextError> {
        self.log(Severity::Error, details, cancel).await
    }

    pub async fn critical(
        &self,
        details: impl Into<LogDetails>,
        cancel: &CancellationToken,
    ) -> Result<LogEntry, ContextError> {
        self.log(Severity::Critical, details, cancel).await
    }

    /// Record a failure: the error's message, its cause chain and backtrace
    /// (when one was captured) as stack trace, and `source`.
    pub async fn log_failure(
        &self,
        severity: Severity,
        error: &anyhow::Error,
        source: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<LogEntry, ContextError> {
        let mut details = LogDetails::message(error.to_string()).stack_trace(format!("{error:?}"));
        if let Some(source) = source {
            details = details.source(source);
        }
        self.log(severity, details, cancel).await
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Stamp finish time and whole-second duration on the in-memory record.
    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.run.finish(at);
    }

    /// Flush finish time, duration and the scratch snapshot to the store.
    ///
    /// Fails with `NotFound` if the run was removed from the store.
    pub async fn save(&mut self, cancel: &CancellationToken) -> Result<(), ContextError> {
        let mut stored = self.store.find_run(self.run.id, cancel).await?;
        if !self.scratch.is_empty() {
            self.run.data = Some(self.scratch.to_snapshot()?);
        }
        stored.data = self.run.data.clone();
        stored.finished_at = self.run.finished_at;
        stored.runtime_secs = self.run.runtime_secs;
        self.store.update_run(&stored, cancel).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
