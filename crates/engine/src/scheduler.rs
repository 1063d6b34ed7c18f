// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recurring run loop.
//!
//! Each iteration creates a run, executes every stage in order against a
//! fresh [`RunContext`], and finalizes the run. A stage error skips the
//! remaining stages of that run only. Cancellation is observed between
//! runs and during delays; a run that has started is always finalized.

use crate::{stage_fn, RunContext, SchedulerError, Stage, StageFuture};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tr_adapters::RunSink;
use tr_core::{
    format_elapsed_verbose, machine_name, truncate_chars, Clock, NewRun, RunId, RunRecord,
    Severity, SystemClock, MAX_NAME_LEN,
};
use tr_storage::RunStore;

/// Upper bound on creating a run, and on its failure log and final save.
pub const DEFAULT_FINALIZE_TIMEOUT: Duration = Duration::from_secs(30);

/// Counts reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub runs: u64,
    pub failed_runs: u64,
}

pub struct Scheduler {
    name: String,
    host: String,
    startup_delay: Option<Duration>,
    interval: Option<Duration>,
    run_limit: Option<u64>,
    finalize_timeout: Duration,
    stages: Vec<Box<dyn Stage>>,
    store: Arc<dyn RunStore>,
    clock: Arc<dyn Clock>,
    sink: Option<Arc<dyn RunSink>>,
}

/// Fluent setup for a [`Scheduler`].
pub struct SchedulerBuilder {
    name: String,
    host: Option<String>,
    startup_delay: Option<Duration>,
    interval: Option<Duration>,
    run_limit: Option<u64>,
    finalize_timeout: Duration,
    stages: Vec<Box<dyn Stage>>,
    clock: Arc<dyn Clock>,
    sink: Option<Arc<dyn RunSink>>,
}

impl Scheduler {
    /// Start configuring a scheduler whose runs are recorded under `name`.
    pub fn setup(name: impl Into<String>) -> SchedulerBuilder {
        SchedulerBuilder {
            name: name.into(),
            host: None,
            startup_delay: None,
            interval: None,
            run_limit: None,
            finalize_timeout: DEFAULT_FINALIZE_TIMEOUT,
            stages: Vec::new(),
            clock: Arc::new(SystemClock),
            sink: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Run until `cancel` fires (or the run limit is reached).
    ///
    /// Stage errors are recorded and contained. Store failures when creating
    /// or finalizing a run end the loop with an error. Once a run record is
    /// created the run is executed and finalized even if `cancel` fires.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunSummary, SchedulerError> {
        let mut summary = RunSummary::default();

        if let Some(delay) = self.startup_delay {
            self.emit(
                Severity::Warning,
                None,
                &format!("Waiting {} before starting the first run.", format_elapsed_verbose(delay)),
            );
            sleep_or_cancel(delay, cancel).await;
        }

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let record = self.create_run().await?;
            let mut ctx = RunContext::new(record, Arc::clone(&self.store), Arc::clone(&self.clock));

            let failed = self.execute_stages(&mut ctx, cancel).await;
            summary.runs += 1;
            if failed {
                summary.failed_runs += 1;
            }

            self.finalize(&mut ctx).await?;
            tracing::info!(
                run_id = ctx.run_id().as_i64(),
                runtime_secs = ctx.run().runtime_secs,
                failed,
                "run finished"
            );

            if self.run_limit.is_some_and(|limit| summary.runs >= limit) {
                self.emit(
                    Severity::Information,
                    None,
                    &format!("Completed {} run(s). Stopping.", summary.runs),
                );
                return Ok(summary);
            }

            if let Some(interval) = self.interval {
                if cancel.is_cancelled() {
                    break;
                }
                self.emit(
                    Severity::Information,
                    Some(ctx.run_id()),
                    &format!("Waiting {} before re-running.", format_elapsed_verbose(interval)),
                );
                sleep_or_cancel(interval, cancel).await;
            }
        }

        self.emit(Severity::Warning, None, "Cancellation requested. Shutting down.");
        Ok(summary)
    }

    /// Insert the run record. External cancellation does not interrupt it,
    /// so a record that reaches the store is always executed and finalized.
    async fn create_run(&self) -> Result<RunRecord, SchedulerError> {
        let new = NewRun { name: self.name.clone(), host: self.host.clone(), started_at: self.clock.now() };
        let shield = CancellationToken::new();
        match tokio::time::timeout(self.finalize_timeout, self.store.create_run(new, &shield)).await {
            Ok(Ok(record)) => Ok(record),
            Ok(Err(e)) => Err(SchedulerError::Store(e)),
            Err(_) => Err(SchedulerError::CreateTimeout { timeout: self.finalize_timeout }),
        }
    }

    /// Returns true when a stage failed.
    async fn execute_stages(&self, ctx: &mut RunContext, cancel: &CancellationToken) -> bool {
        let run_id = ctx.run_id();
        self.emit(
            Severity::Information,
            Some(run_id),
            &format!("Starting a new run with {} stage(s).", self.stages.len()),
        );

        for stage in &self.stages {
            let name = stage.name();
            self.emit(Severity::Information, Some(run_id), &format!("Running stage \"{name}\"."));

            let start = self.clock.now();
            ctx.set_function_start(Some(start));

            match stage.run(ctx, cancel).await {
                Ok(()) => {
                    let took = (self.clock.now() - start).to_std().unwrap_or(Duration::ZERO);
                    let message = format!(
                        "Finished running stage \"{name}\" which took {}.",
                        format_elapsed_verbose(took)
                    );
                    self.emit(Severity::Information, Some(run_id), &message);
                    if let Err(e) = ctx.info(message, cancel).await {
                        tracing::warn!(run_id = run_id.as_i64(), stage = name, error = %e, "failed to record stage log");
                    }
                }
                Err(error) => {
                    self.emit(Severity::Error, Some(run_id), &format!("Stage \"{name}\" failed: {error:#}"));
                    self.record_failure(ctx, name, &error).await;
                    return true;
                }
            }
        }
        false
    }

    /// Append the failure entry. External cancellation does not interrupt it.
    async fn record_failure(&self, ctx: &RunContext, stage: &str, error: &anyhow::Error) {
        let shield = CancellationToken::new();
        let logged = tokio::time::timeout(
            self.finalize_timeout,
            ctx.log_failure(Severity::Error, error, Some(stage), &shield),
        )
        .await;
        match logged {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::warn!(run_id = ctx.run_id().as_i64(), stage, error = %e, "failed to record stage failure")
            }
            Err(_) => {
                tracing::warn!(run_id = ctx.run_id().as_i64(), stage, "recording stage failure timed out")
            }
        }
    }

    /// Stamp finish and save. External cancellation does not interrupt it.
    async fn finalize(&self, ctx: &mut RunContext) -> Result<(), SchedulerError> {
        let run_id = ctx.run_id();
        ctx.finish(self.clock.now());
        let shield = CancellationToken::new();
        match tokio::time::timeout(self.finalize_timeout, ctx.save(&shield)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(SchedulerError::Finalize { run_id, source }),
            Err(_) => Err(SchedulerError::FinalizeTimeout { run_id, timeout: self.finalize_timeout }),
        }
    }

    fn emit(&self, severity: Severity, run_id: Option<RunId>, message: &str) {
        if let Some(sink) = &self.sink {
            sink.emit(severity, run_id, message);
        }
    }
}

impl SchedulerBuilder {
    /// Host recorded on each run. Defaults to the machine name.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = Some(delay);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Stop after `runs` runs instead of waiting for cancellation.
    pub fn run_limit(mut self, runs: u64) -> Self {
        self.run_limit = Some(runs);
        self
    }

    pub fn finalize_timeout(mut self, timeout: Duration) -> Self {
        self.finalize_timeout = timeout;
        self
    }

    pub fn sink(mut self, sink: impl RunSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Append a closure stage; see [`stage_fn`].
    pub fn stage_fn<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut RunContext, &'a CancellationToken) -> StageFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        self.stage(stage_fn(name, f))
    }

    /// Validate the setup and bind it to a store.
    pub fn build(self, store: Arc<dyn RunStore>) -> Result<Scheduler, SchedulerError> {
        Severity::validate_table()?;
        if self.stages.is_empty() {
            return Err(SchedulerError::Config(
                "no stages configured; add one with stage() or stage_fn()".to_string(),
            ));
        }
        if self.name.chars().count() > MAX_NAME_LEN {
            return Err(SchedulerError::Config(format!(
                "run name '{}' is longer than {MAX_NAME_LEN} characters",
                self.name
            )));
        }
        if self.run_limit == Some(0) {
            return Err(SchedulerError::Config("run limit must be at least 1".to_string()));
        }
        if self.finalize_timeout.is_zero() {
            return Err(SchedulerError::Config("finalize timeout must be positive".to_string()));
        }

        let host = self.host.unwrap_or_else(machine_name);
        let host = truncate_chars(host.trim(), MAX_NAME_LEN).to_string();

        Ok(Scheduler {
            name: self.name,
            host,
            startup_delay: self.startup_delay,
            interval: self.interval,
            run_limit: self.run_limit,
            finalize_timeout: self.finalize_timeout,
            stages: self.stages,
            store,
            clock: self.clock,
            sink: self.sink,
        })
    }
}

/// Sleep for `duration` unless `cancel` fires first.
async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(duration) => {}
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
