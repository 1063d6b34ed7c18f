// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::ContextError;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tr_adapters::FakeSink;
use tr_core::{DataKey, FakeClock, LogEntry, NewLogEntry, Severity};
use tr_storage::{MemoryStore, StoreError};

/// Stage that records its name when run and optionally fails.
struct Recorder {
    name: String,
    seen: Arc<Mutex<Vec<String>>>,
    fail_with: Option<&'static str>,
}

impl Recorder {
    fn ok(name: &str, seen: &Arc<Mutex<Vec<String>>>) -> Self {
        Self { name: name.to_string(), seen: Arc::clone(seen), fail_with: None }
    }

    fn failing(name: &str, seen: &Arc<Mutex<Vec<String>>>, message: &'static str) -> Self {
        Self { name: name.to_string(), seen: Arc::clone(seen), fail_with: Some(message) }
    }
}

#[async_trait]
impl Stage for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &mut RunContext, _cancel: &CancellationToken) -> anyhow::Result<()> {
        self.seen.lock().push(self.name.clone());
        match self.fail_with {
            Some(message) => Err(anyhow::anyhow!(message)),
            None => Ok(()),
        }
    }
}

fn token() -> CancellationToken {
    CancellationToken::new()
}

// ── Setup ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn build_without_stages_fails_before_any_run() {
    let store = MemoryStore::new();
    let result = Scheduler::setup("sync").build(Arc::new(store.clone()));
    assert!(matches!(result, Err(SchedulerError::Config(_))));
    assert!(store.list_runs(None, &token()).await.unwrap().is_empty());
}

#[test]
fn build_rejects_long_run_name() {
    let seen = Arc::default();
    let result = Scheduler::setup("n".repeat(MAX_NAME_LEN + 1))
        .stage(Recorder::ok("a", &seen))
        .build(Arc::new(MemoryStore::new()));
    assert!(matches!(result, Err(SchedulerError::Config(ref m)) if m.contains("longer than 64")));
}

#[test]
fn build_accepts_name_at_limit() {
    let seen = Arc::default();
    let scheduler = Scheduler::setup("n".repeat(MAX_NAME_LEN))
        .stage(Recorder::ok("a", &seen))
        .build(Arc::new(MemoryStore::new()))
        .unwrap();
    assert_eq!(scheduler.name().chars().count(), MAX_NAME_LEN);
}

#[yare::parameterized(
    zero_run_limit        = { Some(0), Duration::from_secs(30) },
    zero_finalize_timeout = { None,    Duration::ZERO },
)]
fn build_rejects_degenerate_limits(run_limit: Option<u64>, finalize_timeout: Duration) {
    let seen = Arc::default();
    let mut builder = Scheduler::setup("sync")
        .stage(Recorder::ok("a", &seen))
        .finalize_timeout(finalize_timeout);
    if let Some(limit) = run_limit {
        builder = builder.run_limit(limit);
    }
    assert!(matches!(builder.build(Arc::new(MemoryStore::new())), Err(SchedulerError::Config(_))));
}

#[test]
fn host_defaults_to_machine_name_and_is_truncated() {
    let seen = Arc::default();
    let scheduler = Scheduler::setup("sync")
        .stage(Recorder::ok("a", &seen))
        .build(Arc::new(MemoryStore::new()))
        .unwrap();
    assert!(!scheduler.host().is_empty());

    let scheduler = Scheduler::setup("sync")
        .host("h".repeat(80))
        .stage(Recorder::ok("a", &seen))
        .stage(Recorder::ok("b", &seen))
        .build(Arc::new(MemoryStore::new()))
        .unwrap();
    assert_eq!(scheduler.host().len(), MAX_NAME_LEN);
    assert_eq!(scheduler.stage_names(), vec!["a", "b"]);
}

// ── Run execution ───────────────────────────────────────────────────────

#[tokio::test]
async fn counting_stage_run_is_persisted() {
    let store = MemoryStore::new();
    let scheduler = Scheduler::setup("sync")
        .host("box")
        .run_limit(1)
        .stage_fn("count", |ctx, _cancel| {
            Box::pin(async move {
                ctx.increment(DataKey::Total, None)?;
                ctx.increment(DataKey::Processed, None)?;
                anyhow::Ok(())
            })
        })
        .build(Arc::new(store.clone()))
        .unwrap();

    let summary = scheduler.run(&token()).await.unwrap();
    assert_eq!(summary, RunSummary { runs: 1, failed_runs: 0 });

    let runs = store.list_runs(Some("sync"), &token()).await.unwrap();
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert_eq!(run.host, "box");
    assert_eq!(run.data.as_deref(), Some(r#"{"Processed":1,"Total":1}"#));
    assert!(run.finished_at.unwrap() >= run.started_at);
    assert!(run.runtime_secs.unwrap() >= 0);

    let logs = store.list_logs(run.id, &token()).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].severity, Severity::Information);
    assert!(logs[0].message.as_deref().unwrap().starts_with("Finished running stage \"count\""));
}

#[tokio::test]
async fn failing_stage_is_logged_once_and_run_is_finalized() {
    let store = MemoryStore::new();
    let sink = FakeSink::new();
    let seen = Arc::default();
    let scheduler = Scheduler::setup("sync")
        .run_limit(1)
        .sink(sink.clone())
        .stage(Recorder::failing("explode", &seen, "boom"))
        .build(Arc::new(store.clone()))
        .unwrap();

    let summary = scheduler.run(&token()).await.unwrap();
    assert_eq!(summary, RunSummary { runs: 1, failed_runs: 1 });

    let runs = store.list_runs(None, &token()).await.unwrap();
    let run = &runs[0];
    assert!(run.finished_at.is_some());
    let errors: Vec<_> = store
        .list_logs(run.id, &token())
        .await
        .unwrap()
        .into_iter()
        .filter(|entry| entry.severity == Severity::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message.as_deref(), Some("boom"));
    assert_eq!(errors[0].source.as_deref(), Some("explode"));
    assert!(errors[0].stack_trace.is_some());
    assert!(sink.contains("Stage \"explode\" failed: boom"));
}

#[tokio::test]
async fn failure_at_stage_k_skips_the_rest() {
    for n in 1..=4_usize {
        for k in 1..=n {
            let store = MemoryStore::new();
            let seen: Arc<Mutex<Vec<String>>> = Arc::default();
            let mut builder = Scheduler::setup("chain").run_limit(1);
            for i in 1..=n {
                let name = format!("s{i}");
                builder = if i == k {
                    builder.stage(Recorder::failing(&name, &seen, "stage failed"))
                } else {
                    builder.stage(Recorder::ok(&name, &seen))
                };
            }
            let scheduler = builder.build(Arc::new(store.clone())).unwrap();
            scheduler.run(&token()).await.unwrap();

            let expected: Vec<String> = (1..=k).map(|i| format!("s{i}")).collect();
            assert_eq!(*seen.lock(), expected, "n={n} k={k}");

            let runs = store.list_runs(None, &token()).await.unwrap();
            let run = &runs[0];
            let logs = store.list_logs(run.id, &token()).await.unwrap();
            let errors = logs.iter().filter(|entry| entry.severity == Severity::Error).count();
            let infos = logs.iter().filter(|entry| entry.severity == Severity::Information).count();
            assert_eq!(errors, 1, "n={n} k={k}");
            assert_eq!(infos, k - 1, "n={n} k={k}");
            assert!(run.finished_at.is_some(), "n={n} k={k}");
        }
    }
}

#[tokio::test]
async fn stage_failure_does_not_stop_later_runs() {
    let store = MemoryStore::new();
    let seen = Arc::default();
    let scheduler = Scheduler::setup("sync")
        .run_limit(3)
        .stage(Recorder::failing("flaky", &seen, "nope"))
        .build(Arc::new(store.clone()))
        .unwrap();

    let summary = scheduler.run(&token()).await.unwrap();
    assert_eq!(summary, RunSummary { runs: 3, failed_runs: 3 });
    assert_eq!(seen.lock().len(), 3);
    let runs = store.list_runs(None, &token()).await.unwrap();
    assert!(runs.iter().all(|run| run.finished_at.is_some()));
}

#[tokio::test]
async fn each_run_gets_a_fresh_scratch_space() {
    let store = MemoryStore::new();
    let scheduler = Scheduler::setup("sync")
        .run_limit(2)
        .stage_fn("count", |ctx, _cancel| {
            Box::pin(async move {
                ctx.increment(DataKey::Total, None)?;
                anyhow::Ok(())
            })
        })
        .build(Arc::new(store.clone()))
        .unwrap();

    scheduler.run(&token()).await.unwrap();
    let runs = store.list_runs(None, &token()).await.unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|run| run.data.as_deref() == Some(r#"{"Total":1}"#)));
    assert_ne!(runs[0].id, runs[1].id);
}

#[tokio::test]
async fn function_start_is_reset_before_each_stage() {
    let store = MemoryStore::new();
    let sink = FakeSink::new();
    let clock = FakeClock::new();
    let observed: Arc<Mutex<Option<chrono::DateTime<chrono::Utc>>>> = Arc::default();

    let advancing = clock.clone();
    let probe = Arc::clone(&observed);
    let scheduler = Scheduler::setup("timed")
        .run_limit(1)
        .clock(clock.clone())
        .sink(sink.clone())
        .stage_fn("slow", move |_ctx, _cancel| {
            let clock = advancing.clone();
            Box::pin(async move {
                clock.advance(Duration::from_secs(5));
                anyhow::Ok(())
            })
        })
        .stage_fn("check", move |ctx, _cancel| {
            let probe = Arc::clone(&probe);
            Box::pin(async move {
                *probe.lock() = ctx.function_start();
                anyhow::Ok(())
            })
        })
        .build(Arc::new(store.clone()))
        .unwrap();

    let started = clock.now();
    scheduler.run(&token()).await.unwrap();

    assert_eq!(*observed.lock(), Some(started + chrono::Duration::seconds(5)));
    assert!(sink.contains("Finished running stage \"slow\" which took 5 seconds (5s)."));
    assert!(sink.contains("Finished running stage \"check\" which took 0 seconds (0ns)."));

    let runs = store.list_runs(None, &token()).await.unwrap();
    let run = &runs[0];
    assert_eq!(run.runtime_secs, Some(5));
}

#[tokio::test]
async fn sink_messages_carry_run_id() {
    let store = MemoryStore::new();
    let sink = FakeSink::new();
    let seen = Arc::default();
    let scheduler = Scheduler::setup("sync")
        .run_limit(1)
        .sink(sink.clone())
        .stage(Recorder::ok("a", &seen))
        .build(Arc::new(store.clone()))
        .unwrap();

    scheduler.run(&token()).await.unwrap();
    let run_id = store.list_runs(None, &token()).await.unwrap()[0].id;

    let calls = sink.calls();
    let run_calls: Vec<_> = calls.iter().filter(|call| call.run_id == Some(run_id)).collect();
    assert_eq!(run_calls[0].message, "Starting a new run with 1 stage(s).");
    assert_eq!(run_calls[1].message, "Running stage \"a\".");
    assert!(run_calls[2].message.starts_with("Finished running stage \"a\""));
    assert_eq!(calls.last().unwrap().message, "Completed 1 run(s). Stopping.");
}

// ── Cancellation ────────────────────────────────────────────────────────

/// Store whose inserts commit immediately but only return once released,
/// reporting `Cancelled` if the caller's token fires first.
struct HeldCreate {
    inner: MemoryStore,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl RunStore for HeldCreate {
    async fn create_run(
        &self,
        run: NewRun,
        cancel: &CancellationToken,
    ) -> Result<RunRecord, StoreError> {
        let record = self.inner.create_run(run, cancel).await?;
        self.entered.notify_one();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StoreError::Cancelled),
            _ = self.release.notified() => Ok(record),
        }
    }

    async fn find_run(&self, id: RunId, cancel: &CancellationToken) -> Result<RunRecord, StoreError> {
        self.inner.find_run(id, cancel).await
    }

    async fn update_run(&self, run: &RunRecord, cancel: &CancellationToken) -> Result<(), StoreError> {
        self.inner.update_run(run, cancel).await
    }

    async fn append_log(
        &self,
        entry: NewLogEntry,
        cancel: &CancellationToken,
    ) -> Result<LogEntry, StoreError> {
        self.inner.append_log(entry, cancel).await
    }

    async fn list_logs(
        &self,
        run_id: RunId,
        cancel: &CancellationToken,
    ) -> Result<Vec<LogEntry>, StoreError> {
        self.inner.list_logs(run_id, cancel).await
    }

    async fn list_runs(
        &self,
        name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<RunRecord>, StoreError> {
        self.inner.list_runs(name, cancel).await
    }
}

#[tokio::test]
async fn cancel_while_creating_a_run_still_finalizes_it() {
    let inner = MemoryStore::new();
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let store = HeldCreate { inner: inner.clone(), entered: Arc::clone(&entered), release: Arc::clone(&release) };
    let seen = Arc::default();
    let scheduler = Scheduler::setup("held")
        .stage(Recorder::ok("a", &seen))
        .build(Arc::new(store))
        .unwrap();

    let cancel = token();
    let (summary, ()) = tokio::join!(scheduler.run(&cancel), async {
        entered.notified().await;
        cancel.cancel();
        release.notify_one();
    });

    assert_eq!(summary.unwrap(), RunSummary { runs: 1, failed_runs: 0 });
    let runs = inner.list_runs(None, &token()).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert!(runs[0].is_finished());
    assert_eq!(*seen.lock(), vec!["a".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn stalled_run_creation_times_out() {
    let inner = MemoryStore::new();
    let store = HeldCreate { inner, entered: Arc::default(), release: Arc::default() };
    let seen = Arc::default();
    let scheduler = Scheduler::setup("stalled")
        .finalize_timeout(Duration::from_secs(5))
        .stage(Recorder::ok("a", &seen))
        .build(Arc::new(store))
        .unwrap();

    let result = scheduler.run(&token()).await;
    assert!(matches!(result, Err(SchedulerError::CreateTimeout { timeout }) if timeout == Duration::from_secs(5)));
    assert!(seen.lock().is_empty());
}

#[tokio::test]
async fn cancelled_before_first_run_creates_nothing() {
    let store = MemoryStore::new();
    let sink = FakeSink::new();
    let seen = Arc::default();
    let scheduler = Scheduler::setup("sync")
        .sink(sink.clone())
        .stage(Recorder::ok("a", &seen))
        .build(Arc::new(store.clone()))
        .unwrap();

    let cancel = token();
    cancel.cancel();
    let summary = scheduler.run(&cancel).await.unwrap();

    assert_eq!(summary.runs, 0);
    assert!(store.list_runs(None, &token()).await.unwrap().is_empty());
    assert!(sink.contains("Cancellation requested. Shutting down."));
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_startup_delay() {
    let store = MemoryStore::new();
    let sink = FakeSink::new();
    let seen = Arc::default();
    let scheduler = Scheduler::setup("sync")
        .startup_delay(Duration::from_secs(600))
        .sink(sink.clone())
        .stage(Recorder::ok("a", &seen))
        .build(Arc::new(store.clone()))
        .unwrap();

    let cancel = token();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let begin = tokio::time::Instant::now();
    let summary = scheduler.run(&cancel).await.unwrap();
    assert_eq!(summary.runs, 0);
    assert!(begin.elapsed() < Duration::from_secs(600));
    assert!(store.list_runs(None, &token()).await.unwrap().is_empty());
    assert!(sink.contains("Waiting 10 minutes (600s) before starting the first run."));
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_interval_keeps_finished_run() {
    let store = MemoryStore::new();
    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let scheduler = Scheduler::setup("sync")
        .interval(Duration::from_secs(3_600))
        .stage(Recorder::ok("a", &seen))
        .build(Arc::new(store.clone()))
        .unwrap();

    let cancel = token();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        trigger.cancel();
    });

    let summary = scheduler.run(&cancel).await.unwrap();
    assert_eq!(summary, RunSummary { runs: 1, failed_runs: 0 });
    assert_eq!(seen.lock().len(), 1);
    let runs = store.list_runs(None, &token()).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert!(runs[0].finished_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn interval_separates_runs() {
    let store = MemoryStore::new();
    let sink = FakeSink::new();
    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let scheduler = Scheduler::setup("sync")
        .interval(Duration::from_secs(90))
        .run_limit(3)
        .sink(sink.clone())
        .stage(Recorder::ok("a", &seen))
        .build(Arc::new(store.clone()))
        .unwrap();

    let begin = tokio::time::Instant::now();
    let summary = scheduler.run(&token()).await.unwrap();
    assert_eq!(summary.runs, 3);
    // Two waits; none after the last run
    assert!(begin.elapsed() >= Duration::from_secs(180));
    assert!(begin.elapsed() < Duration::from_secs(270));
    let waits = sink.messages().iter().filter(|m| m.starts_with("Waiting 1 minute and 30 seconds")).count();
    assert_eq!(waits, 2);
}

#[tokio::test]
async fn stage_cancelling_mid_run_still_finalizes() {
    let store = MemoryStore::new();
    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let scheduler = Scheduler::setup("sync")
        .interval(Duration::from_secs(3_600))
        .stage_fn("stop", |ctx, cancel| {
            Box::pin(async move {
                ctx.increment(DataKey::Processed, None)?;
                cancel.cancel();
                Err::<(), _>(anyhow::anyhow!("interrupted"))
            })
        })
        .stage(Recorder::ok("after", &seen))
        .build(Arc::new(store.clone()))
        .unwrap();

    let summary = scheduler.run(&token()).await.unwrap();
    assert_eq!(summary, RunSummary { runs: 1, failed_runs: 1 });
    assert!(seen.lock().is_empty());

    let runs = store.list_runs(None, &token()).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert!(runs[0].finished_at.is_some());
    assert_eq!(runs[0].data.as_deref(), Some(r#"{"Processed":1}"#));
    let logs = store.list_logs(runs[0].id, &token()).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].message.as_deref(), Some("interrupted"));
}

// ── Store failures ──────────────────────────────────────────────────────

#[tokio::test]
async fn unavailable_store_ends_loop_with_error() {
    let store = MemoryStore::new();
    store.set_unavailable(Some("offline"));
    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let scheduler = Scheduler::setup("sync")
        .stage(Recorder::ok("a", &seen))
        .build(Arc::new(store.clone()))
        .unwrap();

    let result = scheduler.run(&token()).await;
    assert!(matches!(result, Err(SchedulerError::Store(_))));
    assert!(seen.lock().is_empty());
}

#[tokio::test]
async fn run_removed_during_execution_fails_finalize() {
    let store = MemoryStore::new();
    let handle = store.clone();
    let scheduler = Scheduler::setup("sync")
        .stage_fn("vanish", move |ctx, _cancel| {
            let handle = handle.clone();
            Box::pin(async move {
                handle.remove_run(ctx.run_id());
                anyhow::Ok(())
            })
        })
        .build(Arc::new(store.clone()))
        .unwrap();

    let result = scheduler.run(&token()).await;
    assert!(matches!(
        result,
        Err(SchedulerError::Finalize { source: ContextError::Store(StoreError::NotFound(_)), .. })
    ));
}
