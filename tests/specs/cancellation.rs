// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::prelude::*;

#[tokio::test]
async fn cancelled_before_start_records_nothing() {
    let db = Db::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = Scheduler::setup("idle")
        .stage_fn("noop", |_, _| Box::pin(async { anyhow::Ok(()) }))
        .build(db.shared())
        .unwrap()
        .run(&cancel)
        .await
        .unwrap();

    assert_eq!(summary.runs, 0);
    assert!(db.runs("idle").await.is_empty());
}

#[tokio::test]
async fn cancel_during_interval_stops_after_finalizing() {
    let db = Db::new();
    let cancel = CancellationToken::new();
    let scheduler = Scheduler::setup("looping")
        .stage_fn("count", |ctx, _| {
            Box::pin(async move {
                ctx.increment(DataKey::Processed, None)?;
                anyhow::Ok(())
            })
        })
        .interval(Duration::from_secs(3_600))
        .build(db.shared())
        .unwrap();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });
    let summary = tokio::time::timeout(Duration::from_secs(10), scheduler.run(&cancel))
        .await
        .expect("cancellation should interrupt the interval")
        .unwrap();

    assert_eq!(summary.runs, 1);
    let runs = db.runs("looping").await;
    assert_eq!(runs.len(), 1);
    assert!(runs[0].is_finished());
}

#[tokio::test]
async fn run_cancelled_mid_stage_is_still_saved() {
    let db = Db::new();
    let cancel = CancellationToken::new();
    let scheduler = Scheduler::setup("interrupted")
        .stage_fn("wait", |ctx, cancel| {
            Box::pin(async move {
                ctx.increment(DataKey::Total, None)?;
                cancel.cancel();
                cancel.cancelled().await;
                Err::<(), _>(anyhow::anyhow!("interrupted"))
            })
        })
        .stage_fn("never", |ctx, _| {
            Box::pin(async move {
                ctx.set_data("reached", true)?;
                anyhow::Ok(())
            })
        })
        .build(db.shared())
        .unwrap();

    let summary = scheduler.run(&cancel).await.unwrap();
    assert_eq!((summary.runs, summary.failed_runs), (1, 1));

    let runs = db.runs("interrupted").await;
    let run = &runs[0];
    assert!(run.is_finished());
    assert_eq!(snapshot(run), serde_json::json!({"Total": 1}));
    let logs = db.logs(run).await;
    assert!(logs.iter().any(|l| l.message.as_deref() == Some("interrupted")));
}
