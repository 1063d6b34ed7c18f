// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::prelude::*;
use serde_json::json;

#[tokio::test]
async fn counting_stages_persist_snapshot_and_timing() {
    let db = Db::new();
    let scheduler = Scheduler::setup("counting")
        .stage_fn("incrementTotal", |ctx, _| {
            Box::pin(async move {
                ctx.increment(DataKey::Total, None)?;
                anyhow::Ok(())
            })
        })
        .stage_fn("incrementProcessed", |ctx, _| {
            Box::pin(async move {
                ctx.increment(DataKey::Processed, None)?;
                anyhow::Ok(())
            })
        })
        .run_limit(1)
        .build(db.shared())
        .unwrap();

    let summary = scheduler.run(&CancellationToken::new()).await.unwrap();
    assert_eq!((summary.runs, summary.failed_runs), (1, 0));

    let runs = db.runs("counting").await;
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert!(run.finished_at.unwrap() >= run.started_at);
    assert!(run.runtime_secs.unwrap() >= 0);
    assert_eq!(snapshot(run), json!({"Total": 1, "Processed": 1}));

    let logs = db.logs(run).await;
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.severity == Severity::Information));
}

#[tokio::test]
async fn failing_stage_logs_one_error_and_still_finalizes() {
    let db = Db::new();
    let scheduler = Scheduler::setup("failing")
        .stage_fn("explode", |_, _| Box::pin(async { Err::<(), _>(anyhow::anyhow!("boom")) }))
        .run_limit(1)
        .build(db.shared())
        .unwrap();

    let summary = scheduler.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(summary.failed_runs, 1);

    let runs = db.runs("failing").await;
    let run = &runs[0];
    assert!(run.is_finished());
    let errors: Vec<_> =
        db.logs(run).await.into_iter().filter(|l| l.severity == Severity::Error).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message.as_deref(), Some("boom"));
    assert_eq!(errors[0].run_id, run.id);
    assert_eq!(errors[0].source.as_deref(), Some("explode"));
}

#[tokio::test]
async fn empty_stage_list_creates_no_run() {
    let db = Db::new();
    let result = Scheduler::setup("empty").run_limit(1).build(db.shared());
    assert!(matches!(result, Err(SchedulerError::Config(_))));
    assert!(db.runs("empty").await.is_empty());
}

#[tokio::test]
async fn only_stages_before_the_failure_run() {
    for failing in 0..3_usize {
        let db = Db::new();
        let mut setup = Scheduler::setup("partial").run_limit(1);
        for index in 0..3_usize {
            setup = setup.stage_fn(format!("stage-{index}"), move |ctx, _| {
                Box::pin(async move {
                    if index == failing {
                        anyhow::bail!("stage {index} failed");
                    }
                    ctx.set_data(format!("ran-{index}"), true)?;
                    anyhow::Ok(())
                })
            });
        }
        setup.build(db.shared()).unwrap().run(&CancellationToken::new()).await.unwrap();

        let runs = db.runs("partial").await;
        let run = &runs[0];
        for index in 0..3 {
            let ran = run.data.as_deref().is_some_and(|d| d.contains(&format!("ran-{index}")));
            assert_eq!(ran, index < failing, "failing={failing} index={index}");
        }
    }
}

#[tokio::test]
async fn each_run_starts_with_empty_scratch() {
    let db = Db::new();
    Scheduler::setup("fresh")
        .stage_fn("count", |ctx, _| {
            Box::pin(async move {
                ctx.increment(DataKey::Total, None)?;
                anyhow::Ok(())
            })
        })
        .run_limit(3)
        .build(db.shared())
        .unwrap()
        .run(&CancellationToken::new())
        .await
        .unwrap();

    let runs = db.runs("fresh").await;
    assert_eq!(runs.len(), 3);
    assert!(runs.iter().all(|r| snapshot(r) == json!({"Total": 1})));
    assert!(runs.windows(2).all(|w| w[0].id.as_i64() < w[1].id.as_i64()));
}
