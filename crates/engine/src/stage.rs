// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage contract: one caller-supplied step of a run.

use crate::RunContext;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// Boxed future returned by closure stages.
pub type StageFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// One step of the run pipeline.
///
/// Stages may observe `cancel` but are not required to. An error ends the
/// current run's remaining stages; the run is still finalized.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, ctx: &mut RunContext, cancel: &CancellationToken) -> anyhow::Result<()>;
}

/// Stage backed by a closure.
pub struct FnStage<F> {
    name: String,
    f: F,
}

/// Wrap a closure as a named stage.
///
/// ```ignore
/// stage_fn("count", |ctx, _cancel| Box::pin(async move {
///     ctx.increment(DataKey::Total, None)?;
///     Ok(())
/// }))
/// ```
pub fn stage_fn<F>(name: impl Into<String>, f: F) -> FnStage<F>
where
    F: for<'a> Fn(&'a mut RunContext, &'a CancellationToken) -> StageFuture<'a> + Send + Sync,
{
    FnStage { name: name.into(), f }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: for<'a> Fn(&'a mut RunContext, &'a CancellationToken) -> StageFuture<'a> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &mut RunContext, cancel: &CancellationToken) -> anyhow::Result<()> {
        (self.f)(ctx, cancel).await
    }
}
