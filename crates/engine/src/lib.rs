// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tr-engine: Run context, stages and the recurring scheduler loop

mod context;
mod error;
mod scheduler;
mod stage;

pub use context::RunContext;
pub use error::{ContextError, EtaError, SchedulerError};
pub use scheduler::{RunSummary, Scheduler, SchedulerBuilder, DEFAULT_FINALIZE_TIMEOUT};
pub use stage::{stage_fn, FnStage, Stage, StageFuture};
