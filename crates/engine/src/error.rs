// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;
use thiserror::Error;
use tr_core::{RunId, ScratchError, SeverityError};
use tr_storage::StoreError;

/// Errors from run context operations
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("scratch error: {0}")]
    Scratch(#[from] ScratchError),
    #[error("failed to encode log entry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Precondition violations of the time-remaining estimate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EtaError {
    #[error("cannot estimate time remaining before any item is processed")]
    NothingProcessed,
    #[error("processed {processed} items but only {total} exist")]
    ProcessedExceedsTotal { processed: u64, total: u64 },
    #[error("estimated time remaining is out of range")]
    OutOfRange,
}

/// Errors that stop the scheduler
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid scheduler configuration: {0}")]
    Config(String),
    #[error("invalid severity table: {0}")]
    Severity(#[from] SeverityError),
    #[error("failed to create run: {0}")]
    Store(#[source] StoreError),
    #[error("creating a run did not complete within {timeout:?}")]
    CreateTimeout { timeout: Duration },
    #[error("failed to finalize run {run_id}: {source}")]
    Finalize {
        run_id: RunId,
        #[source]
        source: ContextError,
    },
    #[error("finalizing run {run_id} did not complete within {timeout:?}")]
    FinalizeTimeout { run_id: RunId, timeout: Duration },
}
