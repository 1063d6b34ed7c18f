// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tr-daemon: The `trd` recurring task runner daemon

pub mod config;
pub mod env;
pub mod logging;
pub mod stages;

pub use config::{Config, ConfigError};
pub use stages::{HeartbeatStage, ProbeStage};

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tr_adapters::{ApiClient, ApiError, TracingSink};
use tr_core::{machine_name, truncate_chars, MAX_NAME_LEN};
use tr_engine::{Scheduler, SchedulerError};
use tr_storage::{RunStore, SqliteStore, StoreError};

/// Per-call limit for probe requests.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to open database: {0}")]
    Store(#[from] StoreError),
    #[error("failed to create HTTP client: {0}")]
    Http(#[from] ApiError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Open the configured SQLite database, creating it if needed.
pub fn open_store(config: &Config) -> Result<SqliteStore, DaemonError> {
    tracing::info!(
        database = %config.database_name,
        path = %config.database_path.display(),
        "opening run store"
    );
    Ok(SqliteStore::open(&config.database_path)?)
}

/// Assemble the scheduler: a heartbeat stage followed by one stage per probe.
///
/// `once` runs a single iteration immediately, ignoring the startup delay
/// and interval.
pub fn build_scheduler(
    config: &Config,
    store: Arc<dyn RunStore>,
    once: bool,
) -> Result<Scheduler, DaemonError> {
    let host = config.host.clone().unwrap_or_else(machine_name);
    let host = truncate_chars(host.trim(), MAX_NAME_LEN).to_string();

    let mut builder = Scheduler::setup(config.name.clone())
        .host(host.clone())
        .finalize_timeout(config.finalize_timeout)
        .sink(TracingSink::new())
        .stage(HeartbeatStage::new(host));

    if once {
        builder = builder.run_limit(1);
    } else {
        if let Some(delay) = config.startup_delay {
            builder = builder.startup_delay(delay);
        }
        if let Some(interval) = config.interval {
            builder = builder.interval(interval);
        }
    }

    if !config.probes.is_empty() {
        let client = ApiClient::with_timeout(PROBE_TIMEOUT)?;
        for (index, probe) in config.probes.iter().enumerate() {
            builder = builder.stage(ProbeStage::from_config(index, probe, client.clone())?);
        }
    }

    Ok(builder.build(store)?)
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
