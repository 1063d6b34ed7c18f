// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator log setup: stderr plus an optional daily rolling file.

use crate::config::LogConfig;
use std::path::PathBuf;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// File name prefix for rolling log files; the date is appended.
pub const LOG_FILE_PREFIX: &str = "trd.log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level '{level}': {source}")]
    Filter {
        level: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("failed to create log directory {path}: {source}")]
    Dir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("logging already initialized: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// `RUST_LOG` when set, otherwise the configured level.
pub fn filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level)
        .map_err(|source| LoggingError::Filter { level: level.to_string(), source })
}

/// Install the global subscriber.
///
/// Hold the returned guard until exit so buffered file output is flushed.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = filter(&config.level)?;
    let stderr = fmt::layer().with_writer(std::io::stderr).compact();

    let (file, guard) = match &config.path {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .map_err(|source| LoggingError::Dir { path: dir.clone(), source })?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(filter).with(stderr).with(file).try_init()?;
    Ok(guard)
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
