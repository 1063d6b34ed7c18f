// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator-facing log sink for scheduler progress messages.

use tr_core::{RunId, Severity};

/// Destination for progress messages, keyed by the run id as correlation id.
pub trait RunSink: Send + Sync {
    fn emit(&self, severity: Severity, run_id: Option<RunId>, message: &str);
}

/// Sink that forwards to `tracing` with a `run_id` field.
///
/// `Critical` has no tracing level of its own and is emitted as an error
/// with `critical = true`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

impl RunSink for TracingSink {
    fn emit(&self, severity: Severity, run_id: Option<RunId>, message: &str) {
        let run_id = run_id.map(RunId::as_i64);
        match severity {
            Severity::Trace => tracing::trace!(run_id, "{message}"),
            Severity::Debug => tracing::debug!(run_id, "{message}"),
            Severity::Information => tracing::info!(run_id, "{message}"),
            Severity::Warning => tracing::warn!(run_id, "{message}"),
            Severity::Error => tracing::error!(run_id, "{message}"),
            Severity::Critical => tracing::error!(run_id, critical = true, "{message}"),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::RunSink;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tr_core::{RunId, Severity};

    /// Recorded sink message
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SinkCall {
        pub severity: Severity,
        pub run_id: Option<RunId>,
        pub message: String,
    }

    /// Fake sink for testing
    #[derive(Clone, Default)]
    pub struct FakeSink {
        calls: Arc<Mutex<Vec<SinkCall>>>,
    }

    impl FakeSink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Get all recorded messages
        pub fn calls(&self) -> Vec<SinkCall> {
            self.calls.lock().clone()
        }

        pub fn messages(&self) -> Vec<String> {
            self.calls.lock().iter().map(|call| call.message.clone()).collect()
        }

        /// Whether any recorded message contains `needle`
        pub fn contains(&self, needle: &str) -> bool {
            self.calls.lock().iter().any(|call| call.message.contains(needle))
        }
    }

    impl RunSink for FakeSink {
        fn emit(&self, severity: Severity, run_id: Option<RunId>, message: &str) {
            self.calls.lock().push(SinkCall { severity, run_id, message: message.to_string() });
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeSink, SinkCall};
