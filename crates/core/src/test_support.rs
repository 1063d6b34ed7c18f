// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{NewRun, RunId, RunRecord};
use chrono::{DateTime, Duration, Utc};

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for core model types.
pub mod strategies {
    use crate::{DataKey, Severity};
    use proptest::prelude::*;

    pub fn arb_severity() -> impl Strategy<Value = Severity> {
        proptest::sample::select(Severity::ALL.to_vec())
    }

    pub fn arb_data_key() -> impl Strategy<Value = DataKey> {
        proptest::sample::select(DataKey::ALL.to_vec())
    }

    /// A counter key, optionally scoped with a prefix.
    pub fn arb_counter_key() -> impl Strategy<Value = String> {
        (arb_data_key(), proptest::option::of("[A-Za-z][A-Za-z0-9]{0,7}"))
            .prop_map(|(key, prefix)| key.scoped(prefix.as_deref()))
    }
}

// ── Factory functions ───────────────────────────────────────────────────

/// Fixed instant used as "now" by fake clocks in tests.
pub fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::days(20_000)
}

pub fn new_run(name: &str) -> NewRun {
    NewRun { name: name.to_string(), host: "test-host".to_string(), started_at: epoch() }
}

pub fn run_record(id: i64, name: &str) -> RunRecord {
    RunRecord::from_new(RunId(id), new_run(name))
}
