// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run records: the durable identity and timing envelope of one execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest run or host name the run table accepts.
pub const MAX_NAME_LEN: usize = 64;

/// Store-assigned run identifier.
///
/// Doubles as the correlation id attached to operator-facing log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub i64);

impl RunId {
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A run that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRun {
    pub name: String,
    pub host: String,
    pub started_at: DateTime<Utc>,
}

/// One execution of the stage chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: RunId,
    pub host: String,
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Whole seconds between start and finish, truncated.
    pub runtime_secs: Option<i64>,
    /// JSON snapshot of the run's scratch space.
    pub data: Option<String>,
}

impl RunRecord {
    /// Build the persisted form of `new` under the given id.
    pub fn from_new(id: RunId, new: NewRun) -> Self {
        Self {
            id,
            host: new.host,
            name: new.name,
            started_at: new.started_at,
            finished_at: None,
            runtime_secs: None,
            data: None,
        }
    }

    /// Stamp finish time and whole-second duration.
    ///
    /// A finish time before the start (clock moved back) yields zero.
    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.finished_at = Some(at);
        self.runtime_secs = Some((at - self.started_at).num_seconds().max(0));
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

crate::builder! {
    pub struct RunRecordBuilder => RunRecord {
        into {
            host: String = "test-host",
            name: String = "test-run",
        }
        set {
            id: RunId = RunId(1),
            started_at: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH,
        }
        option {
            finished_at: DateTime<Utc> = None,
            runtime_secs: i64 = None,
            data: String = None,
        }
    }
}
