// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run log entries: append-only audit lines tied to a run.

use crate::{RunId, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Optional fields of a log entry.
///
/// `&str` and `String` convert into a message-only bundle, so the common
/// case reads `ctx.info("synced", &cancel)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogDetails {
    pub message: Option<String>,
    pub stack_trace: Option<String>,
    pub source: Option<String>,
    pub reference_ids: Option<Vec<i64>>,
    pub data: Option<Value>,
}

impl LogDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self { message: Some(message.into()), ..Self::default() }
    }

    crate::setters! {
        option {
            stack_trace: String,
            source: String,
            reference_ids: Vec<i64>,
            data: Value,
        }
    }

    /// Encode into a storable entry for `run_id`.
    ///
    /// Reference ids and structured data are stored as JSON text.
    pub fn into_entry(
        self,
        run_id: RunId,
        severity: Severity,
        created_at: DateTime<Utc>,
    ) -> Result<NewLogEntry, serde_json::Error> {
        let reference_ids = self.reference_ids.as_ref().map(serde_json::to_string).transpose()?;
        let data = self.data.as_ref().map(serde_json::to_string).transpose()?;
        Ok(NewLogEntry {
            run_id,
            created_at,
            severity,
            message: self.message,
            stack_trace: self.stack_trace,
            source: self.source,
            reference_ids,
            data,
        })
    }
}

impl From<&str> for LogDetails {
    fn from(message: &str) -> Self {
        Self::message(message)
    }
}

impl From<String> for LogDetails {
    fn from(message: String) -> Self {
        Self::message(message)
    }
}

/// A log entry that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLogEntry {
    pub run_id: RunId,
    pub created_at: DateTime<Utc>,
    pub severity: Severity,
    pub message: Option<String>,
    pub stack_trace: Option<String>,
    pub source: Option<String>,
    /// JSON array of external reference ids.
    pub reference_ids: Option<String>,
    /// JSON-encoded structured payload.
    pub data: Option<String>,
}

/// A persisted log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub run_id: RunId,
    pub created_at: DateTime<Utc>,
    pub severity: Severity,
    pub message: Option<String>,
    pub stack_trace: Option<String>,
    pub source: Option<String>,
    pub reference_ids: Option<String>,
    pub data: Option<String>,
}

impl LogEntry {
    pub fn from_new(id: i64, new: NewLogEntry) -> Self {
        Self {
            id,
            run_id: new.run_id,
            created_at: new.created_at,
            severity: new.severity,
            message: new.message,
            stack_trace: new.stack_trace,
            source: new.source,
            reference_ids: new.reference_ids,
            data: new.data,
        }
    }

    /// Decode the stored reference ids.
    pub fn reference_ids(&self) -> Option<Vec<i64>> {
        self.reference_ids.as_deref().and_then(|raw| serde_json::from_str(raw).ok())
    }

    /// Decode the stored structured payload.
    pub fn data(&self) -> Option<Value> {
        self.data.as_deref().and_then(|raw| serde_json::from_str(raw).ok())
    }
}
