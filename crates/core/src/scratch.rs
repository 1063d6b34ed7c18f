// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-run key/value scratch space.
//!
//! Values are held as JSON so the whole space can be snapshotted onto the
//! run record when the run is saved. Keys are sorted, which keeps snapshots
//! stable across saves.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from scratch-space access
#[derive(Debug, Error)]
pub enum ScratchError {
    #[error("value at '{key}' is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },
    #[error("counter '{0}' overflowed")]
    Overflow(String),
    #[error("failed to encode value for '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid scratch snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Key/value storage shared by the stages of one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScratchSpace {
    entries: BTreeMap<String, Value>,
}

impl ScratchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Decode the value under `key` as `T`.
    ///
    /// Returns `Ok(None)` when the key is absent and
    /// [`ScratchError::TypeMismatch`] when the stored value is not a `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ScratchError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(value) => T::deserialize(value).map(Some).map_err(|_| {
                ScratchError::TypeMismatch {
                    key: key.to_string(),
                    expected: std::any::type_name::<T>(),
                }
            }),
        }
    }

    /// Decode the value under `key`, falling back to `T::default()` when
    /// the key is absent or holds a different type.
    pub fn get_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        self.get_as(key).ok().flatten().unwrap_or_default()
    }

    /// Store any serializable value, replacing what was there.
    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<(), ScratchError> {
        let key = key.into();
        let value =
            serde_json::to_value(value).map_err(|source| ScratchError::Encode { key: key.clone(), source })?;
        self.set_value(key, value);
        Ok(())
    }

    /// Store a raw JSON value, replacing what was there.
    pub fn set_value(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Current counter value; absent keys read as zero.
    pub fn counter(&self, key: &str) -> Result<i64, ScratchError> {
        match self.entries.get(key) {
            None => Ok(0),
            Some(value) => value.as_i64().ok_or_else(|| ScratchError::TypeMismatch {
                key: key.to_string(),
                expected: "i64",
            }),
        }
    }

    /// Add one to the counter at `key` and return the new value.
    ///
    /// A non-integer value at `key` is left untouched and reported as
    /// [`ScratchError::TypeMismatch`].
    pub fn increment(&mut self, key: &str) -> Result<i64, ScratchError> {
        self.add(key, 1)
    }

    /// Subtract one from the counter at `key` and return the new value.
    pub fn decrement(&mut self, key: &str) -> Result<i64, ScratchError> {
        self.add(key, -1)
    }

    fn add(&mut self, key: &str, delta: i64) -> Result<i64, ScratchError> {
        let next = self
            .counter(key)?
            .checked_add(delta)
            .ok_or_else(|| ScratchError::Overflow(key.to_string()))?;
        self.entries.insert(key.to_string(), Value::from(next));
        Ok(next)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Serialize the whole space as a JSON object.
    pub fn to_snapshot(&self) -> Result<String, ScratchError> {
        Ok(serde_json::to_string(&self.entries)?)
    }

    /// Rebuild a space from a snapshot written by [`ScratchSpace::to_snapshot`].
    pub fn from_snapshot(snapshot: &str) -> Result<Self, ScratchError> {
        Ok(Self { entries: serde_json::from_str(snapshot)? })
    }
}

#[cfg(test)]
#[path = "scratch_tests.rs"]
mod tests;
