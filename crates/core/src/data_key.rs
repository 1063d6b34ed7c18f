// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical scratch-space keys for run counters.

use serde::{Deserialize, Serialize};

/// Well-known counter keys.
///
/// A key can be namespaced with a caller prefix: `Batch1` + `Processed`
/// becomes `Batch1.Processed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKey {
    Total,
    Processed,
    Created,
    Updated,
    Deleted,
}

/// Separator between a key prefix and the key name.
pub const PREFIX_SEPARATOR: char = '.';

impl DataKey {
    pub const ALL: [DataKey; 5] =
        [DataKey::Total, DataKey::Processed, DataKey::Created, DataKey::Updated, DataKey::Deleted];

    pub fn as_str(self) -> &'static str {
        match self {
            DataKey::Total => "Total",
            DataKey::Processed => "Processed",
            DataKey::Created => "Created",
            DataKey::Updated => "Updated",
            DataKey::Deleted => "Deleted",
        }
    }

    /// Compose the scratch-space key, joining `prefix` with a single `.`.
    pub fn scoped(self, prefix: Option<&str>) -> String {
        match prefix {
            Some(prefix) => format!("{prefix}{PREFIX_SEPARATOR}{}", self.as_str()),
            None => self.as_str().to_string(),
        }
    }
}

crate::simple_display! {
    DataKey {
        Total => "Total",
        Processed => "Processed",
        Created => "Created",
        Updated => "Updated",
        Deleted => "Deleted",
    }
}
