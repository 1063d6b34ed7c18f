// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log severities and their persisted short codes.
//!
//! Each severity maps to a fixed lowercase token stored in the run log
//! table. The column holds at most [`MAX_CODE_LEN`] characters, so every
//! token in [`CODES`] is checked by [`Severity::validate_table`] once at
//! startup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Longest severity code the run log table accepts.
pub const MAX_CODE_LEN: usize = 5;

/// Severity of a run log entry, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Severity {
    Trace,
    Debug,
    Information,
    Warning,
    Error,
    Critical,
}

/// Variant → persisted code.
const CODES: &[(Severity, &str)] = &[
    (Severity::Trace, "trace"),
    (Severity::Debug, "debug"),
    (Severity::Information, "info"),
    (Severity::Warning, "warn"),
    (Severity::Error, "error"),
    (Severity::Critical, "crit"),
];

/// Errors from severity code handling
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeverityError {
    #[error("severity code for {severity:?} cannot be blank")]
    Blank { severity: Severity },
    #[error("severity code '{code}' for {severity:?} is longer than {max} characters", max = MAX_CODE_LEN)]
    TooLong { severity: Severity, code: String },
    #[error("severity code '{code}' is used more than once")]
    Duplicate { code: String },
    #[error("severity {0:?} has no code")]
    Missing(Severity),
    #[error("unknown severity code '{0}'")]
    Unknown(String),
}

impl Severity {
    pub const ALL: [Severity; 6] = [
        Severity::Trace,
        Severity::Debug,
        Severity::Information,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
    ];

    /// The persisted short code for this severity.
    pub fn code(self) -> &'static str {
        CODES.iter().find(|(s, _)| *s == self).map(|(_, code)| *code).unwrap_or("unkn")
    }

    /// Parse a persisted short code.
    pub fn from_code(code: &str) -> Option<Self> {
        CODES.iter().find(|(_, c)| *c == code).map(|(s, _)| *s)
    }

    /// Check a single code against the column constraint.
    pub fn validate_code(severity: Severity, code: &str) -> Result<(), SeverityError> {
        if code.trim().is_empty() {
            return Err(SeverityError::Blank { severity });
        }
        if code.chars().count() > MAX_CODE_LEN {
            return Err(SeverityError::TooLong { severity, code: code.to_string() });
        }
        Ok(())
    }

    /// Validate the whole mapping table: every variant has exactly one
    /// non-blank, unique code of at most [`MAX_CODE_LEN`] characters.
    pub fn validate_table() -> Result<(), SeverityError> {
        validate_codes(CODES)
    }
}

pub(crate) fn validate_codes(codes: &[(Severity, &str)]) -> Result<(), SeverityError> {
    for severity in Severity::ALL {
        if !codes.iter().any(|(s, _)| *s == severity) {
            return Err(SeverityError::Missing(severity));
        }
    }
    for (i, (severity, code)) in codes.iter().enumerate() {
        Severity::validate_code(*severity, code)?;
        if codes[..i].iter().any(|(_, other)| other == code) {
            return Err(SeverityError::Duplicate { code: code.to_string() });
        }
    }
    Ok(())
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Severity {
    type Err = SeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::from_code(s).ok_or_else(|| SeverityError::Unknown(s.to_string()))
    }
}

impl From<Severity> for String {
    fn from(severity: Severity) -> Self {
        severity.code().to_string()
    }
}

impl TryFrom<String> for Severity {
    type Error = SeverityError;

    fn try_from(value: String) -> Result<Self, SeverityError> {
        value.parse()
    }
}

#[cfg(test)]
#[path = "severity_tests.rs"]
mod tests;
