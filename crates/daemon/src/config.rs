// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration file.
//!
//! ```toml
//! name = "nightly-sync"
//! interval = "15m"
//! database = "main"
//!
//! [databases.main]
//! path = "runs.db"
//!
//! [[probes]]
//! url = "https://example.com/health"
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tr_adapters::Method;
use tr_core::{parse_duration, MAX_NAME_LEN};
use tr_engine::DEFAULT_FINALIZE_TIMEOUT;

/// Connection used when `database` is not set and one is defined under this name.
pub const DEFAULT_DATABASE: &str = "default";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid {field}: {message}")]
    Duration { field: &'static str, message: String },
    #[error("database connection '{0}' is not defined")]
    UnknownDatabase(String),
    #[error("no database connections defined; add a [databases.<name>] table")]
    NoDatabase,
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("could not determine state directory (set TR_STATE_DIR or HOME)")]
    NoStateDir,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    name: String,
    host: Option<String>,
    startup_delay: Option<String>,
    interval: Option<String>,
    finalize_timeout: Option<String>,
    database: Option<String>,
    #[serde(default)]
    databases: BTreeMap<String, DatabaseConfig>,
    #[serde(default)]
    probes: Vec<ProbeConfig>,
    #[serde(default)]
    log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

/// One HTTP endpoint checked by a `probe` stage each run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeConfig {
    /// Stage name and scratch prefix. Defaults to `probe-<n>`.
    pub name: Option<String>,
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    /// Directory for daily rolling log files. Stderr only when unset.
    pub path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: default_level(), path: None }
    }
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_level() -> String {
    "info".to_string()
}

/// Validated daemon configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub name: String,
    pub host: Option<String>,
    pub startup_delay: Option<Duration>,
    pub interval: Option<Duration>,
    pub finalize_timeout: Duration,
    /// Name of the selected connection.
    pub database_name: String,
    /// Database file, resolved against the config file's directory.
    pub database_path: PathBuf,
    pub probes: Vec<ProbeConfig>,
    pub log: LogConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&text, base).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse { path: path.to_path_buf(), source },
            other => other,
        })
    }

    /// Parse config text. Relative paths resolve against `base`.
    pub fn parse(text: &str, base: &Path) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text)
            .map_err(|source| ConfigError::Parse { path: PathBuf::new(), source })?;

        let name = raw.name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".to_string()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(ConfigError::Invalid(format!(
                "name '{name}' is longer than {MAX_NAME_LEN} characters"
            )));
        }

        for (index, probe) in raw.probes.iter().enumerate() {
            if probe.url.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("probe {} has an empty url", index + 1)));
            }
            probe_method(probe)?;
        }

        let (database_name, database) = select_database(raw.database.as_deref(), &raw.databases)?;
        let database_path = resolve(base, &database.path);
        let log = LogConfig { path: raw.log.path.as_deref().map(|p| resolve(base, p)), ..raw.log };

        Ok(Self {
            name,
            host: raw.host.filter(|h| !h.trim().is_empty()),
            startup_delay: duration("startup_delay", raw.startup_delay.as_deref())?,
            interval: duration("interval", raw.interval.as_deref())?,
            finalize_timeout: duration("finalize_timeout", raw.finalize_timeout.as_deref())?
                .unwrap_or(DEFAULT_FINALIZE_TIMEOUT),
            database_name,
            database_path,
            probes: raw.probes,
            log,
        })
    }
}

/// Parsed HTTP method of a probe.
pub fn probe_method(probe: &ProbeConfig) -> Result<Method, ConfigError> {
    Method::from_bytes(probe.method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| ConfigError::Invalid(format!("unknown HTTP method '{}'", probe.method)))
}

/// The named connection, else `default`, else the first by name.
fn select_database(
    requested: Option<&str>,
    databases: &BTreeMap<String, DatabaseConfig>,
) -> Result<(String, DatabaseConfig), ConfigError> {
    if let Some(name) = requested {
        return databases
            .get(name)
            .map(|db| (name.to_string(), db.clone()))
            .ok_or_else(|| ConfigError::UnknownDatabase(name.to_string()));
    }
    databases
        .get_key_value(DEFAULT_DATABASE)
        .or_else(|| databases.iter().next())
        .map(|(name, db)| (name.clone(), db.clone()))
        .ok_or(ConfigError::NoDatabase)
}

fn duration(field: &'static str, value: Option<&str>) -> Result<Option<Duration>, ConfigError> {
    value
        .map(|s| parse_duration(s).map_err(|message| ConfigError::Duration { field, message }))
        .transpose()
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
