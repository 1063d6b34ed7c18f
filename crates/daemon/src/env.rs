// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;

use crate::config::ConfigError;

/// File name looked up in the state directory when no config path is given.
pub const CONFIG_FILE: &str = "taskrun.toml";

/// Resolve state directory: TR_STATE_DIR > XDG_STATE_HOME/taskrun > ~/.local/state/taskrun
pub fn state_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = non_empty_var("TR_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = non_empty_var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("taskrun"));
    }
    let home = dirs::home_dir().ok_or(ConfigError::NoStateDir)?;
    Ok(home.join(".local/state/taskrun"))
}

/// Resolve config file: `--config` > TR_CONFIG > <state dir>/taskrun.toml
pub fn config_path(cli: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = cli {
        return Ok(path);
    }
    if let Some(path) = non_empty_var("TR_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    Ok(state_dir()?.join(CONFIG_FILE))
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
