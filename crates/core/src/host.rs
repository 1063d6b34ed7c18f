// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host identification for run records.

use std::path::Path;

/// Returns `s` truncated to at most `n` characters, never splitting a char.
pub fn truncate_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Best-effort machine name: `HOSTNAME`, `COMPUTERNAME`, `/etc/hostname`,
/// then `localhost`.
pub fn machine_name() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
        .or_else(|| read_hostname_file(Path::new("/etc/hostname")))
        .unwrap_or_else(|| "localhost".to_string())
}

fn read_hostname_file(path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let name = contents.lines().next()?.trim();
    (!name.is_empty()).then(|| name.to_string())
}
