// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human-readable durations for run logs and configuration.

use std::time::Duration;

/// Render a duration as "N days, N hours, N minutes and N seconds".
///
/// Empty units are omitted and sub-second precision is dropped.
/// A duration under one second renders as "0 seconds".
pub fn format_elapsed(duration: Duration) -> String {
    let total = duration.as_secs();
    let units = [
        (total / 86_400, "day"),
        ((total % 86_400) / 3_600, "hour"),
        ((total % 3_600) / 60, "minute"),
        (total % 60, "second"),
    ];

    let parts: Vec<String> = units
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, unit)| format!("{n} {unit}{}", if *n == 1 { "" } else { "s" }))
        .collect();

    match parts.as_slice() {
        [] => "0 seconds".to_string(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

/// [`format_elapsed`] followed by the exact value, e.g. "2 seconds (2.5s)".
pub fn format_elapsed_verbose(duration: Duration) -> String {
    format!("{} ({duration:?})", format_elapsed(duration))
}

/// Parse a duration string like "30s", "5m", "1h", "500ms", "2d".
///
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let (digits, suffix) = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| (&s[..i], &s[i..]))
        .unwrap_or((s, ""));

    let n: u64 = digits.parse().map_err(|_| format!("invalid number in duration: {s}"))?;

    let secs_per_unit = match suffix.trim() {
        "ms" | "millis" | "millisecond" | "milliseconds" => return Ok(Duration::from_millis(n)),
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600,
        "d" | "day" | "days" => 86_400,
        other => return Err(format!("unknown duration suffix: {other}")),
    };

    n.checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration out of range: {s}"))
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
