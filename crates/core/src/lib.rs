// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tr-core: Data model for the taskrun recurring task runner

pub mod macros;

pub mod clock;
pub mod data_key;
pub mod host;
pub mod log_entry;
pub mod run;
pub mod scratch;
pub mod severity;
pub mod time_fmt;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use data_key::DataKey;
pub use host::{machine_name, truncate_chars};
pub use log_entry::{LogDetails, LogEntry, NewLogEntry};
#[cfg(any(test, feature = "test-support"))]
pub use run::RunRecordBuilder;
pub use run::{NewRun, RunId, RunRecord, MAX_NAME_LEN};
pub use scratch::{ScratchError, ScratchSpace};
pub use severity::{Severity, SeverityError, MAX_CODE_LEN};
pub use time_fmt::{format_elapsed, format_elapsed_verbose, parse_duration};
