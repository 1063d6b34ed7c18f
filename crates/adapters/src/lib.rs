// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tr-adapters: Adapters for operator logging and external HTTP calls

pub mod http;
pub mod sink;

pub use http::{ApiClient, ApiError, ApiRequest, ApiResponse, Method};
pub use sink::{RunSink, TracingSink};

#[cfg(any(test, feature = "test-support"))]
pub use sink::{FakeSink, SinkCall};
