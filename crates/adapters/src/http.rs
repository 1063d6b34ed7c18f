// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP request helper for stages that call external APIs.
//!
//! A call never fails outright: transport errors, cancellation and encode
//! failures are captured on the returned [`ApiResponse`] next to timing.

use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
pub use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MEDIA_TYPE: &str = "application/json";

/// Errors captured on an [`ApiResponse`]
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request cancelled")]
    Cancelled,
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// One outbound request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub payload: Option<Value>,
    pub media_type: String,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            payload: None,
            media_type: DEFAULT_MEDIA_TYPE.to_string(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    tr_core::setters! {
        into { media_type: String }
        option { payload: Value }
    }
}

/// Outcome of one call: timing, status and body, or the captured error.
#[derive(Debug, Default)]
pub struct ApiResponse {
    pub started: Option<DateTime<Utc>>,
    /// When response headers arrived.
    pub ended: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
    pub status: Option<u16>,
    pub body: Option<String>,
    pub error: Option<ApiError>,
}

impl ApiResponse {
    /// True for 200 OK and 201 Created.
    pub fn is_ok(&self) -> bool {
        matches!(self.status, Some(200 | 201))
    }

    /// Decode the body as JSON, `None` when absent or not a `T`.
    pub fn json_to<T: DeserializeOwned>(&self) -> Option<T> {
        self.body.as_deref().and_then(|body| serde_json::from_str(body).ok())
    }
}

/// Shared HTTP client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new() -> Result<Self, ApiError> {
        Ok(Self { http: reqwest::Client::builder().build()? })
    }

    /// Client whose calls fail after `timeout` without a complete response.
    pub fn with_timeout(timeout: Duration) -> Result<Self, ApiError> {
        Ok(Self { http: reqwest::Client::builder().timeout(timeout).build()? })
    }

    pub async fn call(&self, request: ApiRequest, cancel: &CancellationToken) -> ApiResponse {
        let mut response = ApiResponse::default();
        let builder = match self.prepare(request) {
            Ok(builder) => builder,
            Err(e) => {
                response.error = Some(e);
                return response;
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ApiError::Cancelled),
            result = exchange(builder, &mut response) => result,
        };
        if let Err(e) = outcome {
            tracing::debug!(error = %e, "api call failed");
            response.error = Some(e);
        }
        response
    }

    fn prepare(&self, request: ApiRequest) -> Result<reqwest::RequestBuilder, ApiError> {
        let mut builder = self.http.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(payload) = &request.payload {
            builder = builder
                .header(CONTENT_TYPE, format!("{}; charset=utf-8", request.media_type))
                .body(serde_json::to_string(payload)?);
        }
        Ok(builder)
    }
}

async fn exchange(
    builder: reqwest::RequestBuilder,
    response: &mut ApiResponse,
) -> Result<(), ApiError> {
    let clock = Instant::now();
    response.started = Some(Utc::now());
    let reply = builder.send().await?;
    response.status = Some(reply.status().as_u16());
    response.ended = Some(Utc::now());
    response.duration = Some(clock.elapsed());
    response.body = Some(reply.text().await?);
    Ok(())
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
