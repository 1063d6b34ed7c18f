// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in stages the daemon runs every iteration.

use crate::config::{probe_method, ConfigError, ProbeConfig};
use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tr_adapters::{ApiClient, ApiRequest};
use tr_core::{DataKey, LogDetails};
use tr_engine::{RunContext, Stage};

/// Records that the daemon is alive on this host.
pub struct HeartbeatStage {
    host: String,
}

impl HeartbeatStage {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

#[async_trait]
impl Stage for HeartbeatStage {
    fn name(&self) -> &str {
        "heartbeat"
    }

    async fn run(&self, ctx: &mut RunContext, cancel: &CancellationToken) -> anyhow::Result<()> {
        ctx.increment(DataKey::Total, None)?;
        ctx.set_data("Host", &self.host)?;
        ctx.increment(DataKey::Processed, None)?;
        ctx.debug(format!("Heartbeat from {}.", self.host), cancel).await?;
        Ok(())
    }
}

/// Calls one HTTP endpoint and records its status and latency.
///
/// Scratch keys are scoped by the stage name: `<name>.Total`,
/// `<name>.Processed`, `<name>.Status` and `<name>.DurationMs`. Anything
/// other than 200 or 201 fails the stage.
pub struct ProbeStage {
    name: String,
    request: ApiRequest,
    client: ApiClient,
}

impl ProbeStage {
    pub fn new(name: impl Into<String>, request: ApiRequest, client: ApiClient) -> Self {
        Self { name: name.into(), request, client }
    }

    /// Build the `index`-th (zero-based) configured probe.
    pub fn from_config(
        index: usize,
        probe: &ProbeConfig,
        client: ApiClient,
    ) -> Result<Self, ConfigError> {
        let mut request = ApiRequest::new(probe_method(probe)?, probe.url.trim());
        for (name, value) in &probe.headers {
            request = request.header(name, value);
        }
        if let Some(payload) = &probe.payload {
            request = request.payload(payload.clone());
        }
        let name = probe.name.clone().unwrap_or_else(|| format!("probe-{}", index + 1));
        Ok(Self::new(name, request, client))
    }

    pub fn request(&self) -> &ApiRequest {
        &self.request
    }
}

#[async_trait]
impl Stage for ProbeStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &mut RunContext, cancel: &CancellationToken) -> anyhow::Result<()> {
        let prefix = Some(self.name.as_str());
        let url = &self.request.url;
        ctx.increment(DataKey::Total, prefix)?;

        let mut response = self.client.call(self.request.clone(), cancel).await;
        let duration_ms = response.duration.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        ctx.set_data(format!("{}.Status", self.name), response.status)?;
        ctx.set_data(format!("{}.DurationMs", self.name), duration_ms)?;

        if let Some(error) = response.error.take() {
            return Err(anyhow::Error::new(error).context(format!("probe of {url} failed")));
        }
        let status = response.status.unwrap_or_default();
        if !response.is_ok() {
            anyhow::bail!("probe of {url} returned status {status}");
        }

        ctx.increment(DataKey::Processed, prefix)?;
        let details = LogDetails::message(format!("{} {url} returned {status}.", self.request.method))
            .source(self.name.clone())
            .data(json!({ "url": url, "status": status, "duration_ms": duration_ms }));
        ctx.info(details, cancel).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "stages_tests.rs"]
mod tests;
