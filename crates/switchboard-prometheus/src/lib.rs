// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics for the Switchboard chat gateway.
//!
//! Recording goes through the metrics-rs facade, so the helpers are no-ops
//! until [`PrometheusAdapter::new`] installs the recorder. The rendered text
//! is served by the RPC listener at `/metrics`.

pub mod recording;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use switchboard_core::SwitchboardError;

pub use recording::{
    record_channel_closed, record_channel_started, record_engine_call, record_webhook,
    register_metrics, set_active_gateways,
};

/// Installed Prometheus recorder.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Installs the Prometheus recorder globally.
    ///
    /// Only one recorder can be installed per process; a second call fails.
    pub fn new() -> Result<Self, SwitchboardError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            SwitchboardError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl std::fmt::Debug for PrometheusAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusAdapter").finish_non_exhaustive()
    }
}
