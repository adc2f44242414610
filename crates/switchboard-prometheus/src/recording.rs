// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.

use metrics::{describe_counter, describe_gauge};

/// Register all Switchboard metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "switchboard_webhooks_total",
        "Inbound provider webhooks by provider and response status"
    );
    describe_counter!(
        "switchboard_engine_calls_total",
        "Internal engine RPCs by method and outcome"
    );
    describe_gauge!("switchboard_active_gateways", "Running bot gateways");
    describe_counter!(
        "switchboard_channels_started_total",
        "Conversations started with the internal engine"
    );
    describe_counter!(
        "switchboard_channels_closed_total",
        "Channels removed from gateway indices"
    );
}

/// Record one handled webhook.
pub fn record_webhook(provider: &str, status: u16) {
    metrics::counter!(
        "switchboard_webhooks_total",
        "provider" => provider.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record one engine RPC. `outcome` is `ok` or `error`.
pub fn record_engine_call(method: &'static str, outcome: &'static str) {
    metrics::counter!(
        "switchboard_engine_calls_total",
        "method" => method,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn set_active_gateways(count: usize) {
    metrics::gauge!("switchboard_active_gateways").set(count as f64);
}

pub fn record_channel_started(provider: &str) {
    metrics::counter!("switchboard_channels_started_total", "provider" => provider.to_string())
        .increment(1);
}

pub fn record_channel_closed(provider: &str) {
    metrics::counter!("switchboard_channels_closed_total", "provider" => provider.to_string())
        .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn helpers_render_with_labels() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            register_metrics();
            record_webhook("custom", 200);
            record_webhook("custom", 200);
            record_engine_call("start_conversation", "error");
            set_active_gateways(3);
            record_channel_started("infobip_whatsapp");
        });

        let text = handle.render();
        assert!(text.contains(r#"switchboard_webhooks_total{provider="custom",status="200"} 2"#));
        assert!(text.contains(
            r#"switchboard_engine_calls_total{method="start_conversation",outcome="error"} 1"#
        ));
        assert!(text.contains("switchboard_active_gateways 3"));
        assert!(text.contains(r#"switchboard_channels_started_total{provider="infobip_whatsapp"} 1"#));
    }

    #[test]
    fn recording_without_recorder_is_a_no_op() {
        record_channel_closed("custom");
        set_active_gateways(0);
    }
}
