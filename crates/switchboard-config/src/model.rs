// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Switchboard chat gateway.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key is
//! rejected at startup instead of silently ignored.

use serde::{Deserialize, Serialize};

use switchboard_core::BotProfile;

/// Top-level Switchboard configuration.
///
/// Every section is optional and falls back to its defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchboardConfig {
    /// Public webhook listener.
    #[serde(default)]
    pub server: ServerConfig,

    /// Engine-facing RPC listener.
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Internal conversation engine nodes.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Which profiles are brought up at boot.
    #[serde(default)]
    pub startup: StartupConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub prometheus: PrometheusConfig,

    /// Bot profiles seeded into the profile store.
    #[serde(default)]
    pub bots: Vec<BotProfile>,
}

/// Webhook listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address for incoming provider webhooks.
    #[serde(default = "default_server_bind")]
    pub bind: String,

    /// Externally reachable base URL. Profile paths are appended to it to
    /// form the callback URL registered with each provider.
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Directory of static assets served for `GET` requests.
    #[serde(default)]
    pub web_root: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_server_bind(),
            site_url: default_site_url(),
            web_root: None,
        }
    }
}

fn default_server_bind() -> String {
    "0.0.0.0:10128".to_string()
}

fn default_site_url() -> String {
    "http://localhost:10128".to_string()
}

/// RPC listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_bind")]
    pub bind: String,

    /// Bearer token required on every `/v1` call. Without one the API
    /// rejects all requests.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            bind: default_rpc_bind(),
            bearer_token: None,
        }
    }
}

fn default_rpc_bind() -> String {
    "127.0.0.1:10129".to_string()
}

/// Internal engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Base URLs of the live engine nodes.
    #[serde(default)]
    pub hosts: Vec<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_engine_timeout")]
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            timeout_secs: default_engine_timeout(),
        }
    }
}

fn default_engine_timeout() -> u64 {
    15
}

/// Startup reconciliation filter.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StartupConfig {
    /// Provider types started at boot. Empty starts every enabled profile.
    #[serde(default)]
    pub providers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// trace, debug, info, warn or error. `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    /// Install the recorder and serve `/metrics`.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}
