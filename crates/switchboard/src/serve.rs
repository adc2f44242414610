// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `switchboard serve` command implementation.
//!
//! Seeds the profile store from `[[bots]]`, registers the compiled-in
//! provider plugins, connects the engine client, brings up the enabled
//! gateways and serves both listeners until a shutdown signal.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use switchboard_bot::auth::AuthConfig;
use switchboard_bot::http::WebhookState;
use switchboard_bot::profile::normalize_uri;
use switchboard_bot::rpc::{MetricsRender, RpcState};
use switchboard_bot::{
    start_server, Collaborators, ProviderRegistry, Registry, RegistryConfig, ServerConfig,
};
use switchboard_config::model::SwitchboardConfig;
use switchboard_core::traits::MemoryProfileStore;
use switchboard_core::{BotProfile, SwitchboardError};
use switchboard_engine::HttpEngine;

use crate::shutdown;

/// Everything `serve` runs, assembled but not yet listening.
pub struct App {
    pub registry: Arc<Registry>,
    pub webhooks: WebhookState,
    pub rpc: RpcState,
    pub server: ServerConfig,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("registry", &self.registry)
            .field("server", &self.server)
            .finish_non_exhaustive()
    }
}

/// Provider plugins compiled into this binary.
pub fn provider_registry() -> Result<ProviderRegistry, SwitchboardError> {
    #[allow(unused_mut)]
    let mut providers = ProviderRegistry::new();

    #[cfg(feature = "custom")]
    switchboard_custom::register(&mut providers)?;

    #[cfg(feature = "infobip")]
    switchboard_infobip::register(&mut providers)?;

    Ok(providers)
}

/// Profile store holding the configured bots, with webhook paths
/// normalized.
pub fn seed_store(bots: &[BotProfile]) -> MemoryProfileStore {
    MemoryProfileStore::with_profiles(bots.iter().cloned().map(|mut bot| {
        bot.uri = normalize_uri(&bot.uri);
        bot
    }))
}

fn parse_bind(key: &str, value: &str) -> Result<SocketAddr, SwitchboardError> {
    value
        .trim()
        .parse()
        .map_err(|e| SwitchboardError::Config(format!("{key} `{value}`: {e}")))
}

/// Wires the registry and listener state from configuration.
pub fn build(
    config: &SwitchboardConfig,
    metrics: Option<MetricsRender>,
) -> Result<App, SwitchboardError> {
    let server = ServerConfig {
        webhook_bind: parse_bind("server.bind", &config.server.bind)?,
        rpc_bind: parse_bind("rpc.bind", &config.rpc.bind)?,
    };

    let engine = Arc::new(HttpEngine::new(
        config.engine.hosts.clone(),
        Duration::from_secs(config.engine.timeout_secs),
    )?);
    let providers = provider_registry()?;
    info!(providers = ?providers.names(), "provider plugins registered");

    let registry = Registry::new(
        RegistryConfig {
            site_url: config.server.site_url.clone(),
            startup_providers: config.startup.providers.clone(),
        },
        Collaborators {
            store: Arc::new(seed_store(&config.bots)),
            engine: engine.clone(),
            contacts: engine,
            providers: Arc::new(providers),
        },
    );

    if config.rpc.bearer_token.is_none() {
        warn!("rpc.bearer_token is not set; the /v1 API rejects every request");
    }

    Ok(App {
        webhooks: WebhookState {
            registry: registry.clone(),
            web_root: config.server.web_root.as_ref().map(PathBuf::from),
        },
        rpc: RpcState {
            registry: registry.clone(),
            auth: AuthConfig {
                bearer_token: config.rpc.bearer_token.clone(),
            },
            start_time: Instant::now(),
            metrics,
        },
        registry,
        server,
    })
}

#[cfg(feature = "prometheus")]
fn install_metrics(config: &SwitchboardConfig) -> Result<Option<MetricsRender>, SwitchboardError> {
    if !config.prometheus.enabled {
        return Ok(None);
    }
    let adapter = switchboard_prometheus::PrometheusAdapter::new()?;
    let render: MetricsRender = Arc::new(move || adapter.render());
    Ok(Some(render))
}

#[cfg(not(feature = "prometheus"))]
fn install_metrics(_config: &SwitchboardConfig) -> Result<Option<MetricsRender>, SwitchboardError> {
    Ok(None)
}

/// Runs the `switchboard serve` command.
pub async fn run_serve(config: SwitchboardConfig) -> Result<(), SwitchboardError> {
    init_tracing(&config.log.level);
    info!(bots = config.bots.len(), "starting switchboard serve");

    let metrics = install_metrics(&config)?;
    let app = build(&config, metrics)?;

    let started = app.registry.start().await?;
    info!(gateways = started, "startup reconciliation complete");

    let cancel = shutdown::install_signal_handler();
    let served = start_server(&app.server, app.webhooks, app.rpc, cancel.clone()).await;
    // A listener failure also stops the signal task.
    cancel.cancel();

    app.registry.shutdown().await;
    info!("switchboard serve shutdown complete");
    served
}

/// Initializes the tracing subscriber. `RUST_LOG` wins over `log.level`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "switchboard={level},switchboard_bot={level},switchboard_engine={level},\
             switchboard_custom={level},switchboard_infobip={level},warn",
            level = log_level.to_ascii_lowercase()
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
