// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs the webhook and RPC listeners until cancelled.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use switchboard_core::SwitchboardError;

use crate::http::{webhook_router, WebhookState};
use crate::rpc::{rpc_router, RpcState};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Public webhook listener.
    pub webhook_bind: SocketAddr,
    /// Engine-facing RPC listener.
    pub rpc_bind: SocketAddr,
}

async fn bind(addr: SocketAddr, what: &str) -> Result<TcpListener, SwitchboardError> {
    TcpListener::bind(addr).await.map_err(|e| {
        SwitchboardError::Config(format!("failed to bind {what} listener to {addr}: {e}"))
    })
}

async fn serve(
    listener: TcpListener,
    app: Router,
    what: &'static str,
    cancel: CancellationToken,
) -> Result<(), SwitchboardError> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| SwitchboardError::Internal(format!("{what} server error: {e}")))
}

/// Binds both listeners, then serves them until `cancel` fires.
///
/// A bind failure on either address aborts before anything is served.
pub async fn start_server(
    config: &ServerConfig,
    webhooks: WebhookState,
    rpc: RpcState,
    cancel: CancellationToken,
) -> Result<(), SwitchboardError> {
    let webhook_listener = bind(config.webhook_bind, "webhook").await?;
    let rpc_listener = bind(config.rpc_bind, "rpc").await?;

    tracing::info!(addr = %config.webhook_bind, "webhook listener started");
    tracing::info!(addr = %config.rpc_bind, "rpc listener started");

    tokio::try_join!(
        serve(webhook_listener, webhook_router(webhooks), "webhook", cancel.clone()),
        serve(rpc_listener, rpc_router(rpc), "rpc", cancel),
    )?;
    tracing::info!("listeners stopped");
    Ok(())
}
