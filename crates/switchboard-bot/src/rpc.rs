// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! RPC listener used by the internal engine and bot management.
//!
//! `GET /health` and `GET /metrics` are public. Send, broadcast and
//! profile management require the bearer token.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use switchboard_core::{BotProfile, Message, SwitchboardError};

use crate::auth::{auth_middleware, AuthConfig};
use crate::provider::{Broadcast, BroadcastOutcome};
use crate::registry::Registry;

/// Renders the Prometheus exposition text.
pub type MetricsRender = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Clone)]
pub struct RpcState {
    pub registry: Arc<Registry>,
    pub auth: AuthConfig,
    pub start_time: Instant,
    pub metrics: Option<MetricsRender>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub profile_id: i64,
    pub external_user_id: String,
    pub message: Message,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    pub profile_id: i64,
    pub peers: Vec<String>,
    pub message: Message,
    #[serde(default)]
    pub timeout_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub gateways: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Maps a runtime error onto its HTTP status with a JSON body.
pub struct RpcError(pub SwitchboardError);

impl From<SwitchboardError> for RpcError {
    fn from(e: SwitchboardError) -> Self {
        Self(e)
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            warn!(error = %self.0, status = status.as_u16(), "rpc request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// Builds the RPC router.
pub fn rpc_router(state: RpcState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(get_health))
        .route("/metrics", get(get_metrics))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/send", post(post_send))
        .route("/v1/broadcast", post(post_broadcast))
        .route("/v1/bots", put(put_bot))
        .route("/v1/bots/{id}", delete(delete_bot))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
}

async fn get_health(State(state): State<RpcState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
        gateways: state.registry.len().await,
    })
}

async fn get_metrics(State(state): State<RpcState>) -> Response {
    match &state.metrics {
        Some(render) => (
            [("content-type", "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn post_send(
    State(state): State<RpcState>,
    Json(body): Json<SendRequest>,
) -> Result<Json<serde_json::Value>, RpcError> {
    state
        .registry
        .send_message(body.profile_id, &body.external_user_id, body.message)
        .await?;
    Ok(Json(serde_json::json!({})))
}

async fn post_broadcast(
    State(state): State<RpcState>,
    Json(body): Json<BroadcastRequest>,
) -> Result<Json<BroadcastOutcome>, RpcError> {
    if body.peers.is_empty() {
        return Err(SwitchboardError::BadRequest("chat.broadcast.peers.required".into()).into());
    }
    let outcome = state
        .registry
        .broadcast(
            body.profile_id,
            Broadcast {
                peers: body.peers,
                message: body.message,
                timeout: Duration::from_millis(body.timeout_ms),
            },
        )
        .await?;
    Ok(Json(outcome))
}

/// Creates or replaces a profile, then applies it with webhook registration.
async fn put_bot(
    State(state): State<RpcState>,
    Json(mut profile): Json<BotProfile>,
) -> Result<Json<BotProfile>, RpcError> {
    let registry = &state.registry;
    registry.validate(&mut profile)?;

    let stored = if profile.id == 0 {
        registry.store().create(profile).await?
    } else {
        match registry.store().update(profile.clone()).await {
            Err(SwitchboardError::NotFound(_)) => registry.store().create(profile).await?,
            other => other?,
        }
    };
    registry.setup_profile(stored.clone(), true).await?;
    info!(profile_id = stored.id, uri = %stored.uri, "bot profile saved");
    Ok(Json(stored))
}

async fn delete_bot(
    State(state): State<RpcState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, RpcError> {
    let stored = state.registry.store().delete(id).await?;
    let running = state.registry.delete_profile(id).await?;
    if !stored && !running {
        return Err(SwitchboardError::NotFound(format!("profile {id}")).into());
    }
    info!(profile_id = id, "bot profile deleted");
    Ok(StatusCode::NO_CONTENT)
}
