// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Public webhook listener.
//!
//! Every request path is a bot webhook path, so routing is a single
//! fallback handler: `OPTIONS` answers CORS, `GET` tries a static asset
//! first, and everything that reaches the bottom is resolved to a gateway
//! by path and handed to its provider.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tower::ServiceExt as _;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::provider::WebhookRequest;
use crate::registry::Registry;

/// Inbound webhook bodies above this size are rejected.
pub const MAX_WEBHOOK_BODY: usize = 4 * 1024 * 1024;

#[derive(Clone)]
pub struct WebhookState {
    pub registry: Arc<Registry>,
    /// Static asset directory served for `GET`.
    pub web_root: Option<PathBuf>,
}

/// Builds the public webhook router.
pub fn webhook_router(state: WebhookState) -> Router {
    Router::new()
        .route("/favicon.ico", any(|| async { StatusCode::NOT_FOUND }))
        .fallback(dispatch)
        .with_state(state)
        .layer(cors_layer())
        .layer(middleware::from_fn(wildcard_origin))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods(AllowMethods::list([Method::OPTIONS, Method::GET, Method::POST]))
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::COOKIE,
            HeaderName::from_static("x-xsrf-token"),
            HeaderName::from_static("x-requested-with"),
        ]))
}

/// The CORS layer mirrors `Origin`; a request without one gets `*`.
async fn wildcard_origin(request: Request, next: Next) -> Response {
    let has_origin = request.headers().contains_key(header::ORIGIN);
    let mut response = next.run(request).await;
    if !has_origin {
        response
            .headers_mut()
            .entry(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .or_insert(HeaderValue::from_static("*"));
    }
    response
}

async fn dispatch(State(state): State<WebhookState>, request: Request) -> Response {
    match *request.method() {
        Method::OPTIONS => return StatusCode::OK.into_response(),
        Method::GET | Method::HEAD => {
            if let Some(root) = &state.web_root
                && let Some(file) = static_file(root, request.uri().path()).await
            {
                return match ServeFile::new(file).oneshot(request).await {
                    Ok(response) => response.into_response(),
                    Err(e) => {
                        warn!(error = %e, "static asset failed");
                        StatusCode::INTERNAL_SERVER_ERROR.into_response()
                    }
                };
            }
        }
        Method::POST => {}
        _ => return (StatusCode::METHOD_NOT_ALLOWED, "(405) Method Not Allowed").into_response(),
    }

    let uri = request.uri().path().to_string();
    debug!(uri, method = %request.method(), "webhook received");

    let gateway = match state.registry.gateway(0, &uri).await {
        Ok(gateway) => gateway,
        Err(e) => {
            let status = if e.status_code() == 404 {
                StatusCode::NOT_FOUND
            } else {
                StatusCode::BAD_GATEWAY
            };
            debug!(uri, error = %e, "webhook path unresolved");
            return (status, e.to_string()).into_response();
        }
    };

    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, MAX_WEBHOOK_BODY).await {
        Ok(body) => body,
        Err(e) => {
            warn!(uri, error = %e, "webhook body unreadable");
            return (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response();
        }
    };

    let provider = gateway.provider_name().to_string();
    let response = gateway
        .webhook(WebhookRequest {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
        })
        .await
        .unwrap_or_else(|| Response::new(Body::empty()));
    switchboard_prometheus::record_webhook(&provider, response.status().as_u16());
    response
}

/// Resolves a request path to an existing file under `root`.
async fn static_file(root: &Path, uri_path: &str) -> Option<PathBuf> {
    let relative = Path::new(uri_path.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    let path = root.join(relative);
    let meta = tokio::fs::metadata(&path).await.ok()?;
    meta.is_file().then_some(path)
}
