// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests of the assembled process: configuration in, real HTTP
//! engine client and custom provider against wiremock servers.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use switchboard::App;
use switchboard_bot::http::webhook_router;
use switchboard_bot::rpc::rpc_router;
use switchboard_custom::{sign, SIGN_HEADER};

const SECRET: &str = "e2e-secret";
const TOKEN: &str = "e2e-token";

async fn engine() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/check_session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "exists": false,
            "client_id": 501
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/start_conversation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "conversation_id": "conv-1",
            "channel_id": "chan-1"
        })))
        .mount(&server)
        .await;
    for call in ["send_message", "close_conversation"] {
        Mock::given(method("POST"))
            .and(path(format!("/v1/chat/{call}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
    }
    server
}

async fn customer() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

fn app(engine: &MockServer, customer: &MockServer) -> App {
    let toml = format!(
        r#"
[server]
bind = "127.0.0.1:0"
site_url = "https://bots.e2e.test"

[rpc]
bind = "127.0.0.1:0"
bearer_token = "{TOKEN}"

[engine]
hosts = ["{engine}"]
timeout_secs = 2

[prometheus]
enabled = false

[[bots]]
id = 7
domain_id = 1
uri = "support"
name = "Support"
flow_id = 42
enabled = true
provider = "custom"

[bots.metadata]
secret = "{SECRET}"
webhook = "{customer}/hook"
"#,
        engine = engine.uri(),
        customer = customer.uri(),
    );
    let config = switchboard_config::load_and_validate_str(&toml).unwrap();
    switchboard::build(&config, None).unwrap()
}

fn signed(body: Value) -> Request<Body> {
    let bytes = body.to_string().into_bytes();
    Request::builder()
        .method(Method::POST)
        .uri("/support")
        .header(SIGN_HEADER, sign(&bytes, SECRET).unwrap())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .unwrap()
}

async fn engine_calls(server: &MockServer, call: &str) -> Vec<Value> {
    let wanted = format!("/v1/chat/{call}");
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == wanted)
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

// ---- Test 1: Wiring ----

#[tokio::test]
async fn test_configured_bot_is_started_and_registered() {
    let engine = engine().await;
    let customer = customer().await;
    let app = app(&engine, &customer);

    assert_eq!(app.registry.start().await.unwrap(), 1);
    let gateway = app.registry.lookup(7).await.unwrap();
    assert_eq!(gateway.callback_url(), "https://bots.e2e.test/support");
    assert_eq!(
        switchboard::provider_registry().unwrap().names().len(),
        2,
        "custom and infobip are compiled in by default"
    );
}

// ---- Test 2: Inbound to engine ----

#[tokio::test]
async fn test_inbound_message_starts_conversation_on_engine() {
    let engine = engine().await;
    let customer = customer().await;
    let app = app(&engine, &customer);

    let response = webhook_router(app.webhooks.clone())
        .oneshot(signed(json!({
            "message": {
                "id": "m1",
                "chatId": "chat-1",
                "sender": {"id": "u1", "type": "web", "name": "Ann"},
                "date": 1_700_000_000,
                "text": "hello"
            }
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let checks = engine_calls(&engine, "check_session").await;
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0]["profile_id"], 7);
    // Sessions are looked up by the sender, channels are keyed by the chat.
    assert_eq!(checks[0]["external_id"], "u1");

    let starts = engine_calls(&engine, "start_conversation").await;
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0]["domain_id"], 1);
    assert_eq!(starts[0]["message"]["text"], "hello");
    assert_eq!(starts[0]["properties"]["flow"], "42");
    assert_eq!(starts[0]["properties"]["cid"], "501");
    assert_eq!(starts[0]["properties"]["externalChatID"], "chat-1");

    let gateway = app.registry.lookup(7).await.unwrap();
    let channel = gateway.channels().by_chat("chat-1").await.unwrap();
    assert_eq!(channel.chat_id(), "chat-1");
    assert_eq!(channel.account().contact, "u1");

    // Second message on the same chat is a plain send.
    webhook_router(app.webhooks.clone())
        .oneshot(signed(json!({
            "message": {
                "chatId": "chat-1",
                "sender": {"id": "u1", "type": "web", "name": "Ann"},
                "text": "again"
            }
        })))
        .await
        .unwrap();
    let sends = engine_calls(&engine, "send_message").await;
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0]["channel_id"], "chan-1");
    assert_eq!(sends[0]["message"]["text"], "again");
}

// ---- Test 3: Engine to customer over RPC ----

#[tokio::test]
async fn test_rpc_send_reaches_customer_webhook() {
    let engine = engine().await;
    let customer = customer().await;
    let app = app(&engine, &customer);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/send")
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "profileId": 7,
                "externalUserId": "chat-9",
                "message": {"type": "text", "text": "from the flow"}
            })
            .to_string(),
        ))
        .unwrap();
    let response = rpc_router(app.rpc.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let received = customer.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let body: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["message"]["chatId"], "chat-9");
    assert_eq!(body["message"]["text"], "from the flow");
}

// ---- Test 4: Customer close ----

#[tokio::test]
async fn test_customer_close_closes_engine_conversation() {
    let engine = engine().await;
    let customer = customer().await;
    let app = app(&engine, &customer);
    let router = webhook_router(app.webhooks.clone());

    router
        .clone()
        .oneshot(signed(json!({
            "message": {
                "chatId": "chat-2",
                "sender": {"id": "u2", "type": "web", "name": "Bo"},
                "text": "hi"
            }
        })))
        .await
        .unwrap();
    let response = router
        .oneshot(signed(json!({"close": {"chatId": "chat-2"}})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let closes = engine_calls(&engine, "close_conversation").await;
    assert_eq!(closes.len(), 1);
    assert_eq!(closes[0]["conversation_id"], "conv-1");
    assert_eq!(closes[0]["closer_channel_id"], "chan-1");
}

// ---- Test 5: Engine outage ----

#[tokio::test]
async fn test_engine_outage_is_reported_to_customer() {
    let engine = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"external_id": "chat-3"})))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"error": "draining"})))
        .mount(&engine)
        .await;
    let customer = customer().await;
    let app = app(&engine, &customer);

    let response = webhook_router(app.webhooks.clone())
        .oneshot(signed(json!({
            "message": {
                "chatId": "chat-3",
                "sender": {"id": "u3", "type": "web", "name": "Cy"},
                "text": "anyone?"
            }
        })))
        .await
        .unwrap();
    assert!(
        response.status().is_server_error(),
        "status {}",
        response.status()
    );
    assert!(engine_calls(&engine, "start_conversation").await.is_empty());
}
