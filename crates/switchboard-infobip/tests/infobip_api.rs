// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Infobip provider against a wiremock OMNI API.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use switchboard_bot::Broadcast;
use switchboard_core::{BotProfile, File, Message, MessageKind};
use switchboard_test_utils::TestHarness;

async fn infobip() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/omni/1/advanced"))
        .and(header("authorization", "App key-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"messages": []})))
        .mount(&server)
        .await;
    server
}

fn profile(server: &MockServer) -> BotProfile {
    let mut profile = TestHarness::profile(1, "/wa");
    profile.provider = "infobip_whatsapp".into();
    for (key, value) in [
        ("api_key", "key-1".to_string()),
        ("number", "447860099299".to_string()),
        ("url", server.uri()),
        ("scenario_key", "scenario-1".to_string()),
    ] {
        profile.metadata.insert(key.into(), value);
    }
    profile
}

fn harness(server: &MockServer) -> TestHarness {
    TestHarness::builder()
        .with_profile(profile(server))
        .with_providers(switchboard_infobip::register)
        .build()
        .unwrap()
}

async fn callback(harness: &TestHarness, body: Value) -> StatusCode {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/wa")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    harness
        .webhook_router()
        .oneshot(request)
        .await
        .unwrap()
        .status()
}

async fn sent(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

fn result(from: &str, kind: &str, text: &str) -> Value {
    json!({
        "from": from,
        "to": "447860099299",
        "integrationType": "WHATSAPP",
        "receivedAt": "2026-01-05T10:00:00.000+0000",
        "messageId": format!("m-{from}-{kind}"),
        "message": {"type": kind, "text": text, "url": "https://media.test/1", "caption": "photo"},
        "contact": {"name": "Olha"}
    })
}

// ---- Outbound ----

#[tokio::test]
async fn test_text_is_sent_to_phone_number() {
    let server = infobip().await;
    let harness = harness(&server);

    harness
        .registry
        .send_message(1, "380501112233", Message::text("hello"))
        .await
        .unwrap();

    assert_eq!(
        sent(&server).await,
        vec![json!({
            "scenarioKey": "scenario-1",
            "destinations": [{"to": {"phoneNumber": "380501112233"}}],
            "whatsApp": {"text": "hello"}
        })]
    );
}

#[tokio::test]
async fn test_image_goes_out_as_image_url() {
    let server = infobip().await;
    let harness = harness(&server);

    let message = Message {
        kind: MessageKind::File,
        file: Some(File {
            url: "https://files.test/cat.jpg".into(),
            mime: "image/jpeg".into(),
            ..Default::default()
        }),
        ..Default::default()
    };
    harness
        .registry
        .send_message(1, "380501112233", message)
        .await
        .unwrap();

    let bodies = sent(&server).await;
    assert_eq!(
        bodies[0]["whatsApp"],
        json!({"imageUrl": "https://files.test/cat.jpg"})
    );
}

#[tokio::test]
async fn test_api_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;
    let harness = harness(&server);

    let err = harness
        .registry
        .send_message(1, "380501112233", Message::text("hello"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("401"), "{err}");
}

// ---- Scenario ----

fn harness_without_scenario(server: &MockServer) -> TestHarness {
    let mut profile = profile(server);
    profile.metadata.remove("scenario_key");
    TestHarness::builder()
        .with_profile(profile)
        .with_providers(switchboard_infobip::register)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_missing_scenario_is_created_once_from_number() {
    let server = infobip().await;
    Mock::given(method("POST"))
        .and(path("/omni/1/scenarios"))
        .and(header("authorization", "App key-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"key": "created-1"})))
        .expect(1)
        .mount(&server)
        .await;
    let harness = harness_without_scenario(&server);

    for text in ["first", "second"] {
        harness
            .registry
            .send_message(1, "380501112233", Message::text(text))
            .await
            .unwrap();
    }

    let requests = server.received_requests().await.unwrap();
    let create: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(requests[0].url.path(), "/omni/1/scenarios");
    assert_eq!(
        create,
        json!({
            "name": "447860099299",
            "flow": [{"from": "447860099299", "channel": "WHATSAPP"}],
            "default": true
        })
    );
    let sends: Vec<Value> = requests[1..]
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect();
    assert_eq!(sends.len(), 2);
    assert!(sends.iter().all(|body| body["scenarioKey"] == "created-1"));
}

#[tokio::test]
async fn test_scenario_creation_failure_fails_the_send() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/omni/1/scenarios"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;
    let harness = harness_without_scenario(&server);

    let err = harness
        .registry
        .send_message(1, "380501112233", Message::text("hello"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("scenario"), "{err}");
    assert!(
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .all(|r| r.url.path() != "/omni/1/advanced")
    );
}

// ---- Inbound ----

#[tokio::test]
async fn test_inbound_text_and_media_are_relayed() {
    let server = infobip().await;
    let harness = harness(&server);

    let status = callback(
        &harness,
        json!({
            "results": [
                result("380501112233", "TEXT", "hi there"),
                result("380501112233", "IMAGE", ""),
            ],
            "messageCount": 2,
            "pendingMessageCount": 0
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let starts = harness.engine.starts();
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].message.text, "hi there");
    assert_eq!(starts[0].username, "Olha");

    let sends = harness.engine.sends();
    assert_eq!(sends.len(), 1);
    let file = sends[0].message.file.as_ref().unwrap();
    assert_eq!(file.url, "https://media.test/1");
    assert_eq!(file.name, "photo");
}

#[tokio::test]
async fn test_contact_and_location_are_skipped() {
    let server = infobip().await;
    let harness = harness(&server);

    let status = callback(
        &harness,
        json!({"results": [
            result("380501112233", "CONTACT", ""),
            result("380501112233", "LOCATION", ""),
        ]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(harness.engine.calls().is_empty());
}

#[tokio::test]
async fn test_undecodable_callback_is_bad_request() {
    let server = infobip().await;
    let harness = harness(&server);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/wa")
        .body(Body::from("results=1"))
        .unwrap();
    let response = harness.webhook_router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_engine_failure_does_not_fail_callback() {
    let server = infobip().await;
    let harness = harness(&server);
    harness.engine.fail("start", Some(500));

    let status = callback(
        &harness,
        json!({"results": [result("380501112233", "TEXT", "hi")]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(harness.engine.count("start"), 1);
}

// ---- Broadcast ----

#[tokio::test]
async fn test_broadcast_reports_failed_peers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(
            json!({"destinations": [{"to": {"phoneNumber": "000"}}]}),
        ))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid destination"))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let harness = harness(&server);

    let outcome = harness
        .registry
        .broadcast(
            1,
            Broadcast {
                peers: vec![
                    "whatsapp|380501112233".into(),
                    "000".into(),
                    "a|b|c".into(),
                ],
                message: Message::text("sale"),
                timeout: Duration::from_secs(5),
            },
        )
        .await
        .unwrap();

    let failed: Vec<&str> = outcome.failed.iter().map(|f| f.peer.as_str()).collect();
    assert_eq!(failed, vec!["000", "a|b|c"]);
    assert!(outcome.failed[0].error.contains("400"));
    assert_eq!(sent(&server).await.len(), 2);
}
