// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock provider plugin for integration tests.
//!
//! Every instance built by the factory shares one [`MockState`], so tests
//! can observe deliveries and webhook registrations across gateway
//! replacements.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use switchboard_bot::{
    Broadcast, BroadcastOutcome, Gateway, Provider, ProviderRegistry, Update, WebhookRequest,
};
use switchboard_core::{Account, BotProfile, Message, MessageKind, SwitchboardError};

/// Provider type name of [`MockProvider`].
pub const MOCK: &str = "mock";

/// One update delivered to the external side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub profile_id: i64,
    pub chat_id: String,
    pub kind: MessageKind,
    pub text: String,
    pub title: String,
}

/// Observations shared by all mock provider instances.
#[derive(Debug, Default)]
pub struct MockState {
    notices: Mutex<Vec<Notice>>,
    registered: Mutex<Vec<String>>,
    broadcasts: Mutex<Vec<Vec<String>>>,
    outcome: Mutex<BroadcastOutcome>,
    deregistered: AtomicUsize,
    closed: AtomicUsize,
    built: AtomicUsize,
    reused: AtomicUsize,
    fail_register: AtomicBool,
    fail_send: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notices(&self) -> Vec<Notice> {
        lock(&self.notices).clone()
    }

    pub fn notice_count(&self) -> usize {
        lock(&self.notices).len()
    }

    /// Callback URLs passed to `register`, in call order.
    pub fn registrations(&self) -> Vec<String> {
        lock(&self.registered).clone()
    }

    /// Peer lists of every broadcast request.
    pub fn broadcasts(&self) -> Vec<Vec<String>> {
        lock(&self.broadcasts).clone()
    }

    pub fn deregistrations(&self) -> usize {
        self.deregistered.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Provider instances constructed so far.
    pub fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }

    /// Constructions that received a mock predecessor.
    pub fn reused(&self) -> usize {
        self.reused.load(Ordering::SeqCst)
    }

    pub fn fail_register(&self, fail: bool) {
        self.fail_register.store(fail, Ordering::SeqCst);
    }

    pub fn fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    pub fn set_broadcast_outcome(&self, outcome: BroadcastOutcome) {
        *lock(&self.outcome) = outcome;
    }
}

/// Inbound webhook body understood by the mock: `{"chatId", "name", "text"}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MockInbound {
    chat_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    text: String,
}

/// Provider that records instead of talking to a platform.
pub struct MockProvider {
    profile_id: i64,
    state: Arc<MockState>,
}

impl MockProvider {
    pub fn new(profile: &BotProfile, state: Arc<MockState>) -> Self {
        Self {
            profile_id: profile.id,
            state,
        }
    }

    /// Registers the `mock` factory. Profiles with a `fail_setup` metadata
    /// key are rejected at construction.
    pub fn register_into(
        registry: &mut ProviderRegistry,
        state: Arc<MockState>,
    ) -> Result<(), SwitchboardError> {
        registry.register(MOCK, "Recording provider for tests", move |profile, previous| {
            if let Some(reason) = profile.meta("fail_setup") {
                return Err(SwitchboardError::BadRequest(reason.to_string()));
            }
            state.built.fetch_add(1, Ordering::SeqCst);
            if previous
                .as_ref()
                .is_some_and(|p| p.as_any().downcast_ref::<MockProvider>().is_some())
            {
                state.reused.fetch_add(1, Ordering::SeqCst);
            }
            Ok(Arc::new(MockProvider::new(profile, state.clone())) as Arc<dyn Provider>)
        })
    }

    pub fn state(&self) -> &Arc<MockState> {
        &self.state
    }
}

fn reply(status: StatusCode, message: impl Into<String>) -> Option<Response> {
    Some((status, message.into()).into_response())
}

fn error_reply(error: &SwitchboardError) -> Option<Response> {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    reply(status, error.to_string())
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        MOCK
    }

    async fn send_notify(&self, update: &Update) -> Result<(), SwitchboardError> {
        if self.state.fail_send.load(Ordering::SeqCst) {
            return Err(SwitchboardError::provider("mock delivery failure"));
        }
        lock(&self.state.notices).push(Notice {
            profile_id: self.profile_id,
            chat_id: update.chat.chat_id(),
            kind: update.message.kind,
            text: update.message.text.clone(),
            title: update.title.clone(),
        });
        Ok(())
    }

    async fn webhook(&self, gateway: &Arc<Gateway>, request: WebhookRequest) -> Option<Response> {
        if request.method != Method::POST {
            return reply(StatusCode::METHOD_NOT_ALLOWED, "POST only");
        }
        let inbound: MockInbound = match serde_json::from_slice(&request.body) {
            Ok(inbound) => inbound,
            Err(e) => return reply(StatusCode::BAD_REQUEST, e.to_string()),
        };
        let account = Account {
            first_name: inbound.name,
            channel: MOCK.to_string(),
            contact: inbound.chat_id.clone(),
            ..Default::default()
        };
        let channel = match gateway.get_channel(&inbound.chat_id, Some(account)).await {
            Ok(channel) => channel,
            Err(e) => return error_reply(&e),
        };
        let mut message = Message::text(inbound.text);
        match gateway.read(&channel, &mut message).await {
            Ok(()) => None,
            Err(e) => error_reply(&e),
        }
    }

    async fn register(&self, callback_url: &str) -> Result<(), SwitchboardError> {
        if self.state.fail_register.load(Ordering::SeqCst) {
            return Err(SwitchboardError::provider("mock register failure"));
        }
        lock(&self.state.registered).push(callback_url.to_string());
        Ok(())
    }

    async fn deregister(&self) -> Result<(), SwitchboardError> {
        self.state.deregistered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), SwitchboardError> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn broadcast(&self, request: Broadcast) -> Result<BroadcastOutcome, SwitchboardError> {
        lock(&self.state.broadcasts).push(request.peers);
        Ok(lock(&self.state.outcome).clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
