// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock internal engine for integration tests.
//!
//! Answers every conversation RPC from memory and records the requests so
//! tests can assert what the gateway asked for.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use switchboard_core::traits::{
    CheckSession, CloseConversation, ContactUpdate, DeleteMessage, SendMessage, SessionLookup,
    Sent, StartConversation, Started,
};
use switchboard_core::{ChatEngine, ContactStore, HostPin, Message, SwitchboardError};

/// One request received by [`MockEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    CheckSession(CheckSession),
    Start(StartConversation),
    Send(SendMessage),
    Close(CloseConversation),
    Delete(DeleteMessage),
    Contact(ContactUpdate),
}

impl EngineCall {
    /// RPC method name, as used by [`MockEngine::fail`].
    pub fn method(&self) -> &'static str {
        match self {
            Self::CheckSession(_) => "check_session",
            Self::Start(_) => "start",
            Self::Send(_) => "send",
            Self::Close(_) => "close",
            Self::Delete(_) => "delete",
            Self::Contact(_) => "contact",
        }
    }
}

/// In-memory [`ChatEngine`] and [`ContactStore`].
///
/// Contacts get a stable client id on their first session check. Started
/// conversations are numbered `conv-N` / `chan-N`.
pub struct MockEngine {
    node: String,
    calls: Arc<Mutex<Vec<EngineCall>>>,
    sessions: Mutex<HashMap<String, SessionLookup>>,
    clients: Mutex<HashMap<String, i64>>,
    failures: Mutex<HashMap<&'static str, Option<u16>>>,
    echo: Mutex<Option<Message>>,
    start_delay: Mutex<Duration>,
    next_client: AtomicI64,
    next_conversation: AtomicUsize,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self::on_node("mock-node")
    }

    /// Engine reporting `node` as the host that served each call.
    pub fn on_node(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            calls: Arc::new(Mutex::new(Vec::new())),
            sessions: Mutex::new(HashMap::new()),
            clients: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            echo: Mutex::new(None),
            start_delay: Mutex::new(Duration::ZERO),
            next_client: AtomicI64::new(100),
            next_conversation: AtomicUsize::new(1),
        }
    }

    /// Makes `check_session` report an existing conversation for a contact.
    pub fn with_session(&self, external_id: &str, lookup: SessionLookup) -> &Self {
        lock(&self.sessions).insert(external_id.to_string(), lookup);
        self
    }

    /// Makes every call of `method` fail, with `status` as the engine HTTP
    /// status when given.
    pub fn fail(&self, method: &'static str, status: Option<u16>) -> &Self {
        lock(&self.failures).insert(method, status);
        self
    }

    pub fn recover(&self, method: &'static str) -> &Self {
        lock(&self.failures).remove(method);
        self
    }

    /// Returns `message` from every `send_message` as the normalised copy.
    pub fn echo(&self, message: Message) -> &Self {
        *lock(&self.echo) = Some(message);
        self
    }

    /// Delays each `start_conversation` to widen race windows.
    pub fn delay_start(&self, delay: Duration) -> &Self {
        *lock(&self.start_delay) = delay;
        self
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        lock(&self.calls).clone()
    }

    pub fn count(&self, method: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| call.method() == method)
            .count()
    }

    pub fn starts(&self) -> Vec<StartConversation> {
        self.filter(|call| match call {
            EngineCall::Start(req) => Some(req.clone()),
            _ => None,
        })
    }

    pub fn sends(&self) -> Vec<SendMessage> {
        self.filter(|call| match call {
            EngineCall::Send(req) => Some(req.clone()),
            _ => None,
        })
    }

    pub fn closes(&self) -> Vec<CloseConversation> {
        self.filter(|call| match call {
            EngineCall::Close(req) => Some(req.clone()),
            _ => None,
        })
    }

    pub fn contact_updates(&self) -> Vec<ContactUpdate> {
        self.filter(|call| match call {
            EngineCall::Contact(req) => Some(req.clone()),
            _ => None,
        })
    }

    /// Methods currently set to fail.
    pub fn failing(&self) -> HashSet<&'static str> {
        lock(&self.failures).keys().copied().collect()
    }

    /// Client id assigned to an external contact, if it was ever checked.
    pub fn client_id(&self, external_id: &str) -> Option<i64> {
        lock(&self.clients).get(external_id).copied()
    }

    fn filter<T>(&self, pick: impl Fn(&EngineCall) -> Option<T>) -> Vec<T> {
        lock(&self.calls).iter().filter_map(pick).collect()
    }

    fn record(&self, call: EngineCall) -> Result<(), SwitchboardError> {
        let method = call.method();
        lock(&self.calls).push(call);
        match lock(&self.failures).get(method) {
            Some(status) => Err(SwitchboardError::engine(
                format!("mock {method} failure"),
                *status,
            )),
            None => Ok(()),
        }
    }

    fn served(&self, route: &HostPin) {
        route.record_success(&self.node);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl ChatEngine for MockEngine {
    async fn check_session(
        &self,
        route: &HostPin,
        req: CheckSession,
    ) -> Result<SessionLookup, SwitchboardError> {
        let external_id = req.external_id.clone();
        self.record(EngineCall::CheckSession(req))?;
        self.served(route);

        if let Some(lookup) = lock(&self.sessions).get(&external_id) {
            return Ok(lookup.clone());
        }
        let client_id = *lock(&self.clients)
            .entry(external_id)
            .or_insert_with(|| self.next_client.fetch_add(1, Ordering::SeqCst));
        Ok(SessionLookup {
            client_id,
            ..Default::default()
        })
    }

    async fn start_conversation(
        &self,
        route: &HostPin,
        req: StartConversation,
    ) -> Result<Started, SwitchboardError> {
        let delay = *lock(&self.start_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.record(EngineCall::Start(req))?;
        self.served(route);
        let n = self.next_conversation.fetch_add(1, Ordering::SeqCst);
        Ok(Started {
            conversation_id: format!("conv-{n}"),
            channel_id: format!("chan-{n}"),
        })
    }

    async fn send_message(
        &self,
        route: &HostPin,
        req: SendMessage,
    ) -> Result<Sent, SwitchboardError> {
        self.record(EngineCall::Send(req))?;
        self.served(route);
        Ok(Sent {
            message: lock(&self.echo).clone(),
        })
    }

    async fn close_conversation(
        &self,
        route: &HostPin,
        req: CloseConversation,
    ) -> Result<(), SwitchboardError> {
        self.record(EngineCall::Close(req))?;
        self.served(route);
        Ok(())
    }

    async fn delete_message(
        &self,
        route: &HostPin,
        req: DeleteMessage,
    ) -> Result<(), SwitchboardError> {
        self.record(EngineCall::Delete(req))?;
        self.served(route);
        Ok(())
    }
}

#[async_trait]
impl ContactStore for MockEngine {
    async fn update_contact(&self, update: ContactUpdate) -> Result<(), SwitchboardError> {
        self.record(EngineCall::Contact(update))
    }
}
