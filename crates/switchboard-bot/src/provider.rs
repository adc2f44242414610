// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider plugin contract and the name-to-factory registry.
//!
//! A provider adapts one external messaging platform. The registry is
//! populated once at process start and is read-only afterwards.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;
use serde::{Deserialize, Serialize};

use switchboard_core::{Account, BotProfile, Message, SwitchboardError};

use crate::channel::Channel;
use crate::gateway::Gateway;

/// One outbound message for the external side of a channel.
#[derive(Debug, Clone)]
pub struct Update {
    pub chat: Arc<Channel>,
    pub user: Account,
    pub title: String,
    pub message: Message,
}

/// Raw inbound provider callback.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl WebhookRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Broadcast peer encoded as `type|id`, or just `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub id: String,
}

impl Peer {
    /// Parses `type|id`. Values with more than one separator are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split('|');
        let (kind, id) = match (parts.next(), parts.next(), parts.next()) {
            (Some(id), None, None) => ("", id),
            (Some(kind), Some(id), None) => (kind, id),
            _ => return None,
        };
        let id = id.trim();
        (!id.is_empty()).then(|| Self {
            kind: kind.trim().to_string(),
            id: id.to_string(),
        })
    }
}

/// Outbound broadcast to many external recipients.
#[derive(Debug, Clone)]
pub struct Broadcast {
    pub peers: Vec<String>,
    pub message: Message,
    /// How long to wait for an asynchronous delivery report; zero means
    /// return right after sending.
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPeer {
    pub peer: String,
    pub error: String,
}

/// Broadcast result. The default (no failures) is success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastOutcome {
    pub failed: Vec<FailedPeer>,
}

/// Adapter for one external messaging platform.
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    /// Stable provider code name.
    fn name(&self) -> &str;

    /// Delivers one update to the external side of `update.chat`.
    async fn send_notify(&self, update: &Update) -> Result<(), SwitchboardError>;

    /// Handles one inbound callback. `None` lets the caller answer 200.
    async fn webhook(&self, gateway: &Arc<Gateway>, request: WebhookRequest) -> Option<Response>;

    /// Points the platform's webhook at `callback_url`.
    async fn register(&self, callback_url: &str) -> Result<(), SwitchboardError>;

    /// Removes the webhook registration.
    async fn deregister(&self) -> Result<(), SwitchboardError>;

    /// Releases provider-held resources.
    async fn close(&self) -> Result<(), SwitchboardError>;

    async fn broadcast(&self, request: Broadcast) -> Result<BroadcastOutcome, SwitchboardError> {
        let _ = request;
        Err(SwitchboardError::BadRequest(format!(
            "chat.bot.{}.broadcast.unsupported",
            self.name()
        )))
    }

    /// Lets a replacement instance downcast its predecessor.
    fn as_any(&self) -> &dyn Any;
}

/// Builds a provider for a profile, optionally from the instance it replaces.
pub type ProviderFactory = Arc<
    dyn Fn(&BotProfile, Option<Arc<dyn Provider>>) -> Result<Arc<dyn Provider>, SwitchboardError>
        + Send
        + Sync,
>;

pub struct ProviderEntry {
    pub name: String,
    pub description: String,
    pub factory: ProviderFactory,
}

impl std::fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// Registry of provider factories keyed by provider type name.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    entries: HashMap<String, ProviderEntry>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory. A duplicate name is a configuration error.
    pub fn register<F>(
        &mut self,
        name: &str,
        description: &str,
        factory: F,
    ) -> Result<(), SwitchboardError>
    where
        F: Fn(&BotProfile, Option<Arc<dyn Provider>>) -> Result<Arc<dyn Provider>, SwitchboardError>
            + Send
            + Sync
            + 'static,
    {
        if self.entries.contains_key(name) {
            return Err(SwitchboardError::Config(format!(
                "provider `{name}` registered twice"
            )));
        }
        self.entries.insert(
            name.to_string(),
            ProviderEntry {
                name: name.to_string(),
                description: description.to_string(),
                factory: Arc::new(factory),
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ProviderEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Provider names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Constructs the provider named by `profile.provider`.
    pub fn build(
        &self,
        profile: &BotProfile,
        previous: Option<Arc<dyn Provider>>,
    ) -> Result<Arc<dyn Provider>, SwitchboardError> {
        let entry = self
            .get(&profile.provider)
            .ok_or_else(|| SwitchboardError::ProviderNotFound(profile.provider.clone()))?;
        (entry.factory)(profile, previous).map_err(|e| match e {
            setup @ SwitchboardError::ProviderSetup { .. } => setup,
            other => SwitchboardError::ProviderSetup {
                provider: profile.provider.clone(),
                message: other.to_string(),
            },
        })
    }
}
