// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contract of the internal conversation engine.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SwitchboardError;
use crate::routing::HostPin;
use crate::types::Message;

/// Asks whether a persisted conversation exists for an external contact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSession {
    pub profile_id: i64,
    pub external_id: String,
    pub username: String,
    /// Channel type tag of the contact.
    #[serde(rename = "type")]
    pub channel_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLookup {
    #[serde(default)]
    pub exists: bool,
    /// Internal contact id, assigned even when no conversation exists.
    #[serde(default)]
    pub client_id: i64,
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

/// Contact identity as seen by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: i64,
    #[serde(rename = "type")]
    pub channel_type: String,
    /// Profile id the contact talks through.
    pub connection: String,
    pub internal: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartConversation {
    pub domain_id: i64,
    pub username: String,
    pub user: Participant,
    pub message: Message,
    pub properties: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Started {
    pub conversation_id: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessage {
    pub auth_user_id: i64,
    pub channel_id: String,
    pub conversation_id: String,
    pub message: Message,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sent {
    /// Normalised copy of the relayed message, if the engine reshaped it.
    #[serde(default)]
    pub message: Option<Message>,
}

/// Why a conversation was closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseCause {
    /// The external contact left.
    #[default]
    ClientLeave,
    /// The gateway gave up on the conversation.
    FlowEnd,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseConversation {
    pub conversation_id: String,
    pub closer_channel_id: String,
    pub auth_user_id: i64,
    pub cause: CloseCause,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteMessage {
    pub auth_user_id: i64,
    pub channel_id: String,
    pub conversation_id: String,
    pub message_id: i64,
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

/// Conversation RPCs of the internal engine.
///
/// Every call takes the [`HostPin`] of the channel it is made for, so the
/// transport can route it to the node holding that conversation.
#[async_trait]
pub trait ChatEngine: Send + Sync + 'static {
    async fn check_session(
        &self,
        route: &HostPin,
        req: CheckSession,
    ) -> Result<SessionLookup, SwitchboardError>;

    async fn start_conversation(
        &self,
        route: &HostPin,
        req: StartConversation,
    ) -> Result<Started, SwitchboardError>;

    async fn send_message(
        &self,
        route: &HostPin,
        req: SendMessage,
    ) -> Result<Sent, SwitchboardError>;

    async fn close_conversation(
        &self,
        route: &HostPin,
        req: CloseConversation,
    ) -> Result<(), SwitchboardError>;

    async fn delete_message(
        &self,
        route: &HostPin,
        req: DeleteMessage,
    ) -> Result<(), SwitchboardError>;
}
