// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation state of one external contact.
//!
//! A channel starts **new** (no internal conversation), becomes **active**
//! once the engine accepts the start request, and ends **closed** when
//! either side hangs up. Closed channels leave the gateway indices.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

use switchboard_core::traits::{
    CloseCause, CloseConversation, DeleteMessage, Participant, SendMessage, Sent,
    StartConversation,
};
use switchboard_core::types::{now_millis, CLOSE_COMMAND};
use switchboard_core::{log_and_continue, Account, HostPin, Message, MessageKind, SwitchboardError};

use crate::gateway::Gateway;

/// Mutable part of a channel.
#[derive(Debug, Clone, Default)]
pub struct ChannelState {
    pub chat_id: String,
    pub title: String,
    pub account: Account,
    /// Leg id on the engine; empty while new.
    pub channel_id: String,
    pub conversation_id: String,
    pub properties: HashMap<String, String>,
    /// Unix millis; zero while open.
    pub closed_at: i64,
}

pub struct Channel {
    gateway: Arc<Gateway>,
    route: HostPin,
    recv: Mutex<()>,
    state: RwLock<ChannelState>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("Channel")
            .field("profile_id", &self.gateway.id())
            .field("chat_id", &state.chat_id)
            .field("channel_id", &state.channel_id)
            .field("conversation_id", &state.conversation_id)
            .field("host", &self.route.host())
            .field("closed_at", &state.closed_at)
            .finish()
    }
}

impl Channel {
    pub(crate) fn new(gateway: Arc<Gateway>, route: HostPin, state: ChannelState) -> Arc<Self> {
        Arc::new(Self {
            gateway,
            route,
            recv: Mutex::new(()),
            state: RwLock::new(state),
        })
    }

    fn state(&self) -> RwLockReadGuard<'_, ChannelState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, ChannelState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Gateway this channel was started on.
    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Engine host preference of this conversation.
    pub fn route(&self) -> &HostPin {
        &self.route
    }

    pub fn snapshot(&self) -> ChannelState {
        self.state().clone()
    }

    pub fn chat_id(&self) -> String {
        self.state().chat_id.clone()
    }

    pub fn title(&self) -> String {
        self.state().title.clone()
    }

    pub fn account(&self) -> Account {
        self.state().account.clone()
    }

    pub fn channel_id(&self) -> String {
        self.state().channel_id.clone()
    }

    pub fn conversation_id(&self) -> String {
        self.state().conversation_id.clone()
    }

    pub fn property(&self, key: &str) -> Option<String> {
        self.state().properties.get(key).cloned()
    }

    pub fn closed_at(&self) -> i64 {
        self.state().closed_at
    }

    /// No engine conversation yet.
    pub fn is_new(&self) -> bool {
        self.state().channel_id.is_empty()
    }

    pub(crate) fn set_title(&self, title: impl Into<String>) {
        self.state_mut().title = title.into();
    }

    /// Applies a new contact name. Returns false if nothing changed.
    pub(crate) fn rename(&self, account: &Account, display_name: &str) -> bool {
        let mut state = self.state_mut();
        if state.account.display_name() == display_name {
            return false;
        }
        state.account.first_name = account.first_name.clone();
        state.account.last_name = account.last_name.clone();
        state.account.username = account.username.clone();
        if state.properties.contains_key("from") {
            state
                .properties
                .insert("from".to_string(), display_name.to_string());
        }
        if !state.channel_id.is_empty() {
            state.title = display_name.to_string();
        }
        true
    }

    /// Switches the external chat id. Returns the previous one.
    pub(crate) fn change_chat_id(&self, chat_id: &str) -> String {
        let mut state = self.state_mut();
        state.account.contact = chat_id.to_string();
        if state.properties.contains_key("user") {
            state
                .properties
                .insert("user".to_string(), chat_id.to_string());
        }
        std::mem::replace(&mut state.chat_id, chat_id.to_string())
    }

    /// Sets the close timestamp. Only the first caller wins.
    pub(crate) fn mark_closed(&self) -> bool {
        let mut state = self.state_mut();
        if state.closed_at != 0 {
            return false;
        }
        state.closed_at = now_millis();
        true
    }

    /// Handles one inbound message from the external contact.
    ///
    /// Messages of one channel are processed one at a time.
    #[instrument(skip_all, fields(profile_id = self.gateway.id(), chat_id = %self.chat_id()))]
    pub async fn recv(self: &Arc<Self>, message: &mut Message) -> Result<(), SwitchboardError> {
        let close = message.kind == MessageKind::Text && message.text == CLOSE_COMMAND;
        let _serial = self.recv.lock().await;

        if self.is_new() {
            if close {
                debug!("close command on a chat that never started, ignored");
                return Ok(());
            }
            return self.start_serialized(message).await;
        }
        if close {
            return self.close().await;
        }

        let (contact_id, channel_id, conversation_id) = {
            let state = self.state();
            (
                state.account.id,
                state.channel_id.clone(),
                state.conversation_id.clone(),
            )
        };
        let has_file = message.file.is_some();
        let sent = self
            .gateway
            .engine()
            .send_message(
                &self.route,
                SendMessage {
                    auth_user_id: contact_id,
                    channel_id,
                    conversation_id,
                    message: message.clone(),
                },
            )
            .await;

        match sent {
            Ok(Sent {
                message: Some(echo),
            }) => {
                *message = echo;
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(SwitchboardError::Engine {
                status: Some(412), ..
            }) if has_file => Err(SwitchboardError::FilePolicy),
            Err(e) => {
                error!(error = %e, "relay message to engine failed");
                Err(e)
            }
        }
    }

    /// Starts the engine conversation for a new channel.
    pub async fn start(self: &Arc<Self>, message: &Message) -> Result<(), SwitchboardError> {
        let _serial = self.recv.lock().await;
        if !self.is_new() {
            return Err(SwitchboardError::BadRequest(format!(
                "chat {} already started",
                self.chat_id()
            )));
        }
        self.start_serialized(message).await
    }

    async fn start_serialized(self: &Arc<Self>, message: &Message) -> Result<(), SwitchboardError> {
        if message.is_edited() {
            debug!("edited message does not start a conversation");
            return Ok(());
        }
        let profile = self.gateway.profile();
        if !self.gateway.is_enabled() {
            return Err(SwitchboardError::Disabled(format!(
                "profile {} does not accept new chats",
                profile.id
            )));
        }

        let request = {
            let mut state = self.state_mut();
            if state.title.is_empty() {
                state.title = state.account.display_name();
            }
            let mut properties = state.properties.clone();
            properties.insert("cid".into(), state.account.id.to_string());
            properties.insert("chat".into(), state.account.channel.clone());
            properties.insert("user".into(), state.account.contact.clone());
            properties.insert("from".into(), state.account.display_name());
            properties.insert("flow".into(), profile.flow_id.to_string());
            StartConversation {
                domain_id: profile.domain_id,
                username: state.title.clone(),
                user: Participant {
                    user_id: state.account.id,
                    channel_type: state.account.channel.clone(),
                    connection: profile.id.to_string(),
                    internal: false,
                },
                message: message.clone(),
                properties,
            }
        };

        let started = self
            .gateway
            .engine()
            .start_conversation(&self.route, request)
            .await
            .inspect_err(|e| error!(error = %e, "start conversation failed"))?;

        {
            let mut state = self.state_mut();
            state.closed_at = 0;
            state.channel_id = started.channel_id.clone();
            state.conversation_id = started.conversation_id.clone();
        }
        self.gateway.channels().insert(self).await;
        switchboard_prometheus::record_channel_started(self.gateway.provider_name());
        info!(
            channel_id = %started.channel_id,
            conversation_id = %started.conversation_id,
            host = ?self.route.host(),
            "chat started"
        );
        Ok(())
    }

    /// Ends the conversation. Calling it again is a no-op.
    ///
    /// A channel already marked closed (the engine ended it) is only
    /// released. Otherwise the engine is told the contact left; the channel
    /// is released whether or not that call succeeds.
    #[instrument(skip_all, fields(profile_id = self.gateway.id(), chat_id = %self.chat_id()))]
    pub async fn close(self: &Arc<Self>) -> Result<(), SwitchboardError> {
        if self.closed_at() != 0 {
            if self.gateway.release(self).await {
                info!("chat closed");
            } else {
                debug!("chat already closed");
            }
            return Ok(());
        }
        if !self.mark_closed() {
            debug!("chat already closed");
            return Ok(());
        }
        if self.is_new() {
            self.gateway.release(self).await;
            debug!("unstarted chat dropped");
            return Ok(());
        }

        let request = {
            let state = self.state();
            CloseConversation {
                conversation_id: state.conversation_id.clone(),
                closer_channel_id: state.channel_id.clone(),
                auth_user_id: state.account.id,
                cause: CloseCause::ClientLeave,
            }
        };
        let result = self
            .gateway
            .engine()
            .close_conversation(&self.route, request)
            .await;
        self.gateway.release(self).await;
        if log_and_continue("chat.close", result).is_some() {
            info!(channel_id = %self.channel_id(), "chat closed by contact");
        }
        Ok(())
    }

    /// Asks the engine to delete a previously relayed message.
    pub async fn delete_message(&self, message: &Message) -> Result<(), SwitchboardError> {
        let request = {
            let state = self.state();
            DeleteMessage {
                auth_user_id: state.account.id,
                channel_id: state.channel_id.clone(),
                conversation_id: state.conversation_id.clone(),
                message_id: message.id,
                variables: message.variables.clone(),
            }
        };
        self.gateway
            .engine()
            .delete_message(&self.route, request)
            .await
    }
}
