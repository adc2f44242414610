// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime binding of one bot profile to one provider instance.
//!
//! A gateway owns the channel indices of its profile and mediates webhook
//! registration with the [`Registry`]. Channels keep the gateway they were
//! started on, so a replaced gateway lives on until its last channel closes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use axum::response::Response;
use tracing::{debug, error, info, instrument, warn};

use switchboard_core::traits::{CheckSession, ContactUpdate};
use switchboard_core::types::{CLOSED_NOTICE, EXTERNAL_CHAT_PROPERTY, NONAME, WHATSAPP};
use switchboard_core::{
    log_and_continue, Account, BotProfile, ChatEngine, ContactStore, HostPin, Message,
    MessageKind, SwitchboardError,
};

use crate::channel::{Channel, ChannelState};
use crate::index::ChannelIndex;
use crate::provider::{Broadcast, BroadcastOutcome, Provider, Update, WebhookRequest};
use crate::registry::Registry;

pub struct Gateway {
    profile: BotProfile,
    provider: Arc<dyn Provider>,
    channels: Arc<ChannelIndex>,
    registry: Weak<Registry>,
    engine: Arc<dyn ChatEngine>,
    contacts: Arc<dyn ContactStore>,
    site_url: String,
    enabled: AtomicBool,
    deleted: AtomicBool,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("id", &self.profile.id)
            .field("uri", &self.profile.uri)
            .field("provider", &self.provider.name())
            .field("enabled", &self.is_enabled())
            .field("deleted", &self.is_deleted())
            .finish()
    }
}

/// Collaborators a gateway needs besides its profile.
pub(crate) struct GatewayParts {
    pub provider: Arc<dyn Provider>,
    pub channels: Arc<ChannelIndex>,
    pub registry: Weak<Registry>,
    pub engine: Arc<dyn ChatEngine>,
    pub contacts: Arc<dyn ContactStore>,
    pub site_url: String,
}

impl Gateway {
    pub(crate) fn new(profile: BotProfile, parts: GatewayParts) -> Self {
        let enabled = AtomicBool::new(profile.enabled);
        Self {
            profile,
            provider: parts.provider,
            channels: parts.channels,
            registry: parts.registry,
            engine: parts.engine,
            contacts: parts.contacts,
            site_url: parts.site_url,
            enabled,
            deleted: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> i64 {
        self.profile.id
    }

    pub fn uri(&self) -> &str {
        &self.profile.uri
    }

    pub fn profile(&self) -> &BotProfile {
        &self.profile
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn channels(&self) -> &Arc<ChannelIndex> {
        &self.channels
    }

    pub fn engine(&self) -> &Arc<dyn ChatEngine> {
        &self.engine
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    pub(crate) fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::Release);
    }

    /// Externally reachable webhook URL of this profile.
    pub fn callback_url(&self) -> String {
        format!("{}{}", self.site_url.trim_end_matches('/'), self.profile.uri)
    }

    fn registry(&self) -> Result<Arc<Registry>, SwitchboardError> {
        self.registry
            .upgrade()
            .ok_or_else(|| SwitchboardError::Internal("gateway registry is shut down".into()))
    }

    /// Installs this gateway under its webhook path.
    ///
    /// With `force` the provider is also pointed at the callback URL. A
    /// failed provider registration evicts the gateway again.
    #[instrument(skip_all, fields(profile_id = self.id(), uri = %self.uri(), force))]
    pub async fn register(self: &Arc<Self>, force: bool) -> Result<(), SwitchboardError> {
        let registry = self.registry()?;
        let installed = registry.install(self).await;

        if let Some(previous) = installed.previous {
            previous.set_enabled(self.is_enabled());
            if previous.uri() != self.uri() {
                log_and_continue("gateway.deregister", previous.provider.deregister().await);
                info!(from = %previous.uri(), "webhook path moved");
            }
        }
        if let Some(displaced) = installed.displaced {
            warn!(
                displaced_id = displaced.id(),
                "webhook path taken over from another profile"
            );
            log_and_continue("gateway.deregister", displaced.provider.deregister().await);
        }

        if force {
            let url = self.callback_url();
            if let Err(e) = self.provider.register(&url).await {
                self.remove().await;
                error!(error = %e, url, "provider webhook registration failed");
                return Err(e);
            }
            info!(url, "webhook registered");
        }
        Ok(())
    }

    /// Releases the webhook path if this gateway still holds it, then
    /// removes the provider's webhook registration.
    pub async fn deregister(&self) -> Result<(), SwitchboardError> {
        let registry = self.registry()?;
        if !registry.release_path(self).await {
            return Ok(());
        }
        self.provider.deregister().await?;
        info!(profile_id = self.id(), url = %self.callback_url(), "webhook deregistered");
        Ok(())
    }

    /// Evicts this gateway from both registry indices if it is still the
    /// registered instance.
    pub async fn remove(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.evict(self).await,
            None => false,
        }
    }

    /// Deregisters, evicts and closes the provider; every step best-effort.
    pub(crate) async fn dispose(&self) {
        log_and_continue("gateway.deregister", self.deregister().await);
        self.remove().await;
        log_and_continue("provider.close", self.provider.close().await);
        info!(profile_id = self.id(), "gateway disposed");
    }

    /// Drops `channel` from the indices. Disposes the profile's gateway if
    /// it was deleted and this was its last channel.
    pub(crate) async fn release(self: &Arc<Self>, channel: &Arc<Channel>) -> bool {
        let Some(now_empty) = self.channels.remove(channel).await else {
            return false;
        };
        switchboard_prometheus::record_channel_closed(self.provider_name());
        if !now_empty {
            return true;
        }

        let current = match self.registry.upgrade() {
            Some(registry) => registry.lookup(self.id()).await,
            None => None,
        };
        match current {
            Some(current) if current.is_deleted() => current.dispose().await,
            None if self.is_deleted() => self.dispose().await,
            Some(current) if !current.is_enabled() => {
                warn!(profile_id = self.id(), "disabled bot has no chats left");
            }
            _ => {}
        }
        true
    }

    /// Finds or creates the channel of an external contact.
    ///
    /// Without an `account` one is derived from `chat_id`. Unknown contacts
    /// are first checked against the engine so a conversation that outlived
    /// a restart is recovered instead of started twice.
    #[instrument(skip_all, fields(profile_id = self.id(), chat_id))]
    pub async fn get_channel(
        self: &Arc<Self>,
        chat_id: &str,
        account: Option<Account>,
    ) -> Result<Arc<Channel>, SwitchboardError> {
        let mut account = match account {
            Some(mut account) => {
                if account.channel.is_empty() {
                    account.channel = self.provider_name().to_string();
                }
                account
            }
            None if chat_id.is_empty() => {
                return Err(SwitchboardError::BadRequest(
                    "not enough information to resolve a chat".into(),
                ));
            }
            None => Account {
                channel: self.provider_name().to_string(),
                contact: chat_id.to_string(),
                ..Default::default()
            },
        };
        let chat_id = if chat_id.is_empty() {
            account.contact.clone()
        } else {
            chat_id.to_string()
        };

        let _load = self.channels.load_lock().await;
        if let Some(channel) = self.channels.lookup(account.id, &chat_id).await {
            self.reconcile_contact(&channel, &chat_id, &account).await;
            return Ok(channel);
        }

        let display_name = account.display_name();
        let route = HostPin::new();
        let lookup = self
            .engine
            .check_session(
                &route,
                CheckSession {
                    profile_id: self.id(),
                    external_id: account.contact.clone(),
                    username: display_name.clone(),
                    channel_type: account.channel.clone(),
                },
            )
            .await
            .inspect_err(|e| error!(error = %e, "session check failed"))?;
        if lookup.client_id != 0 {
            account.id = lookup.client_id;
        }

        if lookup.exists && !lookup.channel_id.is_empty() {
            let recovered_chat = lookup
                .properties
                .get(EXTERNAL_CHAT_PROPERTY)
                .filter(|id| !id.is_empty())
                .cloned()
                .unwrap_or_else(|| chat_id.clone());
            let channel = Channel::new(
                self.clone(),
                route,
                ChannelState {
                    chat_id: recovered_chat,
                    title: display_name,
                    account,
                    channel_id: lookup.channel_id,
                    conversation_id: lookup.conversation_id,
                    properties: lookup.properties,
                    closed_at: 0,
                },
            );
            self.channels.insert(&channel).await;
            info!(
                channel_id = %channel.channel_id(),
                conversation_id = %channel.conversation_id(),
                "chat recovered"
            );
            return Ok(channel);
        }

        if !self.is_enabled() {
            return Err(SwitchboardError::Disabled(format!(
                "profile {} is disabled",
                self.id()
            )));
        }
        let channel = Channel::new(
            self.clone(),
            route,
            ChannelState {
                chat_id: chat_id.clone(),
                title: display_name,
                account,
                properties: HashMap::from([(EXTERNAL_CHAT_PROPERTY.to_string(), chat_id)]),
                ..Default::default()
            },
        );
        self.channels.insert(&channel).await;
        debug!("chat made");
        Ok(channel)
    }

    /// Applies a changed display name or chat id to a cached channel and
    /// persists the contact in the background.
    async fn reconcile_contact(&self, channel: &Arc<Channel>, chat_id: &str, account: &Account) {
        let name = account.display_name();
        let mut changed = name != NONAME && channel.rename(account, &name);

        let current_chat = channel.chat_id();
        if !chat_id.is_empty() && chat_id != current_chat {
            if channel.account().channel == WHATSAPP {
                let old = channel.change_chat_id(chat_id);
                self.channels.rekey(channel, &old).await;
                info!(from = %old, to = chat_id, "chat id changed");
                changed = true;
            } else {
                warn!(from = %current_chat, to = chat_id, "chat id change ignored for this channel type");
            }
        }
        if !changed {
            return;
        }

        let contact = channel.account();
        let display = contact.display_name();
        let update = ContactUpdate {
            id: contact.id,
            channel_type: contact.channel,
            external_id: contact.contact,
            name: if display == NONAME { String::new() } else { display },
        };
        let contacts = self.contacts.clone();
        tokio::spawn(async move {
            log_and_continue("contact.update", contacts.update_contact(update).await);
        });
    }

    /// Handles one inbound provider callback.
    pub async fn webhook(self: &Arc<Self>, request: WebhookRequest) -> Option<Response> {
        self.provider.webhook(self, request).await
    }

    /// Relays one inbound message of `channel` to the engine.
    pub async fn read(
        &self,
        channel: &Arc<Channel>,
        message: &mut Message,
    ) -> Result<(), SwitchboardError> {
        if channel.is_new() && channel.title().is_empty() {
            channel.set_title(channel.account().display_name());
        }
        channel.recv(message).await
    }

    /// Delivers one engine message to an external contact.
    ///
    /// A `closed` message ends the chat on this side: the channel is marked
    /// closed before delivery and released afterwards, without calling the
    /// engine back.
    #[instrument(skip_all, fields(profile_id = self.id(), chat_id = external_user_id))]
    pub async fn send(
        self: &Arc<Self>,
        external_user_id: &str,
        mut message: Message,
    ) -> Result<(), SwitchboardError> {
        let channel = self.get_channel(external_user_id, None).await?;
        let closing = message.kind == MessageKind::Closed;
        if closing {
            if message.text.is_empty() {
                message.text = CLOSED_NOTICE.to_string();
            }
            if !channel.is_new() {
                channel.mark_closed();
            }
        }

        let update = Update {
            chat: channel.clone(),
            user: channel.account(),
            title: channel.title(),
            message,
        };
        // The channel's own gateway may be an older instance of this profile.
        let result = channel.gateway().provider().send_notify(&update).await;

        if closing {
            if channel.is_new() {
                channel.gateway().release(&channel).await;
            } else {
                channel.close().await?;
            }
        }
        match result {
            Ok(()) => {
                debug!(kind = %update.message.kind, "message sent");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, channel_id = %channel.channel_id(), "deliver message failed");
                Err(e)
            }
        }
    }

    pub async fn broadcast(&self, request: Broadcast) -> Result<BroadcastOutcome, SwitchboardError> {
        let peers = request.peers.len();
        let outcome = self.provider.broadcast(request).await?;
        info!(
            profile_id = self.id(),
            peers,
            failed = outcome.failed.len(),
            "broadcast delivered"
        );
        Ok(outcome)
    }

    pub async fn delete_message(
        &self,
        channel: &Arc<Channel>,
        message: &Message,
    ) -> Result<(), SwitchboardError> {
        channel.delete_message(message).await
    }
}
