// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider speaking signed JSON to a customer-owned webhook.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use dashmap::{DashMap, DashSet};
use tracing::{debug, info, warn};

use switchboard_bot::{
    Broadcast, BroadcastOutcome, BroadcastSync, FailedPeer, Gateway, Peer, Provider, Update,
    WebhookRequest,
};
use switchboard_core::types::now_millis;
use switchboard_core::{Account, BotProfile, File, Message, MessageKind, SwitchboardError, UpdateTemplates};

use crate::model::{
    BroadcastReport, CloseEvent, Inbound, InboundEvent, InboundMessage, OutboundBroadcast,
    OutboundEvent, OutboundMessage, Receiver, Reply, WireFile,
};
use crate::sign::{sign, verify, SIGN_HEADER};
use crate::PROVIDER;

/// Start variable naming the sender's own channel type.
const SOURCE_VARIABLE: &str = "source";

/// State that survives a profile update.
#[derive(Default)]
struct Shared {
    /// Last seen contact per chat id.
    contacts: DashMap<String, Account>,
    /// Chats closed from the customer side whose close notice must not be
    /// echoed back.
    close_queue: DashSet<String>,
    broadcasts: BroadcastSync<BroadcastOutcome>,
}

pub struct CustomProvider {
    profile_id: i64,
    secret: String,
    webhook: reqwest::Url,
    templates: UpdateTemplates,
    client: reqwest::Client,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for CustomProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomProvider")
            .field("profile_id", &self.profile_id)
            .field("webhook", &self.webhook.as_str())
            .field("secret", &"[redacted]")
            .finish_non_exhaustive()
    }
}

fn setup_error(message: impl Into<String>) -> SwitchboardError {
    SwitchboardError::ProviderSetup {
        provider: PROVIDER.to_string(),
        message: message.into(),
    }
}

fn reply(status: StatusCode, body: Reply) -> Response {
    (status, Json(body)).into_response()
}

fn error_status(e: &SwitchboardError) -> StatusCode {
    StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl CustomProvider {
    /// Builds the provider from profile metadata (`secret`, `webhook`).
    ///
    /// Caches of `previous` are taken over when it is a custom provider.
    pub fn new(
        profile: &BotProfile,
        previous: Option<Arc<dyn Provider>>,
    ) -> Result<Self, SwitchboardError> {
        let secret = profile
            .meta("secret")
            .ok_or_else(|| setup_error("custom: secret required"))?
            .to_string();
        let raw = profile
            .meta("webhook")
            .ok_or_else(|| setup_error("custom: webhook required"))?;
        let webhook = reqwest::Url::parse(raw)
            .map_err(|e| setup_error(format!("custom: webhook `{raw}`: {e}")))?;
        if !matches!(webhook.scheme(), "http" | "https") {
            return Err(setup_error(format!(
                "custom: webhook `{raw}` must be an http(s) URL"
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| setup_error(format!("failed to build HTTP client: {e}")))?;

        let shared = previous
            .as_ref()
            .and_then(|p| p.as_any().downcast_ref::<CustomProvider>())
            .map(|p| p.shared.clone())
            .unwrap_or_default();

        Ok(Self {
            profile_id: profile.id,
            secret,
            webhook,
            templates: profile.updates.clone(),
            client,
            shared,
        })
    }

    pub fn webhook_url(&self) -> &str {
        self.webhook.as_str()
    }

    /// Number of cached contacts.
    pub fn contacts(&self) -> usize {
        self.shared.contacts.len()
    }

    pub fn pending_broadcasts(&self) -> usize {
        self.shared.broadcasts.pending()
    }

    async fn post(&self, event: &OutboundEvent) -> Result<(), SwitchboardError> {
        let body = serde_json::to_vec(event)
            .map_err(|e| SwitchboardError::provider_with("custom: encode event", e))?;
        let signature = sign(&body, &self.secret)
            .map_err(|e| SwitchboardError::provider_with("custom: sign event", e))?;

        let response = self
            .client
            .post(self.webhook.clone())
            .header(SIGN_HEADER, signature)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| SwitchboardError::provider_with(format!("custom: POST {}", self.webhook), e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SwitchboardError::provider(format!(
                "custom: webhook returned {status}: {text}"
            )));
        }
        debug!(profile_id = self.profile_id, status = %status, "custom event delivered");
        Ok(())
    }

    fn contact_for(&self, chat_id: &str, sender: &crate::model::Sender) -> Account {
        self.shared
            .contacts
            .entry(chat_id.to_string())
            .and_modify(|known| {
                known.first_name = sender.name.clone();
                known.username = sender.nickname.clone();
            })
            .or_insert_with(|| Account {
                channel: PROVIDER.to_string(),
                contact: sender.id.clone(),
                first_name: sender.name.clone(),
                username: sender.nickname.clone(),
                ..Default::default()
            })
            .value()
            .clone()
    }

    async fn on_message(&self, gateway: &Arc<Gateway>, event: InboundMessage) -> Response {
        let sender = match event.validate() {
            Ok(sender) => sender.clone(),
            Err(reason) => return reply(StatusCode::BAD_REQUEST, Reply::error(reason)),
        };
        let account = self.contact_for(&event.chat_id, &sender);

        let channel = match gateway.get_channel(&event.chat_id, Some(account)).await {
            Ok(channel) => channel,
            Err(e) => return reply(error_status(&e), Reply::error(&e)),
        };

        let created_at = if event.date > 0 {
            event.date * 1000
        } else {
            now_millis()
        };
        let mut message = Message {
            text: event.text,
            created_at,
            ..Default::default()
        };
        if let Some(file) = event.file {
            message.kind = MessageKind::File;
            message.file = Some(File {
                url: file.url,
                mime: file.mime,
                size: file.size,
                name: file.name,
                ..Default::default()
            });
        }
        if channel.is_new() {
            message.variables = event.metadata;
            if !sender.kind.is_empty() {
                message
                    .variables
                    .insert(SOURCE_VARIABLE.to_string(), sender.kind);
            }
        }

        match gateway.read(&channel, &mut message).await {
            Ok(()) => reply(StatusCode::OK, Reply::ok()),
            Err(e) => reply(error_status(&e), Reply::error(&e)),
        }
    }

    async fn on_close(&self, gateway: &Arc<Gateway>, event: CloseEvent) -> Response {
        let chat_id = event.chat_id.trim();
        if chat_id.is_empty() {
            return reply(StatusCode::BAD_REQUEST, Reply::error("chat id is empty"));
        }
        let account = self.shared.contacts.get(chat_id).map(|a| a.value().clone());
        let channel = match gateway.get_channel(chat_id, account).await {
            Ok(channel) => channel,
            Err(e) => return reply(StatusCode::BAD_REQUEST, Reply::error(&e)),
        };

        let queued = !channel.is_new() && self.shared.close_queue.insert(chat_id.to_string());
        if let Err(e) = channel.close().await {
            if queued {
                self.shared.close_queue.remove(chat_id);
            }
            return reply(StatusCode::BAD_REQUEST, Reply::error(&e));
        }
        self.shared.contacts.remove(chat_id);
        info!(profile_id = self.profile_id, chat_id, "chat closed by customer");
        reply(StatusCode::OK, Reply::ok())
    }

    fn on_broadcast(&self, report: BroadcastReport) -> Response {
        let outcome = BroadcastOutcome {
            failed: report
                .failed_receivers
                .iter()
                .map(|r| FailedPeer {
                    peer: r.peer(),
                    error: r.error.clone(),
                })
                .collect(),
        };
        let failed = outcome.failed.len();
        if !self.shared.broadcasts.publish(&report.event_id, outcome) {
            warn!(
                profile_id = self.profile_id,
                event_id = %report.event_id,
                failed,
                "broadcast report arrived after its wait ended"
            );
        }
        reply(StatusCode::OK, Reply::ok())
    }
}

/// Strips the `type|` prefix of a typed chat id.
fn outbound_chat_id(chat_id: &str) -> String {
    Peer::parse(chat_id)
        .map(|peer| peer.id)
        .unwrap_or_else(|| chat_id.to_string())
}

#[async_trait]
impl Provider for CustomProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn send_notify(&self, update: &Update) -> Result<(), SwitchboardError> {
        let chat_key = update.chat.chat_id();
        let chat_id = outbound_chat_id(&chat_key);
        let message = &update.message;
        let outbound = |text: String, file: Option<WireFile>| {
            OutboundEvent::Message(OutboundMessage {
                chat_id: chat_id.clone(),
                date: now_millis() / 1000,
                text,
                file,
            })
        };

        let event = match message.kind {
            MessageKind::Text => {
                let text = message.text.trim();
                if text.is_empty() {
                    return Ok(());
                }
                outbound(text.to_string(), None)
            }
            MessageKind::File => {
                let Some(file) = &message.file else {
                    return Err(SwitchboardError::BadRequest(
                        "custom: file message without a file".into(),
                    ));
                };
                outbound(
                    message.text.trim().to_string(),
                    Some(WireFile {
                        url: file.url.clone(),
                        mime: file.mime.clone(),
                        size: file.size,
                        name: file.name.clone(),
                    }),
                )
            }
            MessageKind::Joined | MessageKind::Left => {
                let member = message.member.clone().unwrap_or_default();
                let text = if message.kind == MessageKind::Joined {
                    self.templates.join_text(&member)
                } else {
                    self.templates.left_text(&member)
                };
                let Some(text) = text else {
                    return Ok(());
                };
                outbound(text, None)
            }
            MessageKind::Closed => {
                if let Some(text) = self.templates.close_text() {
                    self.post(&outbound(text, None)).await?;
                }
                self.shared.contacts.remove(&chat_key);
                if self.shared.close_queue.remove(&chat_key).is_some() {
                    debug!(chat_id = %chat_key, "close came from the customer, not echoed");
                    return Ok(());
                }
                OutboundEvent::Close(CloseEvent {
                    chat_id: chat_id.clone(),
                })
            }
        };
        self.post(&event).await
    }

    async fn webhook(&self, gateway: &Arc<Gateway>, request: WebhookRequest) -> Option<Response> {
        if request.method != Method::POST {
            return Some(StatusCode::METHOD_NOT_ALLOWED.into_response());
        }

        let signed = request
            .header(SIGN_HEADER)
            .is_some_and(|sig| verify(&request.body, &self.secret, sig));
        if !signed {
            warn!(
                profile_id = self.profile_id,
                uri = %request.uri,
                "custom webhook signature rejected"
            );
            return Some(StatusCode::FORBIDDEN.into_response());
        }

        let event = match serde_json::from_slice::<InboundEvent>(&request.body) {
            Ok(event) => event,
            Err(e) => return Some(reply(StatusCode::BAD_REQUEST, Reply::error(e))),
        };
        let response = match event.into_single() {
            Ok(Inbound::Message(message)) => self.on_message(gateway, message).await,
            Ok(Inbound::Close(close)) => self.on_close(gateway, close).await,
            Ok(Inbound::Broadcast(report)) => self.on_broadcast(report),
            Err(reason) => reply(StatusCode::BAD_REQUEST, Reply::error(reason)),
        };
        Some(response)
    }

    async fn register(&self, callback_url: &str) -> Result<(), SwitchboardError> {
        debug!(callback_url, "custom webhook is pre-shared, nothing to register");
        Ok(())
    }

    async fn deregister(&self) -> Result<(), SwitchboardError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), SwitchboardError> {
        Ok(())
    }

    async fn broadcast(&self, request: Broadcast) -> Result<BroadcastOutcome, SwitchboardError> {
        let mut recipients = Vec::with_capacity(request.peers.len());
        for raw in &request.peers {
            match Peer::parse(raw) {
                Some(peer) => recipients.push(Receiver {
                    id: peer.id,
                    kind: peer.kind,
                    error: String::new(),
                }),
                None => warn!(peer = %raw, "broadcast peer skipped"),
            }
        }
        if recipients.is_empty() {
            return Err(SwitchboardError::BadRequest(
                "chat.bot.custom.broadcast.peers.required: no valid peers".into(),
            ));
        }

        let event_id = uuid::Uuid::new_v4().to_string();
        let pending = self.shared.broadcasts.register(event_id.clone());
        let event = OutboundEvent::Broadcast(OutboundBroadcast {
            event_id: event_id.clone(),
            recipients,
            text: request.message.text.clone(),
            metadata: request.message.variables.clone(),
        });
        self.post(&event).await?;
        debug!(event_id, timeout = ?request.timeout, "broadcast sent, awaiting report");
        Ok(pending.wait(request.timeout).await)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn profile(metadata: &[(&str, &str)]) -> BotProfile {
        BotProfile {
            id: 3,
            uri: "/custom".into(),
            provider: PROVIDER.into(),
            metadata: metadata
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            ..Default::default()
        }
    }

    #[test]
    fn metadata_is_required() {
        let err = CustomProvider::new(&profile(&[("webhook", "https://example.com/hook")]), None)
            .unwrap_err();
        assert!(err.to_string().contains("secret required"), "{err}");

        let err = CustomProvider::new(&profile(&[("secret", "s")]), None).unwrap_err();
        assert!(err.to_string().contains("webhook required"), "{err}");

        let err = CustomProvider::new(&profile(&[("secret", "s"), ("webhook", "ftp://x/y")]), None)
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn caches_carry_over_to_successor() {
        let meta = [("secret", "s"), ("webhook", "https://example.com/hook")];
        let first = Arc::new(CustomProvider::new(&profile(&meta), None).unwrap());
        first.shared.contacts.insert(
            "c1".into(),
            Account {
                contact: "u1".into(),
                ..Default::default()
            },
        );

        let previous: Arc<dyn Provider> = first.clone();
        let second = CustomProvider::new(&profile(&meta), Some(previous)).unwrap();
        assert_eq!(second.contacts(), 1);
        assert!(Arc::ptr_eq(&first.shared, &second.shared));
    }

    #[test]
    fn typed_chat_ids_lose_their_prefix() {
        assert_eq!(outbound_chat_id("telegram|42"), "42");
        assert_eq!(outbound_chat_id("42"), "42");
        assert_eq!(outbound_chat_id("a|b|c"), "a|b|c");
    }
}
