// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp delivery through the Infobip OMNI "advanced" endpoint.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use switchboard_bot::{
    Broadcast, BroadcastOutcome, FailedPeer, Gateway, Peer, Provider, Update, WebhookRequest,
};
use switchboard_core::{Account, BotProfile, Message, MessageKind, SwitchboardError, UpdateTemplates};

use crate::model::{CreateScenario, InboundBody, ScenarioCreated, SendRequest, WhatsAppContent};
use crate::PROVIDER;

const MESSAGE_ROUTE: &str = "omni/1/advanced";
const SCENARIO_ROUTE: &str = "omni/1/scenarios";

pub struct InfobipProvider {
    profile_id: i64,
    api_key: String,
    /// Configured, or created from `number` on first delivery.
    scenario_key: Arc<OnceCell<String>>,
    number: String,
    endpoint: reqwest::Url,
    scenarios: reqwest::Url,
    templates: UpdateTemplates,
    client: reqwest::Client,
}

impl std::fmt::Debug for InfobipProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfobipProvider")
            .field("profile_id", &self.profile_id)
            .field("number", &self.number)
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"[redacted]")
            .finish_non_exhaustive()
    }
}

fn setup_error(message: impl Into<String>) -> SwitchboardError {
    SwitchboardError::ProviderSetup {
        provider: PROVIDER.to_string(),
        message: message.into(),
    }
}

fn required<'a>(profile: &'a BotProfile, key: &str) -> Result<&'a str, SwitchboardError> {
    profile
        .meta(key)
        .ok_or_else(|| setup_error(format!("infobip: bot API {key} required")))
}

impl InfobipProvider {
    /// Builds the provider from profile metadata (`api_key`, `number`,
    /// `url` and optionally `scenario_key`).
    ///
    /// Without a `scenario_key` a scenario created earlier by `previous`
    /// for the same account and number is kept.
    pub fn new(
        profile: &BotProfile,
        previous: Option<Arc<dyn Provider>>,
    ) -> Result<Self, SwitchboardError> {
        let api_key = required(profile, "api_key")?.to_string();
        let number = required(profile, "number")?.to_string();
        let base = required(profile, "url")?;

        let route = |path: &str| {
            reqwest::Url::parse(&format!("{}/{path}", base.trim_end_matches('/')))
                .map_err(|e| setup_error(format!("infobip: url `{base}`: {e}")))
        };
        let endpoint = route(MESSAGE_ROUTE)?;
        let scenarios = route(SCENARIO_ROUTE)?;

        let scenario_key = match profile.meta("scenario_key") {
            Some(key) => Arc::new(OnceCell::new_with(Some(key.to_string()))),
            None => previous
                .as_deref()
                .and_then(|p| p.as_any().downcast_ref::<InfobipProvider>())
                .filter(|p| p.api_key == api_key && p.number == number && p.scenarios == scenarios)
                .map(|p| p.scenario_key.clone())
                .unwrap_or_default(),
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| setup_error(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            profile_id: profile.id,
            api_key,
            scenario_key,
            number,
            endpoint,
            scenarios,
            templates: profile.updates.clone(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    /// WhatsApp payload for an outbound message; `None` when there is
    /// nothing to deliver.
    fn content(&self, message: &Message) -> Result<Option<WhatsAppContent>, SwitchboardError> {
        let content = match message.kind {
            MessageKind::Text | MessageKind::Closed => {
                let text = message.text.trim();
                (!text.is_empty()).then(|| WhatsAppContent::text(text))
            }
            MessageKind::File => {
                let file = message.file.as_ref().ok_or_else(|| {
                    SwitchboardError::BadRequest("infobip: file message without a file".into())
                })?;
                Some(WhatsAppContent::file(file))
            }
            MessageKind::Joined => {
                let member = message.member.clone().unwrap_or_default();
                self.templates.join_text(&member).map(WhatsAppContent::text)
            }
            MessageKind::Left => {
                let member = message.member.clone().unwrap_or_default();
                self.templates.left_text(&member).map(WhatsAppContent::text)
            }
        };
        Ok(content)
    }

    /// The scenario messages are sent under, creating it on first use.
    pub async fn scenario_key(&self) -> Result<&str, SwitchboardError> {
        self.scenario_key
            .get_or_try_init(|| self.create_scenario())
            .await
            .map(String::as_str)
    }

    async fn create_scenario(&self) -> Result<String, SwitchboardError> {
        let response = self
            .client
            .post(self.scenarios.clone())
            .header("authorization", format!("App {}", self.api_key))
            .json(&CreateScenario::whatsapp(&self.number))
            .send()
            .await
            .map_err(|e| SwitchboardError::provider_with(format!("infobip: POST {}", self.scenarios), e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SwitchboardError::provider(format!(
                "infobip: scenario create returned {status}: {text}"
            )));
        }
        let created: ScenarioCreated = response
            .json()
            .await
            .map_err(|e| SwitchboardError::provider_with("infobip: scenario create response", e))?;
        if created.key.is_empty() {
            return Err(SwitchboardError::provider("infobip: scenario create returned no key"));
        }
        info!(
            profile_id = self.profile_id,
            number = %self.number,
            scenario_key = %created.key,
            "infobip scenario created; set it as scenario_key to reuse it"
        );
        Ok(created.key)
    }

    async fn deliver(&self, phone: &str, content: WhatsAppContent) -> Result<(), SwitchboardError> {
        let request = SendRequest::to(self.scenario_key().await?, phone, content);
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("authorization", format!("App {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| SwitchboardError::provider_with(format!("infobip: POST {}", self.endpoint), e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SwitchboardError::provider(format!(
                "infobip: send returned {status}: {text}"
            )));
        }
        debug!(profile_id = self.profile_id, phone, "whatsapp message sent");
        Ok(())
    }
}

fn error_response(e: &SwitchboardError) -> Response {
    let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
    (status, e.to_string()).into_response()
}

#[async_trait]
impl Provider for InfobipProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn send_notify(&self, update: &Update) -> Result<(), SwitchboardError> {
        let Some(content) = self.content(&update.message)? else {
            return Ok(());
        };
        self.deliver(&update.chat.chat_id(), content).await
    }

    async fn webhook(&self, gateway: &Arc<Gateway>, request: WebhookRequest) -> Option<Response> {
        if request.method != Method::POST {
            return Some(StatusCode::METHOD_NOT_ALLOWED.into_response());
        }
        let body: InboundBody = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(e) => {
                warn!(profile_id = self.profile_id, error = %e, "infobip callback undecodable");
                return Some((StatusCode::BAD_REQUEST, e.to_string()).into_response());
            }
        };

        for result in body.results {
            if result.from.is_empty() {
                continue;
            }
            let Some(mut message) = result.message.to_message() else {
                debug!(kind = %result.message.kind, from = %result.from, "whatsapp message type not relayed");
                continue;
            };
            let account = Account {
                username: result.contact.map(|c| c.name).unwrap_or_default(),
                channel: PROVIDER.to_string(),
                contact: result.from.clone(),
                ..Default::default()
            };
            let channel = match gateway.get_channel(&result.from, Some(account)).await {
                Ok(channel) => channel,
                Err(e) => return Some(error_response(&e)),
            };
            if let Err(e) = gateway.read(&channel, &mut message).await {
                warn!(
                    profile_id = self.profile_id,
                    message_id = %result.message_id,
                    error = %e,
                    "whatsapp message not relayed"
                );
            }
        }
        None
    }

    async fn register(&self, callback_url: &str) -> Result<(), SwitchboardError> {
        info!(
            profile_id = self.profile_id,
            callback_url, "infobip webhook is configured in the portal"
        );
        Ok(())
    }

    async fn deregister(&self) -> Result<(), SwitchboardError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), SwitchboardError> {
        Ok(())
    }

    /// Sends to every peer in turn; the timeout does not apply since
    /// delivery is synchronous.
    async fn broadcast(&self, request: Broadcast) -> Result<BroadcastOutcome, SwitchboardError> {
        let content = self.content(&request.message)?.ok_or_else(|| {
            SwitchboardError::BadRequest("infobip: broadcast message is empty".into())
        })?;

        let mut outcome = BroadcastOutcome::default();
        for raw in &request.peers {
            let Some(peer) = Peer::parse(raw) else {
                outcome.failed.push(FailedPeer {
                    peer: raw.clone(),
                    error: "invalid peer".into(),
                });
                continue;
            };
            if let Err(e) = self.deliver(&peer.id, content.clone()).await {
                outcome.failed.push(FailedPeer {
                    peer: raw.clone(),
                    error: e.to_string(),
                });
            }
        }
        Ok(outcome)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
