// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Infobip OMNI request and callback bodies.

use serde::{Deserialize, Serialize};

use switchboard_core::{File, Message, MessageKind};

/// `POST /omni/1/advanced` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub scenario_key: String,
    pub destinations: Vec<Destination>,
    pub whats_app: WhatsAppContent,
}

impl SendRequest {
    pub fn to(scenario_key: &str, phone_number: &str, content: WhatsAppContent) -> Self {
        Self {
            scenario_key: scenario_key.to_string(),
            destinations: vec![Destination {
                to: NumberDestination {
                    phone_number: phone_number.to_string(),
                },
            }],
            whats_app: content,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Destination {
    pub to: NumberDestination,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberDestination {
    pub phone_number: String,
}

/// WhatsApp payload; exactly one media URL or plain text is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppContent {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub video_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub audio_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub file_url: String,
}

impl WhatsAppContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Picks the media field from the mime type. Anything that is not an
    /// image, video or audio goes out as a document named after the file.
    pub fn file(file: &File) -> Self {
        let url = file.url.clone();
        let mime = file.mime.to_ascii_lowercase();
        if mime.starts_with("image") {
            Self {
                image_url: url,
                ..Default::default()
            }
        } else if mime.starts_with("video") {
            Self {
                video_url: url,
                ..Default::default()
            }
        } else if mime.starts_with("audio") {
            Self {
                audio_url: url,
                ..Default::default()
            }
        } else {
            Self {
                file_url: url,
                text: file.name.clone(),
                ..Default::default()
            }
        }
    }
}

/// `POST /omni/1/scenarios` body: a default WhatsApp scenario sending
/// from the bot's number.
#[derive(Debug, Clone, Serialize)]
pub struct CreateScenario {
    pub name: String,
    pub flow: Vec<ScenarioStep>,
    pub default: bool,
}

impl CreateScenario {
    pub fn whatsapp(number: &str) -> Self {
        Self {
            name: number.to_string(),
            flow: vec![ScenarioStep {
                from: number.to_string(),
                channel: "WHATSAPP".to_string(),
            }],
            default: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioStep {
    pub from: String,
    pub channel: String,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioCreated {
    pub key: String,
}

/// Inbound callback with one or more received messages.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundBody {
    #[serde(default)]
    pub results: Vec<InboundResult>,
    #[serde(default)]
    pub message_count: i64,
    #[serde(default)]
    pub pending_message_count: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundResult {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub integration_type: String,
    #[serde(default)]
    pub received_at: String,
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub message: InboundContent,
    #[serde(default)]
    pub contact: Option<InboundContact>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundContent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub caption: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundContact {
    #[serde(default)]
    pub name: String,
}

impl InboundContent {
    /// Internal message for a relayed type; `None` for types that are not
    /// relayed (`CONTACT`, `LOCATION`, unknown).
    pub fn to_message(&self) -> Option<Message> {
        match self.kind.as_str() {
            "TEXT" => Some(Message::text(self.text.clone())),
            "IMAGE" | "VIDEO" | "DOCUMENT" | "AUDIO" | "VOICE" => Some(Message {
                kind: MessageKind::File,
                file: Some(File {
                    url: self.url.clone(),
                    name: self.caption.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            _ => None,
        }
    }
}
