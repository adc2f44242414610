// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON events exchanged with the customer webhook.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Inbound event; exactly one member is set.
#[derive(Debug, Default, Deserialize)]
pub struct InboundEvent {
    #[serde(default)]
    pub message: Option<InboundMessage>,
    #[serde(default)]
    pub close: Option<CloseEvent>,
    #[serde(default)]
    pub broadcast: Option<BroadcastReport>,
}

pub enum Inbound {
    Message(InboundMessage),
    Close(CloseEvent),
    Broadcast(BroadcastReport),
}

impl InboundEvent {
    pub fn into_single(self) -> Result<Inbound, &'static str> {
        match (self.message, self.close, self.broadcast) {
            (Some(message), None, None) => Ok(Inbound::Message(message)),
            (None, Some(close), None) => Ok(Inbound::Close(close)),
            (None, None, Some(report)) => Ok(Inbound::Broadcast(report)),
            (None, None, None) => Err("no valid payload"),
            _ => Err("more than one event in payload"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sender {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub nickname: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireFile {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub mime: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub chat_id: String,
    #[serde(default)]
    pub sender: Option<Sender>,
    /// Unix seconds.
    #[serde(default)]
    pub date: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub file: Option<WireFile>,
    /// Start variables, applied to the first message of a chat only.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl InboundMessage {
    /// Checks required fields; returns the sender.
    pub fn validate(&self) -> Result<&Sender, &'static str> {
        let Some(sender) = &self.sender else {
            return Err("sender is empty");
        };
        if sender.id.trim().is_empty() {
            return Err("sender id is empty");
        }
        if self.chat_id.trim().is_empty() {
            return Err("chat id is empty");
        }
        if self.text.trim().is_empty() && self.file.is_none() {
            return Err("message with no payload");
        }
        Ok(sender)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseEvent {
    #[serde(default)]
    pub chat_id: String,
}

/// One broadcast recipient, also used for failure reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receiver {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl Receiver {
    /// `type|id`, or bare `id` when untyped.
    pub fn peer(&self) -> String {
        if self.kind.is_empty() {
            self.id.clone()
        } else {
            format!("{}|{}", self.kind, self.id)
        }
    }
}

/// Delivery report for an earlier broadcast.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastReport {
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub failed_receivers: Vec<Receiver>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    pub chat_id: String,
    /// Unix seconds.
    pub date: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<WireFile>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundBroadcast {
    pub event_id: String,
    pub recipients: Vec<Receiver>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// Outbound event, encoded as `{"message": ...}`, `{"close": ...}` or
/// `{"broadcast": ...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboundEvent {
    Message(OutboundMessage),
    Close(CloseEvent),
    Broadcast(OutboundBroadcast),
}

/// Webhook reply body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reply {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn error(message: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            error: Some(format!("custom: {message}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outbound_events_are_externally_tagged() {
        let close = OutboundEvent::Close(CloseEvent {
            chat_id: "42".into(),
        });
        assert_eq!(
            serde_json::to_value(&close).unwrap(),
            json!({"close": {"chatId": "42"}})
        );

        let message = OutboundEvent::Message(OutboundMessage {
            chat_id: "42".into(),
            date: 1_700_000_000,
            text: "hi".into(),
            file: None,
        });
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"message": {"chatId": "42", "date": 1_700_000_000, "text": "hi"}})
        );
    }

    #[test]
    fn inbound_event_must_carry_exactly_one_member() {
        let event: InboundEvent = serde_json::from_value(json!({})).unwrap();
        assert!(event.into_single().is_err());

        let event: InboundEvent = serde_json::from_value(json!({
            "close": {"chatId": "1"},
            "broadcast": {"eventId": "e"}
        }))
        .unwrap();
        assert!(event.into_single().is_err());

        let event: InboundEvent =
            serde_json::from_value(json!({"close": {"chatId": "1"}})).unwrap();
        assert!(matches!(event.into_single(), Ok(Inbound::Close(c)) if c.chat_id == "1"));
    }

    #[test]
    fn message_validation() {
        let mut message: InboundMessage = serde_json::from_value(json!({
            "chatId": "c1",
            "sender": {"id": "u1", "type": "telegram", "name": "Ann"},
            "text": "hello"
        }))
        .unwrap();
        assert_eq!(message.validate().unwrap().kind, "telegram");

        message.text = "  ".into();
        assert_eq!(message.validate().unwrap_err(), "message with no payload");

        message.sender = None;
        assert_eq!(message.validate().unwrap_err(), "sender is empty");
    }

    #[test]
    fn receiver_peer_encoding() {
        let typed = Receiver {
            id: "7".into(),
            kind: "viber".into(),
            error: String::new(),
        };
        assert_eq!(typed.peer(), "viber|7");
        assert_eq!(
            Receiver {
                id: "7".into(),
                ..Default::default()
            }
            .peer(),
            "7"
        );
    }

    #[test]
    fn reply_shapes() {
        assert_eq!(serde_json::to_value(Reply::ok()).unwrap(), json!({"success": true}));
        assert_eq!(
            serde_json::to_value(Reply::error("chat id is empty")).unwrap(),
            json!({"success": false, "error": "custom: chat id is empty"})
        );
    }
}
