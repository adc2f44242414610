// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the gateway runtime and provider plugins.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Text an external user sends to end the conversation.
pub const CLOSE_COMMAND: &str = "/close";

/// Text the engine sends when it ends the conversation.
pub const CLOSED_NOTICE: &str = "Conversation closed";

/// Fallback display name for contacts without any name parts.
pub const NONAME: &str = "noname";

/// Channel type tag of WhatsApp contacts; the only one allowed to change chat id.
pub const WHATSAPP: &str = "whatsapp";

/// Channel property holding the external chat id used to recover a channel
/// after restart.
pub const EXTERNAL_CHAT_PROPERTY: &str = "externalChatID";

/// External contact description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Internal contact id; zero until resolved by the engine.
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub username: String,
    /// Channel type tag (provider family), e.g. `whatsapp`, `custom`.
    #[serde(default)]
    pub channel: String,
    /// External contact id.
    #[serde(default)]
    pub contact: String,
}

impl Account {
    pub fn is_bot(&self) -> bool {
        self.channel == "bot"
    }

    pub fn is_user(&self) -> bool {
        self.channel == "user"
    }

    /// First, last and user name joined by a space, skipping empty and
    /// case-insensitive duplicate parts. Defaults to [`NONAME`].
    pub fn display_name(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(3);
        for part in [&self.first_name, &self.last_name, &self.username] {
            let part = part.trim();
            if part.is_empty() || parts.iter().any(|seen| seen.eq_ignore_ascii_case(part)) {
                continue;
            }
            parts.push(part);
        }
        if parts.is_empty() {
            NONAME.to_string()
        } else {
            parts.join(" ")
        }
    }
}

/// Kind of a conversation message.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    File,
    Joined,
    Left,
    Closed,
}

/// File attachment reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub mime: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub name: String,
}

/// One message in the internal conversation protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: i64,
    #[serde(default, rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<File>,
    /// Bindings forwarded to the workflow.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub variables: HashMap<String, String>,
    /// Member that joined or left, for [`MessageKind::Joined`] / [`MessageKind::Left`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<Account>,
    /// Unix millis.
    #[serde(default)]
    pub created_at: i64,
    /// Unix millis; non-zero for an edited message.
    #[serde(default)]
    pub updated_at: i64,
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Text,
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn is_edited(&self) -> bool {
        self.updated_at != 0
    }
}

/// Optional notification texts a provider sends for conversation updates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTemplates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<String>,
}

impl UpdateTemplates {
    /// Renders a join notice for `member`; `None` when no template is set.
    pub fn join_text(&self, member: &Account) -> Option<String> {
        render(self.join.as_deref()?, Some(member))
    }

    pub fn left_text(&self, member: &Account) -> Option<String> {
        render(self.left.as_deref()?, Some(member))
    }

    pub fn close_text(&self) -> Option<String> {
        render(self.close.as_deref()?, None)
    }
}

/// Substitutes `{name}`, `{first_name}`, `{last_name}` and `{username}`.
/// Blank results count as no text.
fn render(template: &str, peer: Option<&Account>) -> Option<String> {
    let mut text = template.to_string();
    if let Some(peer) = peer {
        text = text
            .replace("{name}", &peer.display_name())
            .replace("{first_name}", &peer.first_name)
            .replace("{last_name}", &peer.last_name)
            .replace("{username}", &peer.username);
    }
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Persisted binding of one tenant to one external messaging provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BotProfile {
    #[serde(default)]
    pub id: i64,
    /// Owning tenant.
    #[serde(default)]
    pub domain_id: i64,
    /// Relative webhook path.
    pub uri: String,
    #[serde(default)]
    pub name: String,
    /// Target workflow schema.
    #[serde(default)]
    pub flow_id: i64,
    #[serde(default)]
    pub enabled: bool,
    /// Provider type name, e.g. `custom`.
    pub provider: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub updates: UpdateTemplates,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub created_by: i64,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default)]
    pub updated_by: i64,
}

impl BotProfile {
    /// Metadata value, trimmed; `None` when missing or blank.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Current time as Unix millis.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
