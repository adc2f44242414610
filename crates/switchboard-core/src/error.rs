// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Switchboard gateway runtime.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type shared by the gateway runtime, provider plugins
/// and the collaborator traits.
#[derive(Debug, Error)]
pub enum SwitchboardError {
    /// Malformed profile or process configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller supplied an invalid request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The profile names a provider type that was never registered.
    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    /// A provider plugin rejected its profile metadata at construction.
    #[error("chat.bot.{provider}.setup.error: {message}")]
    ProviderSetup { provider: String, message: String },

    /// Unknown profile id or webhook path.
    #[error("not found: {0}")]
    NotFound(String),

    /// The bot is disabled and there is no session to recover.
    #[error("chat.bot.channel.disabled: {0}")]
    Disabled(String),

    /// External messaging platform call failed.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<BoxError>,
    },

    /// Internal engine RPC failed.
    #[error("engine error: {message}")]
    Engine {
        message: String,
        status: Option<u16>,
        source: Option<BoxError>,
    },

    /// The engine refused an attached file.
    #[error("this type of file is not allowed to upload")]
    FilePolicy,

    /// Profile or contact store failure.
    #[error("storage error: {source}")]
    Storage { source: BoxError },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal consistency violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SwitchboardError {
    /// Provider failure without an underlying cause.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Provider failure wrapping the transport error.
    pub fn provider_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Provider {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn engine(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Engine {
            message: message.into(),
            status,
            source: None,
        }
    }

    pub fn storage(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage {
            source: Box::new(source),
        }
    }

    /// HTTP status used when this error reaches a transport boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Config(_)
            | Self::BadRequest(_)
            | Self::ProviderNotFound(_)
            | Self::ProviderSetup { .. }
            | Self::FilePolicy => 400,
            Self::NotFound(_) => 404,
            Self::Disabled(_) | Self::Engine { .. } | Self::Provider { .. } => 502,
            Self::Timeout { .. } => 504,
            Self::Storage { .. } | Self::Internal(_) => 500,
        }
    }

    /// True for errors a webhook caller caused (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(SwitchboardError::BadRequest("x".into()).status_code(), 400);
        assert_eq!(
            SwitchboardError::ProviderSetup {
                provider: "custom".into(),
                message: "secret required".into()
            }
            .status_code(),
            400
        );
        assert_eq!(SwitchboardError::NotFound("x".into()).status_code(), 404);
        assert_eq!(SwitchboardError::Disabled("x".into()).status_code(), 502);
        assert_eq!(SwitchboardError::engine("down", Some(503)).status_code(), 502);
        assert_eq!(SwitchboardError::Internal("x".into()).status_code(), 500);
        assert_eq!(
            SwitchboardError::Timeout {
                duration: std::time::Duration::from_secs(1)
            }
            .status_code(),
            504
        );
    }

    #[test]
    fn setup_error_carries_provider_code() {
        let err = SwitchboardError::ProviderSetup {
            provider: "infobip_whatsapp".into(),
            message: "api_key required".into(),
        };
        assert_eq!(
            err.to_string(),
            "chat.bot.infobip_whatsapp.setup.error: api_key required"
        );
        assert!(err.is_client_error());
    }
}
