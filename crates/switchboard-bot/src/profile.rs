// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot profile validation before a gateway is built for it.

use switchboard_core::{BotProfile, SwitchboardError};

use crate::provider::ProviderRegistry;

/// Prefixes `/` if missing.
pub fn normalize_uri(uri: &str) -> String {
    let uri = uri.trim();
    if uri.starts_with('/') {
        uri.to_string()
    } else {
        format!("/{uri}")
    }
}

/// Checks a profile and normalizes its webhook path in place.
pub fn validate_profile(
    profile: &mut BotProfile,
    providers: &ProviderRegistry,
) -> Result<(), SwitchboardError> {
    if profile.uri.trim().is_empty() {
        return Err(SwitchboardError::BadRequest(
            "chat.bot.uri.required: webhook uri is required".into(),
        ));
    }
    let uri = normalize_uri(&profile.uri);
    if uri.contains("://") || uri.starts_with("//") {
        return Err(SwitchboardError::BadRequest(format!(
            "chat.bot.uri.invalid: `{uri}` must be a relative path"
        )));
    }
    if uri.contains(['?', '#']) {
        return Err(SwitchboardError::BadRequest(format!(
            "chat.bot.uri.invalid: `{uri}` must not carry a query or fragment"
        )));
    }
    if uri.split('/').any(|segment| segment == "..") {
        return Err(SwitchboardError::BadRequest(format!(
            "chat.bot.uri.invalid: `{uri}` must not traverse upwards"
        )));
    }
    profile.uri = uri;

    if profile.enabled && profile.flow_id == 0 {
        return Err(SwitchboardError::BadRequest(
            "chat.bot.flow.required: an enabled bot requires a flow".into(),
        ));
    }
    if profile.provider.trim().is_empty() {
        return Err(SwitchboardError::BadRequest(
            "chat.bot.provider.required: provider type is required".into(),
        ));
    }
    if !providers.contains(&profile.provider) {
        return Err(SwitchboardError::BadRequest(format!(
            "chat.bot.provider.unknown: `{}` is not one of {:?}",
            profile.provider,
            providers.names()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::provider::Provider;

    fn registry() -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry
            .register("custom", "test", |_, _| -> Result<Arc<dyn Provider>, _> {
                Err(SwitchboardError::Internal("unused".into()))
            })
            .unwrap();
        registry
    }

    fn profile(uri: &str) -> BotProfile {
        BotProfile {
            id: 7,
            uri: uri.into(),
            provider: "custom".into(),
            enabled: true,
            flow_id: 3,
            ..Default::default()
        }
    }

    #[test]
    fn uri_is_normalized() {
        let mut p = profile("support");
        validate_profile(&mut p, &registry()).unwrap();
        assert_eq!(p.uri, "/support");
    }

    #[test]
    fn absolute_or_decorated_uris_are_rejected() {
        for uri in ["https://evil.example/x", "//host/x", "/x?y=1", "/x#frag", "/a/../b", " "] {
            let mut p = profile(uri);
            let err = validate_profile(&mut p, &registry()).unwrap_err();
            assert_eq!(err.status_code(), 400, "{uri}");
        }
    }

    #[test]
    fn enabled_bot_needs_flow() {
        let mut p = profile("/a");
        p.flow_id = 0;
        assert!(validate_profile(&mut p, &registry()).is_err());
        p.enabled = false;
        assert!(validate_profile(&mut p, &registry()).is_ok());
    }

    #[test]
    fn provider_must_be_known() {
        let mut p = profile("/a");
        p.provider = "gotd".into();
        let err = validate_profile(&mut p, &registry()).unwrap_err();
        assert!(err.to_string().contains("provider.unknown"));
    }
}
