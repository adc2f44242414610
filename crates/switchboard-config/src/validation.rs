// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::diagnostic::ConfigError;
use crate::model::SwitchboardConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every error instead of stopping at the first.
pub fn validate_config(config: &SwitchboardConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    check_bind("server.bind", &config.server.bind, &mut errors);
    check_bind("rpc.bind", &config.rpc.bind, &mut errors);

    if let Err(message) = check_http_url(&config.server.site_url) {
        errors.push(ConfigError::validation(format!(
            "server.site_url `{}` {message}",
            config.server.site_url
        )));
    }

    if let Some(root) = &config.server.web_root
        && root.trim().is_empty()
    {
        errors.push(ConfigError::validation(
            "server.web_root must not be empty when set",
        ));
    }

    if config
        .rpc
        .bearer_token
        .as_deref()
        .is_some_and(|t| t.trim().is_empty())
    {
        errors.push(ConfigError::validation(
            "rpc.bearer_token must not be blank; omit it to disable the API",
        ));
    }

    if config.engine.hosts.is_empty() {
        errors.push(ConfigError::validation(
            "engine.hosts must list at least one engine node",
        ));
    }
    for (i, host) in config.engine.hosts.iter().enumerate() {
        if let Err(message) = check_http_url(host) {
            errors.push(ConfigError::validation(format!(
                "engine.hosts[{i}] `{host}` {message}"
            )));
        }
    }
    if config.engine.timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "engine.timeout_secs must be greater than 0",
        ));
    }

    for (i, provider) in config.startup.providers.iter().enumerate() {
        if provider.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "startup.providers[{i}] must not be empty"
            )));
        }
    }

    if !LOG_LEVELS.contains(&config.log.level.to_ascii_lowercase().as_str()) {
        errors.push(ConfigError::validation(format!(
            "log.level `{}` must be one of: {}",
            config.log.level,
            LOG_LEVELS.join(", ")
        )));
    }

    validate_bots(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_bots(config: &SwitchboardConfig, errors: &mut Vec<ConfigError>) {
    let mut ids = HashSet::new();
    let mut uris = HashSet::new();

    for (i, bot) in config.bots.iter().enumerate() {
        if bot.id == 0 {
            errors.push(ConfigError::validation(format!(
                "bots[{i}].id must be non-zero"
            )));
        } else if !ids.insert(bot.id) {
            errors.push(ConfigError::validation(format!(
                "duplicate bot id {} in [[bots]] array",
                bot.id
            )));
        }

        let uri = bot.uri.trim();
        if uri.is_empty() {
            errors.push(ConfigError::validation(format!(
                "bots[{i}].uri must not be empty"
            )));
        } else {
            let path = format!("/{}", uri.trim_start_matches('/'));
            if !uris.insert(path.clone()) {
                errors.push(ConfigError::validation(format!(
                    "duplicate bot uri `{path}` in [[bots]] array"
                )));
            }
        }

        if bot.provider.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "bots[{i}].provider must not be empty"
            )));
        }
    }
}

fn check_bind(key: &str, value: &str, errors: &mut Vec<ConfigError>) {
    if value.trim().parse::<SocketAddr>().is_err() {
        errors.push(ConfigError::validation(format!(
            "{key} `{value}` is not a valid socket address (expected host:port)"
        )));
    }
}

fn check_http_url(value: &str) -> Result<(), &'static str> {
    let url = url::Url::parse(value.trim()).map_err(|_| "is not a valid URL")?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err("must use http or https");
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err("must include a host");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> SwitchboardConfig {
        let mut config = SwitchboardConfig::default();
        config.engine.hosts = vec!["http://engine-1:10031".into()];
        config
    }

    #[test]
    fn defaults_with_an_engine_host_are_valid() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn site_url_needs_http_scheme() {
        assert!(check_http_url("https://bots.example.com").is_ok());
        assert_eq!(check_http_url("ftp://x"), Err("must use http or https"));
        assert_eq!(check_http_url("bots.example.com"), Err("is not a valid URL"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = valid();
        config.engine.timeout_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("timeout_secs"));
    }
}
