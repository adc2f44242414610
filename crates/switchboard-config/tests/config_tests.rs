// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Switchboard configuration system.

use std::io::Write;

use serial_test::serial;

use switchboard_config::diagnostic::ConfigError;
use switchboard_config::model::SwitchboardConfig;
use switchboard_config::{
    load_and_validate_path, load_and_validate_str, load_config_from_path, load_config_from_str,
};

const FULL: &str = r#"
[server]
bind = "0.0.0.0:8080"
site_url = "https://bots.example.com"
web_root = "/srv/switchboard/www"

[rpc]
bind = "127.0.0.1:8081"
bearer_token = "rpc-secret"

[engine]
hosts = ["http://engine-1:10031", "http://engine-2:10031"]
timeout_secs = 5

[startup]
providers = ["custom"]

[log]
level = "debug"

[prometheus]
enabled = false

[[bots]]
id = 1
domain_id = 1
uri = "/support"
name = "Support"
flow_id = 10
enabled = true
provider = "custom"

[bots.metadata]
secret = "s3cret"
webhook = "https://customer.example.com/hook"

[bots.updates]
close = "Bye, {name}"
"#;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

// ---- Parsing ----

#[test]
fn test_full_config_deserializes() {
    let config = load_and_validate_str(FULL).expect("valid config");

    assert_eq!(config.server.bind, "0.0.0.0:8080");
    assert_eq!(config.server.site_url, "https://bots.example.com");
    assert_eq!(config.server.web_root.as_deref(), Some("/srv/switchboard/www"));
    assert_eq!(config.rpc.bearer_token.as_deref(), Some("rpc-secret"));
    assert_eq!(config.engine.hosts.len(), 2);
    assert_eq!(config.engine.timeout_secs, 5);
    assert_eq!(config.startup.providers, vec!["custom"]);
    assert_eq!(config.log.level, "debug");
    assert!(!config.prometheus.enabled);

    let bot = &config.bots[0];
    assert_eq!(bot.id, 1);
    assert_eq!(bot.provider, "custom");
    assert_eq!(bot.meta("secret"), Some("s3cret"));
    assert_eq!(bot.updates.close.as_deref(), Some("Bye, {name}"));
}

#[test]
fn test_empty_config_uses_defaults() {
    let config = load_config_from_str("").expect("defaults");
    let defaults = SwitchboardConfig::default();

    assert_eq!(config.server.bind, defaults.server.bind);
    assert_eq!(config.server.site_url, "http://localhost:10128");
    assert_eq!(config.rpc.bind, "127.0.0.1:10129");
    assert!(config.rpc.bearer_token.is_none());
    assert!(config.engine.hosts.is_empty());
    assert_eq!(config.engine.timeout_secs, 15);
    assert!(config.startup.providers.is_empty());
    assert_eq!(config.log.level, "info");
    assert!(config.prometheus.enabled);
    assert!(config.bots.is_empty());
}

#[test]
fn test_unknown_key_gets_suggestion() {
    let toml = "[server]\nsite_ulr = \"https://x\"\n";
    let errors = load_and_validate_str(toml).unwrap_err();

    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key,
            suggestion,
            span,
            ..
        } => {
            assert_eq!(key, "site_ulr");
            assert_eq!(suggestion.as_deref(), Some("site_url"));
            assert!(span.is_some());
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn test_unknown_bot_key_is_rejected() {
    let toml = r#"
[[bots]]
id = 1
uri = "/a"
provider = "custom"
secret = "misplaced"
"#;
    let err = load_config_from_str(toml).expect_err("bots deny unknown fields");
    assert!(err.to_string().contains("secret"), "{err}");
}

#[test]
fn test_bot_without_provider_is_missing_key() {
    let toml = "[[bots]]\nid = 1\nuri = \"/a\"\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::MissingKey { key } if key.ends_with("provider"))),
        "{errors:?}"
    );
}

#[test]
fn test_wrong_type_is_reported() {
    let toml = "[engine]\nhosts = [\"http://e\"]\ntimeout_secs = \"soon\"\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(matches!(&errors[0], ConfigError::InvalidType { key, .. } if key.ends_with("timeout_secs")));
}

// ---- Validation ----

#[test]
fn test_validation_collects_every_error() {
    let toml = r#"
[server]
bind = "not-an-address"
site_url = "bots.example.com"

[engine]
hosts = []

[log]
level = "loud"

[[bots]]
id = 1
uri = "/a"
provider = "custom"

[[bots]]
id = 1
uri = "a"
provider = ""
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();

    for needle in [
        "server.bind",
        "server.site_url",
        "engine.hosts",
        "log.level",
        "duplicate bot id 1",
        "duplicate bot uri `/a`",
        "bots[1].provider",
    ] {
        assert!(
            messages.iter().any(|m| m.contains(needle)),
            "missing `{needle}` in {messages:#?}"
        );
    }
    assert_eq!(errors.len(), 7);
}

#[test]
fn test_blank_bearer_token_is_rejected() {
    let toml = "[rpc]\nbearer_token = \"  \"\n[engine]\nhosts = [\"http://e:1\"]\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(errors[0].to_string().contains("rpc.bearer_token"));
}

// ---- Files and environment ----

#[test]
#[serial]
fn test_path_config_is_loaded() {
    let file = write_config(FULL);
    let config = load_and_validate_path(file.path()).expect("valid file");
    assert_eq!(config.bots.len(), 1);
    assert_eq!(config.engine.hosts[0], "http://engine-1:10031");
}

#[test]
#[serial]
fn test_env_overrides_file() {
    let file = write_config(FULL);
    // SAFETY: serialized with every other env-reading test.
    unsafe {
        std::env::set_var("SWITCHBOARD_RPC_BEARER_TOKEN", "from-env");
        std::env::set_var("SWITCHBOARD_SERVER_SITE_URL", "https://env.example.com");
        std::env::set_var("SWITCHBOARD_ENGINE_TIMEOUT_SECS", "30");
    }

    let config = load_config_from_path(file.path());

    unsafe {
        std::env::remove_var("SWITCHBOARD_RPC_BEARER_TOKEN");
        std::env::remove_var("SWITCHBOARD_SERVER_SITE_URL");
        std::env::remove_var("SWITCHBOARD_ENGINE_TIMEOUT_SECS");
    }

    let config = config.expect("env merges");
    assert_eq!(config.rpc.bearer_token.as_deref(), Some("from-env"));
    assert_eq!(config.server.site_url, "https://env.example.com");
    assert_eq!(config.engine.timeout_secs, 30);
    // Untouched keys keep their file values.
    assert_eq!(config.rpc.bind, "127.0.0.1:8081");
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    let config = load_config_from_path(std::path::Path::new("/nonexistent/switchboard.toml"))
        .expect("missing file is skipped");
    assert_eq!(config.log.level, "info");
}
