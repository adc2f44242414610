// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `./switchboard.toml` > `~/.config/switchboard/switchboard.toml`
//! > `/etc/switchboard/switchboard.toml`, with `SWITCHBOARD_` environment
//! variables on top.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::SwitchboardConfig;

const SYSTEM_CONFIG: &str = "/etc/switchboard/switchboard.toml";
const LOCAL_CONFIG: &str = "switchboard.toml";

/// Top-level tables an environment variable can address.
const SECTIONS: &[&str] = &["server", "rpc", "engine", "startup", "log", "prometheus"];

/// Config files consulted by [`load_config`], lowest precedence first.
pub fn config_files() -> Vec<PathBuf> {
    let mut files = vec![PathBuf::from(SYSTEM_CONFIG)];
    if let Some(dir) = dirs::config_dir() {
        files.push(dir.join("switchboard").join(LOCAL_CONFIG));
    }
    files.push(PathBuf::from(LOCAL_CONFIG));
    files
}

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/switchboard/switchboard.toml`
/// 3. `~/.config/switchboard/switchboard.toml`
/// 4. `./switchboard.toml`
/// 5. `SWITCHBOARD_*` environment variables
pub fn load_config() -> Result<SwitchboardConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only. No files, no environment.
pub fn load_config_from_str(toml_content: &str) -> Result<SwitchboardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SwitchboardConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from one file, replacing the hierarchy, with env
/// var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SwitchboardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SwitchboardConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment behind [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    config_files()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(SwitchboardConfig::default())),
            |figment, file| figment.merge(Toml::file(file)),
        )
        .merge(env_provider())
}

/// `SWITCHBOARD_RPC_BEARER_TOKEN` maps to `rpc.bearer_token`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// keys that contain underscores survive intact.
fn env_provider() -> Env {
    Env::prefixed("SWITCHBOARD_").map(|key| {
        let key = key.as_str().to_ascii_lowercase();
        let mapped = match key.split_once('_') {
            Some((section, rest)) if SECTIONS.contains(&section) => format!("{section}.{rest}"),
            _ => key.clone(),
        };
        mapped.into()
    })
}
