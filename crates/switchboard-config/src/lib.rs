// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Switchboard chat gateway.
//!
//! TOML parsing with strict key checking, a file hierarchy, environment
//! overrides and miette diagnostics with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use switchboard_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("webhooks on {}", config.server.bind);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{render_errors, ConfigError};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::SwitchboardConfig;

/// Load configuration from the file hierarchy and validate it.
pub fn load_and_validate() -> Result<SwitchboardConfig, Vec<ConfigError>> {
    match loader::load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = read_sources(loader::config_files().iter().map(|p| p.as_path()));
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Load configuration from one file (plus env overrides) and validate it.
pub fn load_and_validate_path(path: &Path) -> Result<SwitchboardConfig, Vec<ConfigError>> {
    match loader::load_config_from_path(path) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = read_sources(std::iter::once(path));
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<SwitchboardConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = vec![("<inline>".to_string(), toml_content.to_string())];
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// File contents for error span resolution, keyed the way figment
/// reports file sources.
fn read_sources<'a>(paths: impl Iterator<Item = &'a Path>) -> Vec<(String, String)> {
    paths
        .filter_map(|path| {
            let content = std::fs::read_to_string(path).ok()?;
            let absolute = if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir().ok()?.join(path)
            };
            Some((absolute.display().to_string(), content))
        })
        .collect()
}
