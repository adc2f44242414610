// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Switchboard - multi-tenant chat gateway.
//!
//! Binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use switchboard_config::{ConfigError, SwitchboardConfig};

/// Switchboard - multi-tenant chat gateway.
#[derive(Parser, Debug)]
#[command(name = "switchboard", version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of the standard lookup hierarchy.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook and RPC listeners.
    Serve,
    /// Validate the configuration and exit.
    CheckConfig,
}

fn load(path: Option<&PathBuf>) -> Result<SwitchboardConfig, Vec<ConfigError>> {
    match path {
        Some(path) => switchboard_config::load_and_validate_path(path),
        None => switchboard_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            switchboard_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Some(Commands::Serve) => match switchboard::run_serve(config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("switchboard: {e}");
                ExitCode::FAILURE
            }
        },
        Some(Commands::CheckConfig) => {
            println!(
                "switchboard: config ok ({} bots, {} engine hosts)",
                config.bots.len(),
                config.engine.hosts.len()
            );
            ExitCode::SUCCESS
        }
        None => {
            println!("switchboard: use --help for available commands");
            ExitCode::SUCCESS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_parses_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["switchboard", "serve", "--config", "/tmp/s.toml"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Serve)));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/s.toml")));
    }

    #[test]
    fn check_config_subcommand_name() {
        let cli = Cli::try_parse_from(["switchboard", "check-config"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::CheckConfig)));
    }
}
