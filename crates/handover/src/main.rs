// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handover - conversation handoff engine for multi-channel customer
//! messaging.
//!
//! This is the binary entry point for the Handover engine.

use clap::{Parser, Subcommand};

mod dispatch;
mod serve;

/// Handover - conversation handoff engine.
#[derive(Parser, Debug)]
#[command(name = "handover", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook gateway and dispatch loop.
    Serve,
    /// Print the resolved configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup.
    let config = match handover_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            handover_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("handover serve: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => {
            print_config(config);
        }
        None => {
            println!("handover: use --help for available commands");
        }
    }
}

/// Print the resolved configuration as TOML, with secrets blanked.
fn print_config(mut config: handover_config::HandoverConfig) {
    config.gateway.bearer_token = config.gateway.bearer_token.map(|_| "[redacted]".to_string());
    config.business.app_secret = config.business.app_secret.map(|_| "[redacted]".to_string());
    config.social.app_secret = config.social.app_secret.map(|_| "[redacted]".to_string());
    match toml::to_string_pretty(&config) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => eprintln!("handover config: failed to render: {e}"),
    }
}
