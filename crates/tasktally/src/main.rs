// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tasktally - time tracking for completed tasks, relayed through a chat bot.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod check;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tasktally_config::{ConfigError, TasktallyConfig};

/// Tasktally - time tracking for completed tasks, relayed through a chat bot.
#[derive(Parser, Debug)]
#[command(name = "tasktally", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the default search path.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the webhook server, the relay loops and the chat bot.
    Serve,
    /// Load and validate configuration, then print the effective settings.
    CheckConfig,
}

fn load(path: Option<&PathBuf>) -> Result<TasktallyConfig, Vec<ConfigError>> {
    match path {
        Some(path) => tasktally_config::load_and_validate_path(path),
        None => tasktally_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            tasktally_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::CheckConfig) => {
            print!("{}", check::render_settings(&config));
        }
        None => {
            println!("tasktally: use --help for available commands");
        }
    }
}
