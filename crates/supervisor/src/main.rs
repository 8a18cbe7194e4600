// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `mcp-hot-reload` binary entry point.

use clap::Parser;

use mcp_hot_reload::cli::Cli;
use mcp_hot_reload::config::Config;
use mcp_hot_reload::error::SupervisorError;
use mcp_hot_reload::{logging, Supervisor};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::from_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("mcp-hot-reload: invalid configuration: {err}");
            std::process::exit(1);
        }
    };

    logging::init(config.json_logs, config.verbose);

    let supervisor = match Supervisor::new(config, tokio::io::stdout()) {
        Ok(supervisor) => supervisor,
        Err(err @ SupervisorError::RecursiveInvocation) => {
            tracing::error!(error = %err, "refusing to start");
            std::process::exit(1);
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to construct supervisor");
            std::process::exit(1);
        }
    };

    let exit_code = supervisor.run(tokio::io::stdin()).await;
    std::process::exit(exit_code);
}
