// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::{Parser, Subcommand};
use tracing::error;

use fleet_session::config::Config;

/// Session keep-alive and credential renewal for fleet devices.
#[derive(Debug, Parser)]
#[command(name = "fleet-session", version, about)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the keep-alive daemon and serve the local control API.
    Run,
    /// Make one scheduled attempt while the app is not running.
    ///
    /// Exits 0 on success, 75 when the scheduler should retry, 1 to give up.
    Offline {
        /// 1-based attempt number supplied by the scheduler.
        #[arg(long, default_value_t = 1)]
        attempt: u32,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    init_tracing(&cli.config);
    let _ = rustls::crypto::ring::default_provider().install_default();

    let code = match cli.command {
        Command::Run => match fleet_session::run(cli.config).await {
            Ok(()) => 0,
            Err(e) => {
                error!("fatal: {e:#}");
                1
            }
        },
        Command::Offline { attempt } => {
            match fleet_session::run_offline(cli.config, attempt).await {
                Ok(code) => code,
                Err(e) => {
                    error!("offline attempt failed: {e:#}");
                    fleet_session::offline::EXIT_RETRY
                }
            }
        }
    };
    std::process::exit(code);
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    match config.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).init();
        }
    }
}
