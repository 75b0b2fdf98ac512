// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet session: keeps an authenticated backend session alive and renews
//! its credentials before they expire.

pub mod config;
pub mod credential;
pub mod error;
pub mod offline;
pub mod session;
pub mod test_support;
pub mod transport;
pub mod upstream;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::credential::FileCredentialStore;
use crate::offline::OfflineOutcome;
use crate::session::controller::{Collaborators, SessionController};
use crate::session::SessionNotice;
use crate::transport::{build_router, AppState};
use crate::upstream::client::BackendClient;
use crate::upstream::CredentialStore;

/// Wire a controller to the file credential store and the backend client.
pub fn build_controller(
    config: &Config,
    shutdown: CancellationToken,
) -> anyhow::Result<Arc<SessionController>> {
    let backend_url = config
        .backend_url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("--backend-url must be specified"))?;
    let store: Arc<dyn CredentialStore> = Arc::new(FileCredentialStore::open(&config.credentials)?);
    let client = Arc::new(BackendClient::new(
        backend_url,
        config.endpoint_paths(),
        Arc::clone(&store),
        config.request_timeout(),
    ));
    let collaborators = Collaborators {
        store,
        headers: client.clone(),
        keep_alive: client.clone(),
        renewal: client,
    };
    Ok(SessionController::new(config.policy(), collaborators, shutdown))
}

/// Run the daemon: start the controller and serve the local API until a
/// termination signal arrives.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let controller = build_controller(&config, shutdown.clone())?;
    spawn_notice_logger(controller.subscribe_notices(), shutdown.clone());

    if !controller.start() {
        warn!("no stored credentials, waiting for POST /api/v1/session/start");
    }

    spawn_signal_handler(shutdown.clone());

    let state = Arc::new(AppState {
        controller: Arc::clone(&controller),
        auth_token: config.auth_token.clone(),
    });
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("fleet-session listening on {addr}");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await?;

    controller.stop();
    info!("fleet-session stopped");
    Ok(())
}

/// Run a single offline attempt and return the process exit code.
pub async fn run_offline(config: Config, attempt: u32) -> anyhow::Result<i32> {
    let controller = build_controller(&config, CancellationToken::new())?;
    let outcome: OfflineOutcome = offline::run_attempt(&controller, attempt).await;
    Ok(outcome.exit_code())
}

fn spawn_notice_logger(mut rx: broadcast::Receiver<SessionNotice>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        loop {
            let notice = tokio::select! {
                _ = shutdown.cancelled() => break,
                notice = rx.recv() => notice,
            };
            match notice {
                Ok(SessionNotice::SessionExpired { reason }) => {
                    warn!(reason = %reason, "session expired, login required");
                }
                Ok(notice) => info!(notice = ?notice, "session notice"),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    });
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGTERM");
                shutdown.cancel();
            }
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGINT");
                shutdown.cancel();
            }
            _ = shutdown.cancelled() => {}
        }
    });
}
