// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controller wired to the real HTTP client and file store, against a mock
//! backend.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use fleet_session::config::Config;
use fleet_session::credential::persist::{self, CredentialFile};
use fleet_session::offline::{run_attempt, OfflineOutcome};
use fleet_session::test_support::{ensure_crypto_provider, logged_in_user, wait_for};
use fleet_session::upstream::UserRecord;

#[derive(Default)]
struct Counts {
    pings: AtomicU32,
    renewals: AtomicU32,
}

async fn mock_backend(renew_status: u16) -> anyhow::Result<(SocketAddr, Arc<Counts>)> {
    let counts = Arc::new(Counts::default());
    let (c1, c2) = (Arc::clone(&counts), Arc::clone(&counts));
    let app = Router::new()
        .route(
            "/api/antiforgery/token",
            get(|| async {
                (
                    [("set-cookie", "antiforgery=xyz; Path=/")],
                    Json(serde_json::json!({ "token": "csrf" })),
                )
            }),
        )
        .route(
            "/api/session/keepalive",
            post(move || {
                let counts = Arc::clone(&c1);
                async move {
                    counts.pings.fetch_add(1, Ordering::SeqCst);
                    StatusCode::OK
                }
            }),
        )
        .route(
            "/api/authentication/renew",
            post(move || {
                let counts = Arc::clone(&c2);
                async move {
                    counts.renewals.fetch_add(1, Ordering::SeqCst);
                    let status =
                        StatusCode::from_u16(renew_status).unwrap_or(StatusCode::BAD_GATEWAY);
                    let body = serde_json::json!({
                        "token": "renewed-token",
                        "tokenExpiration": fleet_session::session::epoch_ms() + 3_600_000,
                        "refreshToken": "refresh-2",
                    });
                    (status, Json(body))
                }
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok((addr, counts))
}

fn seed_credentials(path: &Path, user: UserRecord) -> anyhow::Result<()> {
    persist::save(path, &CredentialFile { user: Some(user), saved_at_ms: 0 })
}

fn config_for(addr: SocketAddr, credentials: &Path) -> Config {
    let mut config = Config::test();
    config.backend_url = Some(format!("http://{addr}"));
    config.credentials = credentials.to_owned();
    config
}

#[tokio::test]
async fn keep_alive_loop_pings_backend() -> anyhow::Result<()> {
    ensure_crypto_provider();
    let (addr, counts) = mock_backend(200).await?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("credentials.json");
    seed_credentials(&path, logged_in_user(Duration::from_secs(3600)))?;

    let controller = fleet_session::build_controller(&config_for(addr, &path), CancellationToken::new())?;
    assert!(controller.start());
    assert!(wait_for(Duration::from_secs(5), || counts.pings.load(Ordering::SeqCst) >= 2).await);
    controller.stop();

    assert!(controller.last_keep_alive_time().is_some());
    assert_eq!(controller.consecutive_failures(), 0);
    assert_eq!(counts.renewals.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn renewal_is_persisted_to_disk() -> anyhow::Result<()> {
    ensure_crypto_provider();
    let (addr, counts) = mock_backend(200).await?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("credentials.json");
    seed_credentials(&path, logged_in_user(Duration::from_secs(120)))?;

    let controller = fleet_session::build_controller(&config_for(addr, &path), CancellationToken::new())?;
    assert!(controller.should_renew_token());
    assert!(controller.perform_token_renewal().await);
    assert_eq!(counts.renewals.load(Ordering::SeqCst), 1);

    let on_disk = persist::load(&path)?.user.ok_or_else(|| anyhow::anyhow!("user missing"))?;
    assert_eq!(on_disk.token.as_deref(), Some("renewed-token"));
    assert_eq!(on_disk.refresh_token.as_deref(), Some("refresh-2"));
    // Fields the renewal did not carry survive the merge.
    assert_eq!(on_disk.site_id.as_deref(), Some("site-1"));
    Ok(())
}

#[tokio::test]
async fn offline_attempt_gives_up_on_rejected_refresh() -> anyhow::Result<()> {
    ensure_crypto_provider();
    let (addr, _counts) = mock_backend(401).await?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("credentials.json");
    seed_credentials(&path, logged_in_user(Duration::from_secs(120)))?;

    let controller = fleet_session::build_controller(&config_for(addr, &path), CancellationToken::new())?;
    assert_eq!(run_attempt(&controller, 1).await, OfflineOutcome::GiveUp);
    assert!(controller.is_session_expired());
    // Expiry leaves the stored credentials for the login flow to replace.
    assert!(persist::load(&path)?.user.is_some());
    Ok(())
}

#[tokio::test]
async fn offline_attempt_retries_on_server_error() -> anyhow::Result<()> {
    ensure_crypto_provider();
    let (addr, _counts) = mock_backend(503).await?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("credentials.json");
    seed_credentials(&path, logged_in_user(Duration::from_secs(120)))?;

    let controller = fleet_session::build_controller(&config_for(addr, &path), CancellationToken::new())?;
    assert_eq!(run_attempt(&controller, 1).await, OfflineOutcome::Retry);
    assert!(!controller.is_session_expired());
    Ok(())
}
