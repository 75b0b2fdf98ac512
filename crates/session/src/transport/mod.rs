// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local control and status API.

pub mod auth;
pub mod http;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::session::controller::SessionController;

/// Shared state for the local API.
pub struct AppState {
    pub controller: Arc<SessionController>,
    /// Bearer token required on every route except health. `None` disables auth.
    pub auth_token: Option<String>,
}

/// Build the axum `Router` with all session routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health (no auth)
        .route("/api/v1/health", get(http::health))
        // Status
        .route("/api/v1/session", get(http::session_report))
        // Lifecycle
        .route("/api/v1/session/start", post(http::session_start))
        .route("/api/v1/session/stop", post(http::session_stop))
        .route("/api/v1/session/background", post(http::session_background))
        .route("/api/v1/session/foreground", post(http::session_foreground))
        // Triggers
        .route("/api/v1/session/keepalive", post(http::session_keep_alive))
        .route("/api/v1/session/renew", post(http::session_renew))
        .route("/api/v1/session/emergency", post(http::session_emergency))
        .route("/api/v1/session/force", post(http::session_force))
        .route("/api/v1/session/reset-expired", post(http::session_reset_expired))
        // Middleware
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_layer))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
