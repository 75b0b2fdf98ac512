// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the local control API.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::ErrorCode;
use crate::session::mode::BackgroundMode;
use crate::transport::AppState;

// -- Response types -----------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub active: bool,
    pub session_expired: bool,
}

#[derive(Debug, Serialize)]
pub struct ActiveResponse {
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct ModeResponse {
    pub mode: BackgroundMode,
}

#[derive(Debug, Serialize)]
pub struct ForegroundResponse {
    pub valid: bool,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub triggered: bool,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct ForceResponse {
    pub keep_alive: bool,
    pub renewal: bool,
}

#[derive(Debug, Serialize)]
pub struct ExpiredResponse {
    pub session_expired: bool,
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/v1/health`
pub async fn health(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "running".to_owned(),
        active: s.controller.is_keep_alive_active(),
        session_expired: s.controller.is_session_expired(),
    })
}

/// `GET /api/v1/session`
pub async fn session_report(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    Json(s.controller.health_report())
}

/// `POST /api/v1/session/start`
pub async fn session_start(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    if !s.controller.start() {
        return ErrorCode::NotAuthenticated
            .with_message("no stored credentials")
            .into_response();
    }
    Json(ActiveResponse { active: true }).into_response()
}

/// `POST /api/v1/session/stop`
pub async fn session_stop(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    s.controller.stop();
    Json(ActiveResponse { active: false })
}

/// `POST /api/v1/session/background`
pub async fn session_background(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    s.controller.on_app_goes_to_background();
    Json(ModeResponse { mode: s.controller.mode() })
}

/// `POST /api/v1/session/foreground`
pub async fn session_foreground(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    let valid = s.controller.on_app_comes_to_foreground().await;
    Json(ForegroundResponse { valid })
}

/// `POST /api/v1/session/keepalive`: fire-and-forget keep-alive.
pub async fn session_keep_alive(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    if !s.controller.trigger_keep_alive() {
        return ErrorCode::BadRequest.with_message("keep-alive not active").into_response();
    }
    Json(TriggerResponse { triggered: true }).into_response()
}

/// `POST /api/v1/session/renew`: fire-and-forget renewal check.
pub async fn session_renew(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    if !s.controller.trigger_token_renewal_check() {
        return ErrorCode::BadRequest.with_message("keep-alive not active").into_response();
    }
    Json(TriggerResponse { triggered: true }).into_response()
}

/// `POST /api/v1/session/emergency`
pub async fn session_emergency(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    let ok = s.controller.perform_emergency_session_check().await;
    if s.controller.is_session_expired() {
        return ErrorCode::SessionExpired
            .with_message("session expired, login required")
            .into_response();
    }
    Json(CheckResponse { ok }).into_response()
}

/// `POST /api/v1/session/force`
pub async fn session_force(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    let (keep_alive, renewal) = s.controller.force_execute_both().await;
    Json(ForceResponse { keep_alive, renewal })
}

/// `POST /api/v1/session/reset-expired`
pub async fn session_reset_expired(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    s.controller.reset_session_expired_event();
    Json(ExpiredResponse { session_expired: s.controller.is_session_expired() })
}
