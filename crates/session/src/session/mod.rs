// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session keep-alive and credential renewal.
//!
//! [`controller::SessionController`] owns two independent loops (keep-alive
//! ping and renewal check), the edge-triggered session-expired signal, and the
//! failure counters. The other modules are the pure pieces it is built from.

pub mod classify;
pub mod controller;
pub mod decision;
pub mod guard;
pub mod mode;
pub mod stats;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::session::classify::{FailureCeilings, FailureKind};
use crate::session::mode::IntervalTiers;

/// Authentication state as seen by UI gating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    NotAuthenticated,
    TokenExpired,
    Authenticated(String),
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "not_authenticated",
            Self::TokenExpired => "token_expired",
            Self::Authenticated(_) => "authenticated",
        }
    }
}

/// User-visible advisories broadcast by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionNotice {
    /// `start` was called without a stored token.
    NotAuthenticated,
    /// The token enters the advisory renewal window.
    TokenExpiringSoon { remaining_ms: u64 },
    /// The token enters the critical renewal window.
    TokenCritical { remaining_ms: u64 },
    /// A renewal failed but the session was kept.
    RenewalFailed { kind: FailureKind, message: String },
    /// The session is unrecoverable; the user must log in again.
    SessionExpired { reason: String },
}

/// Every tunable of the controller.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    /// Keep-alive ping interval per mode.
    pub keep_alive: IntervalTiers,
    /// Renewal check interval per mode.
    pub renewal_check: IntervalTiers,
    /// Delay before the first iteration of each loop after (re)start.
    pub startup_delay: Duration,
    /// Background time after which the app counts as deep background.
    pub deep_background_threshold: Duration,
    /// Consecutive keep-alive failures before attempts are skipped.
    pub max_consecutive_failures: u32,
    /// How long to skip attempts once the failure threshold is reached.
    pub retry_cooldown: Duration,
    /// Remaining lifetime at which renewal is critical.
    pub critical_window: Duration,
    /// Remaining lifetime at which renewal is advised.
    pub advisory_window: Duration,
    /// How far past expiry a renewal is still attempted.
    pub expiry_grace: Duration,
    /// Longest background stay after which the session must be re-validated.
    pub max_background_duration: Duration,
    /// Per-class consecutive renewal failure ceilings.
    pub ceilings: FailureCeilings,
    /// Pause after a loop iteration panics.
    pub loop_error_backoff: Duration,
    /// Offset between the two calls of a forced execution.
    pub stagger_delay: Duration,
    /// Attempts the offline runner gets before giving up.
    pub offline_max_attempts: u32,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            keep_alive: IntervalTiers {
                foreground: Duration::from_secs(4 * 60),
                background: Duration::from_secs(10 * 60),
                deep_background: Duration::from_secs(20 * 60),
            },
            renewal_check: IntervalTiers {
                foreground: Duration::from_secs(5 * 60),
                background: Duration::from_secs(15 * 60),
                deep_background: Duration::from_secs(30 * 60),
            },
            startup_delay: Duration::from_secs(5),
            deep_background_threshold: Duration::from_secs(30 * 60),
            max_consecutive_failures: 3,
            retry_cooldown: Duration::from_secs(5 * 60),
            critical_window: Duration::from_secs(5 * 60),
            advisory_window: Duration::from_secs(15 * 60),
            expiry_grace: Duration::from_secs(60),
            max_background_duration: Duration::from_secs(12 * 60 * 60),
            ceilings: FailureCeilings::default(),
            loop_error_backoff: Duration::from_secs(30),
            stagger_delay: Duration::from_millis(500),
            offline_max_attempts: 3,
        }
    }
}

/// Current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
