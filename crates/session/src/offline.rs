// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One scheduled attempt made while the application process is not resident.
//!
//! The external scheduler runs `fleet-session offline --attempt N` and reads
//! the exit code to decide whether to back off and retry or stop.

use std::sync::Arc;

use tracing::{info, warn};

use crate::session::controller::SessionController;

/// Exit code asking the scheduler to retry later (`EX_TEMPFAIL`).
pub const EXIT_RETRY: i32 = 75;

/// Result of one offline attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineOutcome {
    Success,
    Retry,
    GiveUp,
}

impl OfflineOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Retry => "retry",
            Self::GiveUp => "give_up",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Retry => EXIT_RETRY,
            Self::GiveUp => 1,
        }
    }
}

/// Run a keep-alive and, when due, a renewal through the controller's
/// primitives. `attempt` is 1-based.
pub async fn run_attempt(controller: &Arc<SessionController>, attempt: u32) -> OfflineOutcome {
    let max_attempts = controller.policy().offline_max_attempts.max(1);

    if !controller.has_token() {
        warn!(attempt, "offline attempt without stored credentials");
        return OfflineOutcome::GiveUp;
    }

    let kept_alive = controller.perform_keep_alive().await;
    let renewed = if controller.should_renew_token() {
        controller.perform_token_renewal().await
    } else {
        true
    };

    let outcome = if controller.is_session_expired() {
        OfflineOutcome::GiveUp
    } else if kept_alive && renewed {
        OfflineOutcome::Success
    } else if attempt >= max_attempts {
        OfflineOutcome::GiveUp
    } else {
        OfflineOutcome::Retry
    };

    info!(attempt, max_attempts, kept_alive, renewed, outcome = outcome.as_str(), "offline attempt");
    outcome
}

#[cfg(test)]
#[path = "offline_tests.rs"]
mod tests;
