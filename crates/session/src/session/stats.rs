// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Renewal statistics, keep-alive failure counter, and the health snapshot.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::session::mode::BackgroundMode;

/// Renewal and keep-alive bookkeeping for health reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenewalStats {
    pub success_count: u64,
    pub failure_count: u64,
    /// Epoch millis of the last renewal attempt.
    pub last_attempt_ms: Option<u64>,
    /// Epoch millis of the last successful keep-alive.
    pub last_keep_alive_ms: Option<u64>,
}

impl RenewalStats {
    /// Zero the counters. Timestamps survive a stop/start cycle.
    pub fn reset_counters(&mut self) {
        self.success_count = 0;
        self.failure_count = 0;
    }
}

/// Consecutive keep-alive failures and when the last one happened.
#[derive(Debug, Clone, Default)]
pub struct FailureCounter {
    count: u32,
    last_failure: Option<Instant>,
}

impl FailureCounter {
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn last_failure(&self) -> Option<Instant> {
        self.last_failure
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.count = self.count.saturating_add(1);
        self.last_failure = Some(now);
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.last_failure = None;
    }

    /// True while the threshold is reached and the cool-down has not elapsed.
    pub fn in_backoff(&self, now: Instant, max_failures: u32, cooldown: Duration) -> bool {
        if self.count < max_failures {
            return false;
        }
        match self.last_failure {
            Some(at) => now.saturating_duration_since(at) < cooldown,
            None => false,
        }
    }
}

/// Serializable snapshot of the controller for status consumers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionHealthReport {
    pub active: bool,
    pub mode: BackgroundMode,
    pub state: &'static str,
    pub session_expired: bool,
    pub consecutive_failures: u32,
    pub stats: RenewalStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_expiration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_expires_in_ms: Option<u64>,
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
