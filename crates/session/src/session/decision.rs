// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proactive token renewal decision.

use std::time::Duration;

use serde::Serialize;

/// How urgently the current token needs renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "urgency", rename_all = "snake_case")]
pub enum RenewalUrgency {
    /// No expiration known; renew to learn it.
    Unknown,
    /// `now >= expiration`.
    Expired,
    /// Remaining time at or under the critical window.
    Critical { remaining_ms: u64 },
    /// Remaining time at or under the advisory window.
    Advisory { remaining_ms: u64 },
    /// Nothing to do.
    Fresh { remaining_ms: u64 },
}

impl RenewalUrgency {
    pub fn needs_renewal(&self) -> bool {
        !matches!(self, Self::Fresh { .. })
    }
}

/// Classify `expiration` relative to `now` (both epoch millis).
///
/// Both windows are inclusive: remaining time exactly equal to a threshold
/// falls inside it.
pub fn renewal_urgency(
    expiration_ms: Option<u64>,
    now_ms: u64,
    critical: Duration,
    advisory: Duration,
) -> RenewalUrgency {
    let Some(expiration) = expiration_ms else {
        return RenewalUrgency::Unknown;
    };
    if now_ms >= expiration {
        return RenewalUrgency::Expired;
    }
    let remaining_ms = expiration - now_ms;
    if u128::from(remaining_ms) <= critical.as_millis() {
        RenewalUrgency::Critical { remaining_ms }
    } else if u128::from(remaining_ms) <= advisory.as_millis() {
        RenewalUrgency::Advisory { remaining_ms }
    } else {
        RenewalUrgency::Fresh { remaining_ms }
    }
}

#[cfg(test)]
#[path = "decision_tests.rs"]
mod tests;
