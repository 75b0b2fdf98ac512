// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Renewal failure classification and per-class escalation.
//!
//! Classification is advisory. An `Unknown` verdict must never expire a
//! session on its own; only `Authentication` escalates on first sight.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Failure category of a renewal attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Authentication,
    Server,
    Network,
    Unknown,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Server => "server",
            Self::Network => "network",
            Self::Unknown => "unknown",
        }
    }

    /// Whether this class is likely transient infrastructure trouble.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Server | Self::Network)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed renewal attempt: optional HTTP status plus a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalError {
    pub status: Option<u16>,
    pub message: String,
}

impl RenewalError {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self { status: Some(status), message: body.into() }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self { status: None, message: message.into() }
    }

    /// Convert a transport error, keeping the timeout/connect signature in
    /// the message so classification can see it. The URL is dropped so
    /// host and port digits never match a status signature.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        let prefix = if err.is_timeout() {
            "timeout: "
        } else if err.is_connect() {
            "connect error: "
        } else {
            ""
        };
        let status = err.status().map(|s| s.as_u16());
        Self { status, message: format!("{prefix}{}", err.without_url()) }
    }
}

impl fmt::Display for RenewalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "renewal failed ({status}): {}", self.message),
            None => write!(f, "renewal failed: {}", self.message),
        }
    }
}

impl std::error::Error for RenewalError {}

const AUTH_SIGNATURES: &[&str] = &[
    "401",
    "403",
    "unauthorized",
    "forbidden",
    "token expired",
    "token_expired",
    "invalid token",
    "invalid_token",
    "invalid_grant",
    "authentication",
];

const SERVER_SIGNATURES: &[&str] = &[
    "500",
    "502",
    "503",
    "504",
    "internal server error",
    "bad gateway",
    "service unavailable",
    "gateway timeout",
    "server error",
];

const NETWORK_SIGNATURES: &[&str] = &[
    "timeout",
    "timed out",
    "connect",
    "connection",
    "unreachable",
    "dns",
    "resolve",
    "broken pipe",
    "network",
];

/// Map a renewal failure to a [`FailureKind`].
///
/// A status code decides when present; otherwise the message is matched
/// against known signatures, authentication first.
pub fn classify(err: &RenewalError) -> FailureKind {
    match err.status {
        Some(401 | 403) => return FailureKind::Authentication,
        Some(500..=599) => return FailureKind::Server,
        _ => {}
    }

    let text = err.message.to_lowercase();
    let matches = |sigs: &[&str]| sigs.iter().any(|s| text.contains(s));
    if matches(AUTH_SIGNATURES) {
        FailureKind::Authentication
    } else if matches(SERVER_SIGNATURES) {
        FailureKind::Server
    } else if matches(NETWORK_SIGNATURES) {
        FailureKind::Network
    } else {
        FailureKind::Unknown
    }
}

/// Consecutive failures of a class tolerated before the session is expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureCeilings {
    pub server: u32,
    pub network: u32,
    pub unknown: u32,
}

impl Default for FailureCeilings {
    fn default() -> Self {
        Self { server: 5, network: 8, unknown: 3 }
    }
}

impl FailureCeilings {
    fn for_kind(&self, kind: FailureKind) -> u32 {
        match kind {
            FailureKind::Authentication => 1,
            FailureKind::Server => self.server.max(1),
            FailureKind::Network => self.network.max(1),
            FailureKind::Unknown => self.unknown.max(1),
        }
    }
}

/// What the controller should do after a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Keep the session; the token may still be valid.
    Tolerate { count: u32, ceiling: u32 },
    /// The session is unrecoverable.
    Expire,
}

/// Consecutive renewal failures per class since the last success.
#[derive(Debug, Clone, Default)]
pub struct FailureStreak {
    server: u32,
    network: u32,
    unknown: u32,
}

impl FailureStreak {
    /// Record a failure and decide whether it escalates.
    pub fn record(&mut self, kind: FailureKind, ceilings: &FailureCeilings) -> Escalation {
        let counter = match kind {
            FailureKind::Authentication => return Escalation::Expire,
            FailureKind::Server => &mut self.server,
            FailureKind::Network => &mut self.network,
            FailureKind::Unknown => &mut self.unknown,
        };
        *counter = counter.saturating_add(1);
        let count = *counter;
        let ceiling = ceilings.for_kind(kind);
        if count >= ceiling {
            Escalation::Expire
        } else {
            Escalation::Tolerate { count, ceiling }
        }
    }

    pub fn count(&self, kind: FailureKind) -> u32 {
        match kind {
            FailureKind::Authentication => 0,
            FailureKind::Server => self.server,
            FailureKind::Network => self.network,
            FailureKind::Unknown => self.unknown,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
