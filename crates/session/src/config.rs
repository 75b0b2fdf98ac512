// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use crate::session::classify::FailureCeilings;
use crate::session::mode::IntervalTiers;
use crate::session::SessionPolicy;
use crate::upstream::client::EndpointPaths;

/// Configuration shared by the `run` and `offline` subcommands.
#[derive(Debug, Clone, clap::Args)]
pub struct Config {
    /// Base URL of the fleet backend.
    #[arg(long, env = "FLEET_SESSION_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Path to the persisted credential file.
    #[arg(long, env = "FLEET_SESSION_CREDENTIALS", default_value = "credentials.json")]
    pub credentials: PathBuf,

    /// Host address for the local control API.
    #[arg(long, env = "FLEET_SESSION_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port for the local control API.
    #[arg(long, env = "FLEET_SESSION_PORT", default_value_t = 9810)]
    pub port: u16,

    /// Bearer token for the local control API. If unset, auth is disabled.
    #[arg(long, env = "FLEET_SESSION_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Backend path serving the antiforgery token.
    #[arg(long, env = "FLEET_SESSION_CSRF_PATH", default_value = "/api/antiforgery/token")]
    pub csrf_path: String,

    /// Backend path of the keep-alive ping.
    #[arg(long, env = "FLEET_SESSION_KEEPALIVE_PATH", default_value = "/api/session/keepalive")]
    pub keep_alive_path: String,

    /// Backend path of the token renewal call.
    #[arg(long, env = "FLEET_SESSION_RENEW_PATH", default_value = "/api/authentication/renew")]
    pub renew_path: String,

    /// Consecutive keep-alive failures before attempts pause for the cool-down.
    #[arg(long, env = "FLEET_SESSION_MAX_FAILURES", default_value_t = 3)]
    pub max_consecutive_failures: u32,

    /// Consecutive server-class renewal failures before the session expires.
    #[arg(long, env = "FLEET_SESSION_SERVER_CEILING", default_value_t = 5)]
    pub server_failure_ceiling: u32,

    /// Consecutive network-class renewal failures before the session expires.
    #[arg(long, env = "FLEET_SESSION_NETWORK_CEILING", default_value_t = 8)]
    pub network_failure_ceiling: u32,

    /// Consecutive unclassified renewal failures before the session expires.
    #[arg(long, env = "FLEET_SESSION_UNKNOWN_CEILING", default_value_t = 3)]
    pub unknown_failure_ceiling: u32,

    /// Offline runner attempts before giving up.
    #[arg(long, env = "FLEET_SESSION_OFFLINE_ATTEMPTS", default_value_t = 3)]
    pub offline_max_attempts: u32,

    /// Log format (json or text).
    #[arg(long, env = "FLEET_SESSION_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "FLEET_SESSION_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    // -- Duration overrides (skip from CLI; set in Config::test()) --------
    #[arg(skip)]
    pub keep_alive_foreground_ms: Option<u64>,
    #[arg(skip)]
    pub keep_alive_background_ms: Option<u64>,
    #[arg(skip)]
    pub keep_alive_deep_ms: Option<u64>,
    #[arg(skip)]
    pub renewal_foreground_ms: Option<u64>,
    #[arg(skip)]
    pub renewal_background_ms: Option<u64>,
    #[arg(skip)]
    pub renewal_deep_ms: Option<u64>,
    #[arg(skip)]
    pub startup_delay_ms: Option<u64>,
    #[arg(skip)]
    pub deep_background_ms: Option<u64>,
    #[arg(skip)]
    pub retry_cooldown_ms: Option<u64>,
    #[arg(skip)]
    pub critical_window_ms: Option<u64>,
    #[arg(skip)]
    pub advisory_window_ms: Option<u64>,
    #[arg(skip)]
    pub expiry_grace_ms: Option<u64>,
    #[arg(skip)]
    pub max_background_ms: Option<u64>,
    #[arg(skip)]
    pub loop_error_backoff_ms: Option<u64>,
    #[arg(skip)]
    pub stagger_delay_ms: Option<u64>,
    #[arg(skip)]
    pub request_timeout_ms: Option<u64>,
}

fn env_duration_ms(var: &str, default: u64) -> Duration {
    let ms = std::env::var(var).ok().and_then(|v| v.parse().ok()).unwrap_or(default);
    Duration::from_millis(ms)
}

macro_rules! duration_field {
    ($method:ident, $field:ident, $env:literal, $default:expr) => {
        pub fn $method(&self) -> Duration {
            match self.$field {
                Some(ms) => Duration::from_millis(ms),
                None => env_duration_ms($env, $default),
            }
        }
    };
}

const MINUTE_MS: u64 = 60_000;

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.backend_url.as_deref() {
            None | Some("") => anyhow::bail!("--backend-url must be specified"),
            Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                anyhow::bail!("--backend-url must be an http(s) URL: {url}")
            }
            Some(_) => {}
        }

        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }

        let policy = self.policy();
        if !policy.keep_alive.is_monotonic() {
            anyhow::bail!("keep-alive intervals must not shrink as the app goes deeper into background");
        }
        if !policy.renewal_check.is_monotonic() {
            anyhow::bail!("renewal intervals must not shrink as the app goes deeper into background");
        }
        if policy.keep_alive.foreground.is_zero() || policy.renewal_check.foreground.is_zero() {
            anyhow::bail!("loop intervals must be non-zero");
        }
        if policy.critical_window > policy.advisory_window {
            anyhow::bail!("critical renewal window must not exceed the advisory window");
        }
        if self.max_consecutive_failures == 0 {
            anyhow::bail!("--max-consecutive-failures must be at least 1");
        }
        if self.offline_max_attempts == 0 {
            anyhow::bail!("--offline-max-attempts must be at least 1");
        }
        Ok(())
    }

    // -- Tuning knobs (field override → env var → compiled default) --------

    duration_field!(
        keep_alive_foreground,
        keep_alive_foreground_ms,
        "FLEET_SESSION_KEEPALIVE_FOREGROUND_MS",
        4 * MINUTE_MS
    );
    duration_field!(
        keep_alive_background,
        keep_alive_background_ms,
        "FLEET_SESSION_KEEPALIVE_BACKGROUND_MS",
        10 * MINUTE_MS
    );
    duration_field!(
        keep_alive_deep,
        keep_alive_deep_ms,
        "FLEET_SESSION_KEEPALIVE_DEEP_MS",
        20 * MINUTE_MS
    );
    duration_field!(
        renewal_foreground,
        renewal_foreground_ms,
        "FLEET_SESSION_RENEWAL_FOREGROUND_MS",
        5 * MINUTE_MS
    );
    duration_field!(
        renewal_background,
        renewal_background_ms,
        "FLEET_SESSION_RENEWAL_BACKGROUND_MS",
        15 * MINUTE_MS
    );
    duration_field!(renewal_deep, renewal_deep_ms, "FLEET_SESSION_RENEWAL_DEEP_MS", 30 * MINUTE_MS);
    duration_field!(startup_delay, startup_delay_ms, "FLEET_SESSION_STARTUP_DELAY_MS", 5_000);
    duration_field!(
        deep_background,
        deep_background_ms,
        "FLEET_SESSION_DEEP_BACKGROUND_MS",
        30 * MINUTE_MS
    );
    duration_field!(retry_cooldown, retry_cooldown_ms, "FLEET_SESSION_COOLDOWN_MS", 5 * MINUTE_MS);
    duration_field!(
        critical_window,
        critical_window_ms,
        "FLEET_SESSION_CRITICAL_WINDOW_MS",
        5 * MINUTE_MS
    );
    duration_field!(
        advisory_window,
        advisory_window_ms,
        "FLEET_SESSION_ADVISORY_WINDOW_MS",
        15 * MINUTE_MS
    );
    duration_field!(expiry_grace, expiry_grace_ms, "FLEET_SESSION_EXPIRY_GRACE_MS", MINUTE_MS);
    duration_field!(
        max_background,
        max_background_ms,
        "FLEET_SESSION_MAX_BACKGROUND_MS",
        12 * 60 * MINUTE_MS
    );
    duration_field!(
        loop_error_backoff,
        loop_error_backoff_ms,
        "FLEET_SESSION_LOOP_BACKOFF_MS",
        30_000
    );
    duration_field!(stagger_delay, stagger_delay_ms, "FLEET_SESSION_STAGGER_MS", 500);
    duration_field!(
        request_timeout,
        request_timeout_ms,
        "FLEET_SESSION_REQUEST_TIMEOUT_MS",
        30_000
    );

    /// Build the controller policy from the configured knobs.
    pub fn policy(&self) -> SessionPolicy {
        SessionPolicy {
            keep_alive: IntervalTiers {
                foreground: self.keep_alive_foreground(),
                background: self.keep_alive_background(),
                deep_background: self.keep_alive_deep(),
            },
            renewal_check: IntervalTiers {
                foreground: self.renewal_foreground(),
                background: self.renewal_background(),
                deep_background: self.renewal_deep(),
            },
            startup_delay: self.startup_delay(),
            deep_background_threshold: self.deep_background(),
            max_consecutive_failures: self.max_consecutive_failures,
            retry_cooldown: self.retry_cooldown(),
            critical_window: self.critical_window(),
            advisory_window: self.advisory_window(),
            expiry_grace: self.expiry_grace(),
            max_background_duration: self.max_background(),
            ceilings: FailureCeilings {
                server: self.server_failure_ceiling,
                network: self.network_failure_ceiling,
                unknown: self.unknown_failure_ceiling,
            },
            loop_error_backoff: self.loop_error_backoff(),
            stagger_delay: self.stagger_delay(),
            offline_max_attempts: self.offline_max_attempts,
        }
    }

    pub fn endpoint_paths(&self) -> EndpointPaths {
        EndpointPaths {
            csrf: self.csrf_path.clone(),
            keep_alive: self.keep_alive_path.clone(),
            renew: self.renew_path.clone(),
        }
    }

    /// Build a minimal `Config` for tests (port 0, short intervals).
    #[doc(hidden)]
    pub fn test() -> Self {
        Self {
            backend_url: Some("http://127.0.0.1:1".into()),
            credentials: PathBuf::from("credentials.json"),
            host: "127.0.0.1".into(),
            port: 0,
            auth_token: None,
            csrf_path: "/api/antiforgery/token".into(),
            keep_alive_path: "/api/session/keepalive".into(),
            renew_path: "/api/authentication/renew".into(),
            max_consecutive_failures: 3,
            server_failure_ceiling: 5,
            network_failure_ceiling: 8,
            unknown_failure_ceiling: 3,
            offline_max_attempts: 3,
            log_format: "text".into(),
            log_level: "debug".into(),
            keep_alive_foreground_ms: Some(100),
            keep_alive_background_ms: Some(200),
            keep_alive_deep_ms: Some(400),
            renewal_foreground_ms: Some(100),
            renewal_background_ms: Some(200),
            renewal_deep_ms: Some(400),
            startup_delay_ms: Some(10),
            deep_background_ms: Some(1_000),
            retry_cooldown_ms: Some(500),
            critical_window_ms: Some(300_000),
            advisory_window_ms: Some(900_000),
            expiry_grace_ms: Some(60_000),
            max_background_ms: Some(3_600_000),
            loop_error_backoff_ms: Some(20),
            stagger_delay_ms: Some(5),
            request_timeout_ms: Some(2_000),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
