// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use clap::Parser;

use super::Config;

#[derive(Debug, Parser)]
struct Cli {
    #[command(flatten)]
    config: Config,
}

fn parse(args: &[&str]) -> Config {
    Cli::parse_from(args).config
}

#[test]
fn minimal_args_validate() -> anyhow::Result<()> {
    let config = parse(&["fleet-session", "--backend-url", "https://fleet.example"]);
    config.validate()?;
    assert_eq!(config.port, 9810);
    assert_eq!(config.host, "127.0.0.1");
    assert!(config.auth_token.is_none());
    Ok(())
}

#[test]
fn defaults_match_policy_defaults() {
    let config = parse(&["fleet-session", "--backend-url", "https://fleet.example"]);
    let policy = config.policy();
    let expected = crate::session::SessionPolicy::default();
    assert_eq!(policy.keep_alive, expected.keep_alive);
    assert_eq!(policy.renewal_check, expected.renewal_check);
    assert_eq!(policy.retry_cooldown, expected.retry_cooldown);
    assert_eq!(policy.max_background_duration, expected.max_background_duration);
    assert_eq!(policy.ceilings, expected.ceilings);
    assert_eq!(policy.max_consecutive_failures, 3);
}

#[yare::parameterized(
    no_backend   = { &["fleet-session"], "--backend-url must be specified" },
    not_http     = { &["fleet-session", "--backend-url", "ftp://x"], "http(s) URL" },
    bad_format   = { &["fleet-session", "--backend-url", "http://x", "--log-format", "xml"],
                     "invalid log format" },
    zero_failures = { &["fleet-session", "--backend-url", "http://x",
                        "--max-consecutive-failures", "0"], "at least 1" },
    zero_attempts = { &["fleet-session", "--backend-url", "http://x",
                        "--offline-max-attempts", "0"], "at least 1" },
)]
fn invalid_config(args: &[&str], expected_substr: &str) {
    let config = parse(args);
    crate::assert_err_contains!(config.validate(), expected_substr);
}

#[test]
fn shrinking_background_interval_is_rejected() {
    let mut config = Config::test();
    config.keep_alive_background_ms = Some(50);
    crate::assert_err_contains!(config.validate(), "keep-alive intervals");

    let mut config = Config::test();
    config.renewal_deep_ms = Some(150);
    crate::assert_err_contains!(config.validate(), "renewal intervals");
}

#[test]
fn critical_window_must_fit_advisory_window() {
    let mut config = Config::test();
    config.critical_window_ms = Some(1_000_000);
    crate::assert_err_contains!(config.validate(), "critical renewal window");
}

#[test]
fn field_override_wins() {
    let config = Config::test();
    assert_eq!(config.keep_alive_foreground(), Duration::from_millis(100));
    assert_eq!(config.stagger_delay(), Duration::from_millis(5));
    assert_eq!(config.policy().startup_delay, Duration::from_millis(10));
}

#[test]
fn test_config_is_valid() -> anyhow::Result<()> {
    Config::test().validate()
}

#[test]
fn ceilings_flow_into_policy() {
    let config = parse(&[
        "fleet-session",
        "--backend-url",
        "http://x",
        "--server-failure-ceiling",
        "2",
        "--network-failure-ceiling",
        "9",
    ]);
    let ceilings = config.policy().ceilings;
    assert_eq!(ceilings.server, 2);
    assert_eq!(ceilings.network, 9);
    assert_eq!(ceilings.unknown, 3);
}

#[test]
fn endpoint_paths_are_configurable() {
    let config = parse(&["fleet-session", "--backend-url", "http://x", "--renew-path", "/renew"]);
    let paths = config.endpoint_paths();
    assert_eq!(paths.renew, "/renew");
    assert_eq!(paths.csrf, "/api/antiforgery/token");
}
