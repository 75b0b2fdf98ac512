// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;
use crate::session::classify::RenewalError;
use crate::test_support::{logged_in_user, ControllerBuilder, PingScript};

#[yare::parameterized(
    success = { OfflineOutcome::Success, 0 },
    retry = { OfflineOutcome::Retry, 75 },
    give_up = { OfflineOutcome::GiveUp, 1 },
)]
fn exit_codes(outcome: OfflineOutcome, code: i32) {
    assert_eq!(outcome.exit_code(), code);
}

#[tokio::test]
async fn no_credentials_gives_up_without_network() {
    let h = ControllerBuilder::new().user(None).build();
    assert_eq!(run_attempt(&h.controller, 1).await, OfflineOutcome::GiveUp);
    assert_eq!(h.backend.pings(), 0);
    assert_eq!(h.backend.csrf_fetches(), 0);
}

#[tokio::test]
async fn fresh_token_only_pings() {
    let h = ControllerBuilder::new().build();
    assert_eq!(run_attempt(&h.controller, 1).await, OfflineOutcome::Success);
    assert_eq!(h.backend.pings(), 1);
    assert_eq!(h.backend.renewals(), 0);
}

#[tokio::test]
async fn expiring_token_is_renewed() {
    let h = ControllerBuilder::new().user(Some(logged_in_user(Duration::from_secs(120)))).build();
    assert_eq!(run_attempt(&h.controller, 1).await, OfflineOutcome::Success);
    assert_eq!(h.backend.pings(), 1);
    assert_eq!(h.backend.renewals(), 1);
    assert_eq!(h.controller.token_renewal_success_count(), 1);
}

#[yare::parameterized(
    first = { 1, OfflineOutcome::Retry },
    second = { 2, OfflineOutcome::Retry },
    last = { 3, OfflineOutcome::GiveUp },
    beyond = { 7, OfflineOutcome::GiveUp },
)]
#[test_macro(tokio::test)]
async fn failed_ping_retries_until_budget(attempt: u32, expected: OfflineOutcome) {
    let h = ControllerBuilder::new().build();
    h.backend.set_ping_default(PingScript::Status(503));
    assert_eq!(run_attempt(&h.controller, attempt).await, expected);
}

#[tokio::test]
async fn server_renewal_failure_retries() {
    let h = ControllerBuilder::new().user(Some(logged_in_user(Duration::from_secs(120)))).build();
    h.backend.push_renew(Err(RenewalError::status(503, "Service Unavailable")));
    assert_eq!(run_attempt(&h.controller, 1).await, OfflineOutcome::Retry);
    assert!(!h.controller.is_session_expired());
}

#[tokio::test]
async fn rejected_refresh_token_gives_up() {
    let h = ControllerBuilder::new().user(Some(logged_in_user(Duration::from_secs(120)))).build();
    h.backend.push_renew(Err(RenewalError::status(401, "Unauthorized")));
    assert_eq!(run_attempt(&h.controller, 1).await, OfflineOutcome::GiveUp);
    assert!(h.controller.is_session_expired());
}
