// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    status_401          = { Some(401), "", FailureKind::Authentication },
    status_403          = { Some(403), "denied", FailureKind::Authentication },
    status_500          = { Some(500), "", FailureKind::Server },
    status_503          = { Some(503), "maintenance", FailureKind::Server },
    token_expired_text  = { None, "Token expired at 12:00", FailureKind::Authentication },
    invalid_grant       = { None, "invalid_grant", FailureKind::Authentication },
    bad_gateway_text    = { None, "502 Bad Gateway", FailureKind::Server },
    internal_text       = { None, "Internal Server Error", FailureKind::Server },
    timeout_text        = { None, "timeout: operation timed out", FailureKind::Network },
    connect_text        = { None, "connect error: connection refused", FailureKind::Network },
    dns_text            = { None, "failed to resolve host", FailureKind::Network },
    garbage             = { None, "unexpected end of JSON", FailureKind::Unknown },
    status_400_no_sig   = { Some(400), "bad request", FailureKind::Unknown },
    status_404_no_sig   = { Some(404), "not found", FailureKind::Unknown },
)]
fn classifies(status: Option<u16>, message: &str, expected: FailureKind) {
    let err = RenewalError { status, message: message.to_owned() };
    assert_eq!(classify(&err), expected);
}

#[test]
fn authentication_expires_on_first_occurrence() {
    let mut streak = FailureStreak::default();
    let ceilings = FailureCeilings::default();
    assert_eq!(streak.record(FailureKind::Authentication, &ceilings), Escalation::Expire);
}

#[test]
fn single_server_failure_is_tolerated() {
    let mut streak = FailureStreak::default();
    let ceilings = FailureCeilings::default();
    assert_eq!(
        streak.record(FailureKind::Server, &ceilings),
        Escalation::Tolerate { count: 1, ceiling: 5 }
    );
}

#[test]
fn server_ceiling_expires_after_n_consecutive() {
    let mut streak = FailureStreak::default();
    let ceilings = FailureCeilings { server: 3, network: 8, unknown: 3 };
    assert!(matches!(streak.record(FailureKind::Server, &ceilings), Escalation::Tolerate { .. }));
    assert!(matches!(streak.record(FailureKind::Server, &ceilings), Escalation::Tolerate { .. }));
    assert_eq!(streak.record(FailureKind::Server, &ceilings), Escalation::Expire);
}

#[test]
fn classes_are_counted_separately() {
    let mut streak = FailureStreak::default();
    let ceilings = FailureCeilings { server: 2, network: 2, unknown: 2 };
    assert!(matches!(streak.record(FailureKind::Server, &ceilings), Escalation::Tolerate { .. }));
    assert!(matches!(streak.record(FailureKind::Network, &ceilings), Escalation::Tolerate { .. }));
    assert!(matches!(streak.record(FailureKind::Unknown, &ceilings), Escalation::Tolerate { .. }));
    assert_eq!(streak.count(FailureKind::Server), 1);
    assert_eq!(streak.count(FailureKind::Network), 1);
    assert_eq!(streak.count(FailureKind::Unknown), 1);
}

#[test]
fn reset_clears_all_classes() {
    let mut streak = FailureStreak::default();
    let ceilings = FailureCeilings::default();
    streak.record(FailureKind::Server, &ceilings);
    streak.record(FailureKind::Unknown, &ceilings);
    streak.reset();
    assert_eq!(streak.count(FailureKind::Server), 0);
    assert_eq!(streak.count(FailureKind::Unknown), 0);
}

#[test]
fn zero_ceiling_is_treated_as_one() {
    let mut streak = FailureStreak::default();
    let ceilings = FailureCeilings { server: 0, network: 0, unknown: 0 };
    assert_eq!(streak.record(FailureKind::Unknown, &ceilings), Escalation::Expire);
}

#[test]
fn display_includes_status() {
    let err = RenewalError::status(502, "upstream down");
    assert_eq!(err.to_string(), "renewal failed (502): upstream down");
    assert_eq!(RenewalError::message("boom").to_string(), "renewal failed: boom");
}
