// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use tokio::time::Instant;

use super::*;

const COOLDOWN: Duration = Duration::from_secs(300);

#[test]
fn below_threshold_never_backs_off() {
    let mut counter = FailureCounter::default();
    let now = Instant::now();
    counter.record_failure(now);
    counter.record_failure(now);
    assert!(!counter.in_backoff(now, 3, COOLDOWN));
}

#[test]
fn backs_off_until_cooldown_elapses() {
    let mut counter = FailureCounter::default();
    let t0 = Instant::now();
    for _ in 0..3 {
        counter.record_failure(t0);
    }
    assert!(counter.in_backoff(t0, 3, COOLDOWN));
    assert!(counter.in_backoff(t0 + Duration::from_secs(299), 3, COOLDOWN));
    assert!(!counter.in_backoff(t0 + COOLDOWN, 3, COOLDOWN));
}

#[test]
fn reset_clears_count_and_time() {
    let mut counter = FailureCounter::default();
    counter.record_failure(Instant::now());
    counter.reset();
    assert_eq!(counter.count(), 0);
    assert!(counter.last_failure().is_none());
}

#[test]
fn reset_counters_keeps_timestamps() {
    let mut stats = RenewalStats {
        success_count: 4,
        failure_count: 2,
        last_attempt_ms: Some(10),
        last_keep_alive_ms: Some(20),
    };
    stats.reset_counters();
    assert_eq!(stats.success_count, 0);
    assert_eq!(stats.failure_count, 0);
    assert_eq!(stats.last_attempt_ms, Some(10));
    assert_eq!(stats.last_keep_alive_ms, Some(20));
}
