// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use proptest::prelude::*;

use super::*;

const CRITICAL: Duration = Duration::from_secs(300);
const ADVISORY: Duration = Duration::from_secs(900);
const NOW: u64 = 1_700_000_000_000;

#[yare::parameterized(
    unknown          = { None, RenewalUrgency::Unknown },
    exactly_now      = { Some(NOW), RenewalUrgency::Expired },
    in_the_past      = { Some(NOW - 1), RenewalUrgency::Expired },
    critical_inside  = { Some(NOW + 1), RenewalUrgency::Critical { remaining_ms: 1 } },
    critical_edge    = { Some(NOW + 300_000), RenewalUrgency::Critical { remaining_ms: 300_000 } },
    advisory_inside  = { Some(NOW + 300_001), RenewalUrgency::Advisory { remaining_ms: 300_001 } },
    advisory_edge    = { Some(NOW + 900_000), RenewalUrgency::Advisory { remaining_ms: 900_000 } },
    fresh            = { Some(NOW + 900_001), RenewalUrgency::Fresh { remaining_ms: 900_001 } },
)]
fn urgency(expiration: Option<u64>, expected: RenewalUrgency) {
    assert_eq!(renewal_urgency(expiration, NOW, CRITICAL, ADVISORY), expected);
}

#[test]
fn only_fresh_skips_renewal() {
    assert!(RenewalUrgency::Unknown.needs_renewal());
    assert!(RenewalUrgency::Expired.needs_renewal());
    assert!(RenewalUrgency::Critical { remaining_ms: 1 }.needs_renewal());
    assert!(RenewalUrgency::Advisory { remaining_ms: 1 }.needs_renewal());
    assert!(!RenewalUrgency::Fresh { remaining_ms: 1 }.needs_renewal());
}

proptest! {
    #[test]
    fn renews_iff_within_advisory(remaining in 0u64..10_000_000) {
        let urgency = renewal_urgency(Some(NOW + remaining), NOW, CRITICAL, ADVISORY);
        prop_assert_eq!(urgency.needs_renewal(), u128::from(remaining) <= ADVISORY.as_millis());
    }
}
