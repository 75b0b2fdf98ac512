// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serializes every network call that consumes the shared CSRF/cookie pair.
//!
//! Keep-alive and renewal both fetch headers and then hit the backend; the
//! pair is not safe to refresh concurrently, so the whole sequence runs under
//! one async mutex. The guard is released on every exit path, including when
//! the holding task is cancelled mid-call.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};

/// The single lock around header fetch + network call.
#[derive(Debug, Default)]
pub struct NetworkGuard {
    lock: Mutex<()>,
}

impl NetworkGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    /// Whether some caller currently holds the guard.
    pub fn is_held(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}

/// Run two guarded operations "now", starting the second after `delay` so
/// the first reaches the guard before it.
pub async fn staggered<A, B>(first: A, second: B, delay: Duration) -> (A::Output, B::Output)
where
    A: Future,
    B: Future,
{
    tokio::join!(first, async move {
        tokio::time::sleep(delay).await;
        second.await
    })
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
