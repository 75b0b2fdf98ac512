// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Foreground/background tracking and the polling intervals each mode implies.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Application visibility tier.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundMode {
    #[default]
    Foreground,
    Background,
    DeepBackground,
}

impl BackgroundMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Foreground => "foreground",
            Self::Background => "background",
            Self::DeepBackground => "deep_background",
        }
    }
}

/// One interval per [`BackgroundMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalTiers {
    pub foreground: Duration,
    pub background: Duration,
    pub deep_background: Duration,
}

impl IntervalTiers {
    pub fn for_mode(&self, mode: BackgroundMode) -> Duration {
        match mode {
            BackgroundMode::Foreground => self.foreground,
            BackgroundMode::Background => self.background,
            BackgroundMode::DeepBackground => self.deep_background,
        }
    }

    /// Intervals never shrink as the app sinks deeper into the background.
    pub fn is_monotonic(&self) -> bool {
        self.foreground <= self.background && self.background <= self.deep_background
    }
}

/// Tracks the current mode and when the app left the foreground.
#[derive(Debug)]
pub struct ModeTracker {
    mode: BackgroundMode,
    deep_threshold: Duration,
    /// Monotonic instant of the last background entry, for deep promotion.
    background_since: Option<Instant>,
    /// Wall-clock epoch millis of the last background entry.
    background_entered_ms: Option<i64>,
}

impl ModeTracker {
    pub fn new(deep_threshold: Duration) -> Self {
        Self {
            mode: BackgroundMode::Foreground,
            deep_threshold,
            background_since: None,
            background_entered_ms: None,
        }
    }

    pub fn mode(&self) -> BackgroundMode {
        self.mode
    }

    pub fn is_in_background(&self) -> bool {
        self.mode != BackgroundMode::Foreground
    }

    pub fn is_in_deep_background(&self) -> bool {
        self.mode == BackgroundMode::DeepBackground
    }

    /// Enter background. Re-entering while already backgrounded keeps the
    /// original entry time so deep promotion is not postponed.
    pub fn enter_background(&mut self, now: Instant, wall_ms: i64) {
        if self.mode == BackgroundMode::Foreground {
            self.background_since = Some(now);
            self.background_entered_ms = Some(wall_ms);
            self.mode = BackgroundMode::Background;
        }
    }

    /// Return to the foreground and report how long the app was away, in
    /// signed wall-clock millis. `None` when the app was not in background.
    ///
    /// The duration can be negative if the wall clock moved backwards.
    pub fn enter_foreground(&mut self, wall_ms: i64) -> Option<i64> {
        self.mode = BackgroundMode::Foreground;
        self.background_since = None;
        self.background_entered_ms.take().map(|entered| wall_ms.saturating_sub(entered))
    }

    /// Promote Background to DeepBackground once the threshold has elapsed.
    /// Returns true if a transition happened.
    pub fn check_deep_background(&mut self, now: Instant) -> bool {
        if self.mode != BackgroundMode::Background {
            return false;
        }
        match self.background_since {
            Some(since) if now.saturating_duration_since(since) >= self.deep_threshold => {
                self.mode = BackgroundMode::DeepBackground;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "mode_tests.rs"]
mod tests;
