// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session lifecycle controller: keep-alive loop, renewal loop, escalation.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::session::classify::{classify, Escalation, FailureStreak, RenewalError};
use crate::session::decision::{renewal_urgency, RenewalUrgency};
use crate::session::guard::{staggered, NetworkGuard};
use crate::session::mode::{BackgroundMode, ModeTracker};
use crate::session::stats::{FailureCounter, RenewalStats, SessionHealthReport};
use crate::session::{epoch_ms, SessionNotice, SessionPolicy, SessionState};
use crate::upstream::{CredentialStore, KeepAliveEndpoint, RenewalEndpoint, SessionHeaderProvider};

/// External collaborators injected into the controller.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn CredentialStore>,
    pub headers: Arc<dyn SessionHeaderProvider>,
    pub keep_alive: Arc<dyn KeepAliveEndpoint>,
    pub renewal: Arc<dyn RenewalEndpoint>,
}

/// The current run's cancellation token. `generation` changes on every
/// start and stop so a caller that awaited can tell whether its run survived.
#[derive(Debug, Default)]
struct RunSlot {
    cancel: Option<CancellationToken>,
    generation: u64,
}

#[derive(Debug, Clone, Copy)]
enum LoopKind {
    KeepAlive,
    Renewal,
}

impl LoopKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::KeepAlive => "keep_alive",
            Self::Renewal => "renewal",
        }
    }
}

/// Keeps an authenticated session alive and its token renewed.
///
/// Constructed once per process and shared as `Arc`. `start` spawns the two
/// loops under a child of the shutdown token; `stop` cancels that child. A
/// panic inside one loop iteration is caught at the loop boundary and never
/// reaches the sibling loop.
pub struct SessionController {
    store: Arc<dyn CredentialStore>,
    headers: Arc<dyn SessionHeaderProvider>,
    keep_alive: Arc<dyn KeepAliveEndpoint>,
    renewal: Arc<dyn RenewalEndpoint>,
    policy: SessionPolicy,
    guard: NetworkGuard,
    shutdown: CancellationToken,
    run: Mutex<RunSlot>,
    tracker: Mutex<ModeTracker>,
    failures: Mutex<FailureCounter>,
    streak: Mutex<FailureStreak>,
    stats: Mutex<RenewalStats>,
    active_tx: watch::Sender<bool>,
    mode_tx: watch::Sender<BackgroundMode>,
    state_tx: watch::Sender<SessionState>,
    expired_tx: watch::Sender<bool>,
    notice_tx: broadcast::Sender<SessionNotice>,
}

impl SessionController {
    pub fn new(
        policy: SessionPolicy,
        collaborators: Collaborators,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let tracker = ModeTracker::new(policy.deep_background_threshold);
        Arc::new(Self {
            store: collaborators.store,
            headers: collaborators.headers,
            keep_alive: collaborators.keep_alive,
            renewal: collaborators.renewal,
            policy,
            guard: NetworkGuard::new(),
            shutdown,
            run: Mutex::new(RunSlot::default()),
            tracker: Mutex::new(tracker),
            failures: Mutex::new(FailureCounter::default()),
            streak: Mutex::new(FailureStreak::default()),
            stats: Mutex::new(RenewalStats::default()),
            active_tx: watch::channel(false).0,
            mode_tx: watch::channel(BackgroundMode::Foreground).0,
            state_tx: watch::channel(SessionState::NotAuthenticated).0,
            expired_tx: watch::channel(false).0,
            notice_tx: broadcast::channel(64).0,
        })
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    // -- Control surface -----------------------------------------------------

    /// Start both loops. Restarts them if already running.
    ///
    /// Returns false without touching the network when no token is stored.
    pub fn start(self: &Arc<Self>) -> bool {
        let Some(token) = self.store.token().filter(|t| !t.trim().is_empty()) else {
            warn!("no stored token, session keep-alive not started");
            self.state_tx.send_replace(SessionState::NotAuthenticated);
            let _ = self.notice_tx.send(SessionNotice::NotAuthenticated);
            return false;
        };

        if self.is_keep_alive_active() {
            debug!("session keep-alive already running, restarting");
            self.stop();
        }

        self.stats.lock().reset_counters();
        self.failures.lock().reset();
        self.streak.lock().reset();
        self.state_tx.send_replace(SessionState::Authenticated(token));
        self.begin_run();
        info!(mode = self.mode().as_str(), "session keep-alive started");
        true
    }

    /// Cancel both loops. Credentials are left untouched.
    pub fn stop(&self) {
        {
            let mut run = self.run.lock();
            run.generation += 1;
            if let Some(cancel) = run.cancel.take() {
                cancel.cancel();
                info!("session keep-alive stopped");
            }
            self.active_tx.send_replace(false);
        }
        self.stats.lock().reset_counters();
    }

    /// Fire-and-forget keep-alive. No-op unless running.
    pub fn trigger_keep_alive(self: &Arc<Self>) -> bool {
        self.trigger(LoopKind::KeepAlive)
    }

    /// Fire-and-forget renewal check. No-op unless running.
    pub fn trigger_token_renewal_check(self: &Arc<Self>) -> bool {
        self.trigger(LoopKind::Renewal)
    }

    fn trigger(self: &Arc<Self>, kind: LoopKind) -> bool {
        let Some(cancel) = self.current_run() else {
            debug!(op = kind.as_str(), "trigger ignored, keep-alive not active");
            return false;
        };
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = this.run_iteration(kind) => {}
            }
        });
        true
    }

    /// Renew if needed, then keep-alive. Used before a critical operation.
    pub async fn perform_emergency_session_check(&self) -> bool {
        if self.should_renew_token() && !self.perform_token_renewal().await {
            warn!("emergency session check: renewal failed");
            return false;
        }
        if !self.perform_keep_alive().await {
            warn!("emergency session check: keep-alive failed");
            return false;
        }
        self.failures.lock().reset();
        debug!("emergency session check passed");
        true
    }

    /// Run keep-alive and renewal right now, staggered so both serialize on
    /// the network guard.
    pub async fn force_execute_both(&self) -> (bool, bool) {
        info!("forcing keep-alive and renewal");
        staggered(self.perform_keep_alive(), self.perform_token_renewal(), self.policy.stagger_delay)
            .await
    }

    pub fn on_app_goes_to_background(self: &Arc<Self>) {
        let mode = {
            let mut tracker = self.tracker.lock();
            tracker.enter_background(Instant::now(), epoch_ms() as i64);
            tracker.mode()
        };
        self.mode_tx.send_replace(mode);
        self.failures.lock().reset();
        if let Some(generation) = self.current_generation() {
            self.restart_loops(generation);
        }
        info!(mode = mode.as_str(), "app moved to background");
    }

    /// Return to foreground: re-validate, restart loops, then one immediate
    /// keep-alive and renewal check. Returns whether the session is healthy.
    pub async fn on_app_comes_to_foreground(self: &Arc<Self>) -> bool {
        let away_ms = self.tracker.lock().enter_foreground(epoch_ms() as i64);
        self.mode_tx.send_replace(BackgroundMode::Foreground);
        self.failures.lock().reset();

        let Some(generation) = self.current_generation() else {
            debug!("app returned to foreground, keep-alive not active");
            return !self.is_session_expired();
        };

        let away_ms = away_ms.unwrap_or(0);
        info!(away_ms, "app returned to foreground");
        let valid = self.validate_session_after_background(away_ms).await;

        // Stopped or restarted while validating: that run owns the loops now.
        if !self.restart_loops(generation) {
            debug!("keep-alive stopped during foreground validation");
            return valid && !self.is_session_expired();
        }
        if !valid {
            // Renewal already applied the class ceilings; the loops retry.
            warn!("session not validated after background");
            return false;
        }

        self.perform_keep_alive().await;
        if self.should_renew_token() {
            self.perform_token_renewal().await;
        }
        !self.is_session_expired()
    }

    /// Decide whether a session survived `away_ms` in background.
    ///
    /// Negative or implausibly large durations are clock artifacts and count
    /// as valid. Within the ceiling nothing needs checking. Beyond it, the
    /// token is renewed if needed and the session is invalid only if that
    /// renewal fails.
    pub async fn validate_session_after_background(&self, away_ms: i64) -> bool {
        let max_ms = i64::try_from(self.policy.max_background_duration.as_millis())
            .unwrap_or(i64::MAX);
        if away_ms < 0 || away_ms > max_ms.saturating_mul(10) {
            warn!(away_ms, max_ms, "implausible background duration, ignoring");
            return true;
        }
        if away_ms <= max_ms {
            return true;
        }

        info!(away_ms, max_ms, "long background stay, re-validating session");
        if self.should_renew_token() && !self.perform_token_renewal().await {
            return false;
        }
        if !self.perform_keep_alive().await {
            warn!("keep-alive after long background failed");
        }
        true
    }

    /// Clear the expired signal, e.g. after a fresh login.
    pub fn reset_session_expired_event(&self) {
        self.expired_tx.send_replace(false);
    }

    // -- Primitives -----------------------------------------------------------

    /// Ping the backend to keep the server-side session alive. Never fails;
    /// returns false on any error and while in failure cool-down.
    pub async fn perform_keep_alive(&self) -> bool {
        let _held = self.guard.acquire().await;

        let force_refresh = {
            let failures = self.failures.lock();
            if failures.in_backoff(
                Instant::now(),
                self.policy.max_consecutive_failures,
                self.policy.retry_cooldown,
            ) {
                debug!(failures = failures.count(), "keep-alive skipped during cool-down");
                return false;
            }
            failures.count() > 0
        };

        match self.ping(force_refresh).await {
            Ok(()) => {
                self.failures.lock().reset();
                self.stats.lock().last_keep_alive_ms = Some(epoch_ms());
                let promoted = self.tracker.lock().check_deep_background(Instant::now());
                if promoted {
                    self.mode_tx.send_replace(BackgroundMode::DeepBackground);
                    info!("entering deep background, polling less often");
                }
                debug!("keep-alive ok");
                true
            }
            Err(e) => {
                let mut failures = self.failures.lock();
                failures.record_failure(Instant::now());
                warn!(failures = failures.count(), err = %e, "keep-alive failed");
                false
            }
        }
    }

    async fn ping(&self, force_refresh: bool) -> anyhow::Result<()> {
        let pair = self.headers.csrf_and_cookie(force_refresh).await?;
        let resp = self.keep_alive.ping(&pair).await?;
        if !resp.is_success() {
            anyhow::bail!("keep-alive rejected ({})", resp.status);
        }
        Ok(())
    }

    /// Classify the token's remaining lifetime. No side effects.
    pub fn renewal_urgency(&self) -> RenewalUrgency {
        renewal_urgency(
            self.store.token_expiration(),
            epoch_ms(),
            self.policy.critical_window,
            self.policy.advisory_window,
        )
    }

    /// Whether the token should be renewed now. Emits advisory notices.
    pub fn should_renew_token(&self) -> bool {
        let urgency = self.renewal_urgency();
        match urgency {
            RenewalUrgency::Unknown => debug!("token expiration unknown, renewal required"),
            RenewalUrgency::Expired => warn!("token already expired"),
            RenewalUrgency::Critical { remaining_ms } => {
                warn!(remaining_ms, "token expiry critical");
                let _ = self.notice_tx.send(SessionNotice::TokenCritical { remaining_ms });
            }
            RenewalUrgency::Advisory { remaining_ms } => {
                info!(remaining_ms, "token expires soon");
                let _ = self.notice_tx.send(SessionNotice::TokenExpiringSoon { remaining_ms });
            }
            RenewalUrgency::Fresh { .. } => {}
        }
        urgency.needs_renewal()
    }

    /// Renew the token and persist the merged user record.
    ///
    /// Authentication failures expire the session at once. Other classes are
    /// tolerated until their consecutive-failure ceiling is reached.
    pub async fn perform_token_renewal(&self) -> bool {
        let _held = self.guard.acquire().await;

        let Some(refresh_token) = self.store.refresh_token().filter(|t| !t.trim().is_empty())
        else {
            self.expire_session("no refresh-capable token");
            return false;
        };

        let now = epoch_ms();
        let grace_ms = self.policy.expiry_grace.as_millis() as u64;
        if let Some(expiration) = self.store.token_expiration() {
            if now > expiration.saturating_add(grace_ms) {
                self.expire_session("token expired beyond grace period");
                return false;
            }
        }

        self.stats.lock().last_attempt_ms = Some(now);
        let force_refresh = self.failures.lock().count() > 0;
        let result = match self.headers.csrf_and_cookie(force_refresh).await {
            Ok(pair) => self.renewal.renew(&pair, &refresh_token).await,
            Err(e) => Err(RenewalError::message(format!("csrf fetch failed: {e:#}"))),
        };

        let result = result.and_then(|renewed| {
            let merged = self.store.user().unwrap_or_default().merge_renewed(renewed);
            self.store
                .set_user(merged.clone())
                .map_err(|e| RenewalError::message(format!("failed to persist user: {e:#}")))?;
            Ok(merged)
        });

        match result {
            Ok(user) => {
                self.stats.lock().success_count += 1;
                self.streak.lock().reset();
                if let Some(token) = user.token {
                    self.state_tx.send_replace(SessionState::Authenticated(token));
                }
                info!(expires_at_ms = ?user.token_expiration, "token renewed");
                true
            }
            Err(err) => {
                self.on_renewal_failure(&err);
                false
            }
        }
    }

    fn on_renewal_failure(&self, err: &RenewalError) {
        self.stats.lock().failure_count += 1;
        let kind = classify(err);
        if kind.is_transient() {
            self.failures.lock().record_failure(Instant::now());
        }
        let escalation = self.streak.lock().record(kind, &self.policy.ceilings);
        match escalation {
            Escalation::Expire => {
                error!(kind = %kind, err = %err, "renewal failure is unrecoverable");
                self.expire_session(&format!("{kind} failure: {err}"));
            }
            Escalation::Tolerate { count, ceiling } => {
                warn!(kind = %kind, count, ceiling, err = %err, "renewal failed, keeping session");
                let _ = self
                    .notice_tx
                    .send(SessionNotice::RenewalFailed { kind, message: err.to_string() });
            }
        }
    }

    /// Mark the session unrecoverable and stop. The signal fires once.
    fn expire_session(&self, reason: &str) {
        self.state_tx.send_replace(SessionState::TokenExpired);
        let already = self.expired_tx.send_replace(true);
        if !already {
            error!(reason, "session expired");
            let _ = self
                .notice_tx
                .send(SessionNotice::SessionExpired { reason: reason.to_owned() });
        }
        self.stop();
    }

    // -- Loops ----------------------------------------------------------------

    /// Start a new run, cancelling any previous one, and mark the controller
    /// active.
    fn begin_run(self: &Arc<Self>) {
        let mut run = self.run.lock();
        if let Some(prev) = run.cancel.take() {
            prev.cancel();
        }
        run.generation += 1;
        run.cancel = Some(self.spawn_loops());
        self.active_tx.send_replace(true);
    }

    /// Replace the loops of run `generation` so they pick up the current
    /// intervals. Returns false if that run was stopped or replaced.
    fn restart_loops(self: &Arc<Self>, generation: u64) -> bool {
        let mut run = self.run.lock();
        if run.generation != generation {
            return false;
        }
        let Some(prev) = run.cancel.take() else {
            return false;
        };
        prev.cancel();
        run.cancel = Some(self.spawn_loops());
        true
    }

    /// Spawn both loops under a fresh child token. Each loop waits the
    /// startup delay before its first iteration.
    fn spawn_loops(self: &Arc<Self>) -> CancellationToken {
        let cancel = self.shutdown.child_token();
        tokio::spawn(Arc::clone(self).run_loop(LoopKind::KeepAlive, cancel.clone()));
        tokio::spawn(Arc::clone(self).run_loop(LoopKind::Renewal, cancel.clone()));
        cancel
    }

    async fn run_loop(self: Arc<Self>, kind: LoopKind, cancel: CancellationToken) {
        debug!(loop_name = kind.as_str(), "loop started");
        let mut delay = self.policy.startup_delay;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            let iteration = AssertUnwindSafe(self.run_iteration(kind)).catch_unwind();
            let outcome = tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = iteration => outcome,
            };

            delay = match outcome {
                Ok(()) => self.interval(kind),
                Err(_) => {
                    error!(loop_name = kind.as_str(), "loop iteration panicked, backing off");
                    self.policy.loop_error_backoff
                }
            };
        }
        debug!(loop_name = kind.as_str(), "loop stopped");
    }

    async fn run_iteration(&self, kind: LoopKind) {
        match kind {
            LoopKind::KeepAlive => {
                self.perform_keep_alive().await;
            }
            LoopKind::Renewal => {
                if self.should_renew_token() {
                    self.perform_token_renewal().await;
                }
            }
        }
    }

    fn interval(&self, kind: LoopKind) -> std::time::Duration {
        let mode = self.mode();
        match kind {
            LoopKind::KeepAlive => self.policy.keep_alive.for_mode(mode),
            LoopKind::Renewal => self.policy.renewal_check.for_mode(mode),
        }
    }

    fn current_run(&self) -> Option<CancellationToken> {
        self.run.lock().cancel.clone()
    }

    /// Generation of the live run, `None` while stopped.
    fn current_generation(&self) -> Option<u64> {
        let run = self.run.lock();
        run.cancel.as_ref().map(|_| run.generation)
    }

    // -- Observables ----------------------------------------------------------

    pub fn is_keep_alive_active(&self) -> bool {
        *self.active_tx.borrow()
    }

    pub fn subscribe_active(&self) -> watch::Receiver<bool> {
        self.active_tx.subscribe()
    }

    pub fn mode(&self) -> BackgroundMode {
        self.tracker.lock().mode()
    }

    pub fn is_in_background(&self) -> bool {
        self.tracker.lock().is_in_background()
    }

    pub fn is_in_deep_background(&self) -> bool {
        self.tracker.lock().is_in_deep_background()
    }

    pub fn subscribe_mode(&self) -> watch::Receiver<BackgroundMode> {
        self.mode_tx.subscribe()
    }

    pub fn session_state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn is_session_expired(&self) -> bool {
        *self.expired_tx.borrow()
    }

    /// Edge-triggered signal: flips to true once when the session is lost.
    pub fn session_expired_event(&self) -> watch::Receiver<bool> {
        self.expired_tx.subscribe()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<SessionNotice> {
        self.notice_tx.subscribe()
    }

    pub fn last_keep_alive_time(&self) -> Option<u64> {
        self.stats.lock().last_keep_alive_ms
    }

    pub fn token_expiration(&self) -> Option<u64> {
        self.store.token_expiration()
    }

    /// Whether a non-blank token is stored.
    pub fn has_token(&self) -> bool {
        self.store.token().is_some_and(|t| !t.trim().is_empty())
    }

    pub fn token_renewal_success_count(&self) -> u64 {
        self.stats.lock().success_count
    }

    pub fn token_renewal_failure_count(&self) -> u64 {
        self.stats.lock().failure_count
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures.lock().count()
    }

    pub fn health_report(&self) -> SessionHealthReport {
        let token_expiration_ms = self.store.token_expiration();
        let now = epoch_ms();
        SessionHealthReport {
            active: self.is_keep_alive_active(),
            mode: self.mode(),
            state: self.session_state().as_str(),
            session_expired: self.is_session_expired(),
            consecutive_failures: self.consecutive_failures(),
            stats: self.stats.lock().clone(),
            token_expiration_ms,
            token_expires_in_ms: token_expiration_ms
                .and_then(|exp| exp.checked_sub(now))
                .filter(|ms| *ms > 0),
        }
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
