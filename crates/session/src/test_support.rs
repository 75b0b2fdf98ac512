// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: a scriptable fake backend, builders, and
//! assertion helpers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::credential::MemoryCredentialStore;
use crate::session::classify::RenewalError;
use crate::session::controller::{Collaborators, SessionController};
use crate::session::mode::IntervalTiers;
use crate::session::{epoch_ms, SessionPolicy};
use crate::upstream::{
    BoxFuture, CredentialStore, CsrfPair, KeepAliveEndpoint, PingResponse, RenewalEndpoint,
    RenewedUser, SessionHeaderProvider, UserRecord,
};

/// Scripted result of a keep-alive ping.
#[derive(Debug, Clone)]
pub enum PingScript {
    Status(u16),
    Error(String),
    Panic,
}

/// Fake backend implementing every network collaborator.
///
/// Results are popped from per-call queues, falling back to a default.
/// Call counters and an in-flight peak let tests assert serialization.
pub struct FakeBackend {
    pub csrf_calls: AtomicU32,
    pub forced_csrf_calls: AtomicU32,
    pub ping_calls: AtomicU32,
    pub renew_calls: AtomicU32,
    pub csrf_fails: AtomicBool,
    in_flight: AtomicU32,
    peak_in_flight: AtomicU32,
    call_delay: Mutex<Duration>,
    ping_queue: Mutex<VecDeque<PingScript>>,
    ping_default: Mutex<PingScript>,
    renew_queue: Mutex<VecDeque<Result<RenewedUser, RenewalError>>>,
    renew_default: Mutex<Option<Result<RenewedUser, RenewalError>>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            csrf_calls: AtomicU32::new(0),
            forced_csrf_calls: AtomicU32::new(0),
            ping_calls: AtomicU32::new(0),
            renew_calls: AtomicU32::new(0),
            csrf_fails: AtomicBool::new(false),
            in_flight: AtomicU32::new(0),
            peak_in_flight: AtomicU32::new(0),
            call_delay: Mutex::new(Duration::ZERO),
            ping_queue: Mutex::new(VecDeque::new()),
            ping_default: Mutex::new(PingScript::Status(200)),
            renew_queue: Mutex::new(VecDeque::new()),
            renew_default: Mutex::new(None),
        }
    }

    pub fn pings(&self) -> u32 {
        self.ping_calls.load(Ordering::SeqCst)
    }

    pub fn renewals(&self) -> u32 {
        self.renew_calls.load(Ordering::SeqCst)
    }

    pub fn csrf_fetches(&self) -> u32 {
        self.csrf_calls.load(Ordering::SeqCst)
    }

    pub fn forced_csrf_fetches(&self) -> u32 {
        self.forced_csrf_calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> u32 {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Make every network call take `delay`.
    pub fn set_call_delay(&self, delay: Duration) {
        *self.call_delay.lock() = delay;
    }

    pub fn set_ping_default(&self, script: PingScript) {
        *self.ping_default.lock() = script;
    }

    pub fn push_ping(&self, script: PingScript) {
        self.ping_queue.lock().push_back(script);
    }

    /// Default renewal result. `None` answers with [`renewed_user`].
    pub fn set_renew_default(&self, result: Option<Result<RenewedUser, RenewalError>>) {
        *self.renew_default.lock() = result;
    }

    pub fn push_renew(&self, result: Result<RenewedUser, RenewalError>) {
        self.renew_queue.lock().push_back(result);
    }

    async fn network_call(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.call_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SessionHeaderProvider for FakeBackend {
    fn csrf_and_cookie(&self, force_refresh: bool) -> BoxFuture<'_, anyhow::Result<CsrfPair>> {
        Box::pin(async move {
            self.csrf_calls.fetch_add(1, Ordering::SeqCst);
            if force_refresh {
                self.forced_csrf_calls.fetch_add(1, Ordering::SeqCst);
            }
            if self.csrf_fails.load(Ordering::SeqCst) {
                anyhow::bail!("csrf endpoint returned 503");
            }
            Ok(CsrfPair { csrf: "csrf-token".to_owned(), cookie: "antiforgery=abc".to_owned() })
        })
    }
}

impl KeepAliveEndpoint for FakeBackend {
    fn ping<'a>(&'a self, _headers: &'a CsrfPair) -> BoxFuture<'a, anyhow::Result<PingResponse>> {
        Box::pin(async move {
            self.ping_calls.fetch_add(1, Ordering::SeqCst);
            let script =
                self.ping_queue.lock().pop_front().unwrap_or_else(|| self.ping_default.lock().clone());
            self.network_call().await;
            match script {
                PingScript::Status(status) => Ok(PingResponse { status }),
                PingScript::Error(msg) => Err(anyhow::anyhow!(msg)),
                #[allow(clippy::panic)]
                PingScript::Panic => panic!("scripted keep-alive panic"),
            }
        })
    }
}

impl RenewalEndpoint for FakeBackend {
    fn renew<'a>(
        &'a self,
        _headers: &'a CsrfPair,
        _refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<RenewedUser, RenewalError>> {
        Box::pin(async move {
            self.renew_calls.fetch_add(1, Ordering::SeqCst);
            let scripted = self.renew_queue.lock().pop_front();
            self.network_call().await;
            match scripted {
                Some(result) => result,
                None => self.renew_default.lock().clone().unwrap_or_else(|| Ok(renewed_user())),
            }
        })
    }
}

/// A renewal response carrying a new token valid for one hour.
pub fn renewed_user() -> RenewedUser {
    RenewedUser {
        token: Some("renewed-token".to_owned()),
        token_expiration: Some(epoch_ms() + 3_600_000),
        ..Default::default()
    }
}

/// A logged-in user whose token expires `expires_in` from now.
pub fn logged_in_user(expires_in: Duration) -> UserRecord {
    UserRecord {
        user_id: Some("user-1".to_owned()),
        username: Some("driver@fleet".to_owned()),
        business_id: Some("business-1".to_owned()),
        site_id: Some("site-1".to_owned()),
        system_owner_id: Some("owner-1".to_owned()),
        user_preferences_id: Some("prefs-1".to_owned()),
        token: Some("token-1".to_owned()),
        token_expiration: Some(epoch_ms() + expires_in.as_millis() as u64),
        refresh_token: Some("refresh-1".to_owned()),
    }
}

/// Policy for tests: loops never fire on their own unless a test shortens
/// the startup delay.
pub fn test_policy() -> SessionPolicy {
    SessionPolicy {
        keep_alive: IntervalTiers {
            foreground: Duration::from_secs(60),
            background: Duration::from_secs(120),
            deep_background: Duration::from_secs(240),
        },
        renewal_check: IntervalTiers {
            foreground: Duration::from_secs(60),
            background: Duration::from_secs(120),
            deep_background: Duration::from_secs(240),
        },
        startup_delay: Duration::from_secs(3600),
        deep_background_threshold: Duration::from_secs(1800),
        max_consecutive_failures: 3,
        retry_cooldown: Duration::from_secs(300),
        critical_window: Duration::from_secs(300),
        advisory_window: Duration::from_secs(900),
        expiry_grace: Duration::from_secs(60),
        max_background_duration: Duration::from_secs(3600),
        ceilings: Default::default(),
        loop_error_backoff: Duration::from_millis(50),
        stagger_delay: Duration::from_millis(5),
        offline_max_attempts: 3,
    }
}

/// Builder for a controller wired to a [`FakeBackend`] and a memory store.
pub struct ControllerBuilder {
    policy: SessionPolicy,
    user: Option<UserRecord>,
    backend: Arc<FakeBackend>,
    shutdown: CancellationToken,
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerBuilder {
    pub fn new() -> Self {
        Self {
            policy: test_policy(),
            user: Some(logged_in_user(Duration::from_secs(3600))),
            backend: Arc::new(FakeBackend::new()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn policy(mut self, policy: SessionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn user(mut self, user: Option<UserRecord>) -> Self {
        self.user = user;
        self
    }

    pub fn backend(mut self, backend: Arc<FakeBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn build(self) -> TestHarness {
        let store = Arc::new(MemoryCredentialStore::new(self.user));
        let store_dyn: Arc<dyn CredentialStore> = store.clone();
        let collaborators = Collaborators {
            store: store_dyn,
            headers: self.backend.clone(),
            keep_alive: self.backend.clone(),
            renewal: self.backend.clone(),
        };
        let controller = SessionController::new(self.policy, collaborators, self.shutdown);
        TestHarness { controller, backend: self.backend, store }
    }
}

/// A built controller plus handles to its fakes.
pub struct TestHarness {
    pub controller: Arc<SessionController>,
    pub backend: Arc<FakeBackend>,
    pub store: Arc<MemoryCredentialStore>,
}

/// Convert any `Display` error into `anyhow::Error` (axum-test errors are
/// not `std::error::Error + Send + Sync`).
pub trait AnyhowExt<T> {
    fn anyhow(self) -> anyhow::Result<T>;
}

impl<T, E: std::fmt::Display> AnyhowExt<T> for Result<T, E> {
    fn anyhow(self) -> anyhow::Result<T> {
        self.map_err(|e| anyhow::anyhow!("{e}"))
    }
}

static CRYPTO_INIT: Once = Once::new();

/// Install the rustls crypto provider (reqwest needs it even on plain HTTP).
pub fn ensure_crypto_provider() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Poll `cond` every few millis until it holds or `timeout` elapses.
pub async fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Assert that an expression evaluates to `Err` whose Display output
/// contains the given substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
