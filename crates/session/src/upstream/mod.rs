// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Collaborators the session controller talks to.
//!
//! The controller never owns token storage or transport. It reads credentials
//! through [`CredentialStore`], obtains the per-session antiforgery pair from
//! [`SessionHeaderProvider`], and calls the backend through
//! [`KeepAliveEndpoint`] and [`RenewalEndpoint`]. All traits are object-safe
//! so they can be held as `Arc<dyn ...>`.

pub mod client;

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::session::classify::RenewalError;

/// Boxed future returned by collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Authenticated user as persisted by the credential store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_preferences_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Token expiry as epoch millis. `None` means unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expiration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// User record returned by the renewal endpoint. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewedUser {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub business_id: Option<String>,
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub system_owner_id: Option<String>,
    #[serde(default)]
    pub user_preferences_id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_expiration: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl UserRecord {
    /// Merge a renewal response into this record.
    ///
    /// Fields present in the response win; absent fields keep the prior value.
    pub fn merge_renewed(&self, renewed: RenewedUser) -> UserRecord {
        UserRecord {
            user_id: renewed.user_id.or_else(|| self.user_id.clone()),
            username: renewed.username.or_else(|| self.username.clone()),
            business_id: renewed.business_id.or_else(|| self.business_id.clone()),
            site_id: renewed.site_id.or_else(|| self.site_id.clone()),
            system_owner_id: renewed.system_owner_id.or_else(|| self.system_owner_id.clone()),
            user_preferences_id: renewed
                .user_preferences_id
                .or_else(|| self.user_preferences_id.clone()),
            token: renewed.token.or_else(|| self.token.clone()),
            token_expiration: renewed.token_expiration.or(self.token_expiration),
            refresh_token: renewed.refresh_token.or_else(|| self.refresh_token.clone()),
        }
    }
}

/// Per-session antiforgery token and cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfPair {
    pub csrf: String,
    pub cookie: String,
}

/// Holds the current token, its expiry, and the authenticated user.
///
/// Implementations serialize their own access; the controller may call these
/// from any task.
pub trait CredentialStore: Send + Sync {
    fn token(&self) -> Option<String>;

    /// Token expiry as epoch millis, `None` when unknown.
    fn token_expiration(&self) -> Option<u64>;

    fn user(&self) -> Option<UserRecord>;

    fn set_user(&self, user: UserRecord) -> anyhow::Result<()>;

    fn refresh_token(&self) -> Option<String>;

    fn clear(&self) -> anyhow::Result<()>;
}

/// Supplies the CSRF token and antiforgery cookie pair.
pub trait SessionHeaderProvider: Send + Sync {
    /// Return the current pair, fetching a new one when `force_refresh` is set
    /// or nothing is cached. Fails if upstream CSRF retrieval fails.
    fn csrf_and_cookie(&self, force_refresh: bool) -> BoxFuture<'_, anyhow::Result<CsrfPair>>;
}

/// Outcome of a keep-alive ping that reached the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingResponse {
    pub status: u16,
}

impl PingResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Server-side session activity ping.
pub trait KeepAliveEndpoint: Send + Sync {
    fn ping<'a>(&'a self, headers: &'a CsrfPair) -> BoxFuture<'a, anyhow::Result<PingResponse>>;
}

/// Exchanges a refresh-capable credential for an extended token.
pub trait RenewalEndpoint: Send + Sync {
    fn renew<'a>(
        &'a self,
        headers: &'a CsrfPair,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<RenewedUser, RenewalError>>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
