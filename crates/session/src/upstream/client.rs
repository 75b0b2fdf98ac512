// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the fleet backend's session endpoints.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::header::{HeaderMap, SET_COOKIE};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::session::classify::RenewalError;
use crate::upstream::{
    BoxFuture, CredentialStore, CsrfPair, KeepAliveEndpoint, PingResponse, RenewalEndpoint,
    RenewedUser, SessionHeaderProvider,
};

/// Header carrying the antiforgery token on mutating requests.
pub const CSRF_HEADER: &str = "X-CSRF-TOKEN";

/// Backend paths, relative to the base URL.
#[derive(Debug, Clone)]
pub struct EndpointPaths {
    pub csrf: String,
    pub keep_alive: String,
    pub renew: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            csrf: "/api/antiforgery/token".to_owned(),
            keep_alive: "/api/session/keepalive".to_owned(),
            renew: "/api/authentication/renew".to_owned(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CsrfResponse {
    #[serde(alias = "csrfToken", alias = "requestToken")]
    token: String,
}

/// reqwest-backed header provider, keep-alive, and renewal endpoint.
///
/// The CSRF/cookie pair is cached until a caller forces a refresh. Requests
/// carry the current bearer token from the credential store.
pub struct BackendClient {
    base_url: String,
    paths: EndpointPaths,
    store: Arc<dyn CredentialStore>,
    client: Client,
    cached: Mutex<Option<CsrfPair>>,
}

impl BackendClient {
    pub fn new(
        base_url: String,
        paths: EndpointPaths,
        store: Arc<dyn CredentialStore>,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap_or_else(|_| Client::new());
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            paths,
            store,
            client,
            cached: Mutex::new(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.store.token() {
            Some(token) if !token.is_empty() => req.bearer_auth(token),
            _ => req,
        }
    }

    fn apply_csrf(req: reqwest::RequestBuilder, pair: &CsrfPair) -> reqwest::RequestBuilder {
        req.header(CSRF_HEADER, &pair.csrf).header(reqwest::header::COOKIE, &pair.cookie)
    }

    async fn fetch_csrf(&self) -> anyhow::Result<CsrfPair> {
        let req = self.client.get(self.url(&self.paths.csrf));
        let resp = self.apply_auth(req).send().await?.error_for_status()?;
        let cookie = cookie_header(resp.headers());
        let body: CsrfResponse = resp.json().await?;
        if cookie.is_empty() {
            anyhow::bail!("csrf response carried no antiforgery cookie");
        }
        Ok(CsrfPair { csrf: body.token, cookie })
    }
}

/// Collapse `Set-Cookie` headers into a `Cookie` header value.
pub fn cookie_header(headers: &HeaderMap) -> String {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

impl SessionHeaderProvider for BackendClient {
    fn csrf_and_cookie(&self, force_refresh: bool) -> BoxFuture<'_, anyhow::Result<CsrfPair>> {
        Box::pin(async move {
            if !force_refresh {
                if let Some(pair) = self.cached.lock().clone() {
                    return Ok(pair);
                }
            }
            debug!(force_refresh, "fetching csrf token");
            let pair = self.fetch_csrf().await?;
            *self.cached.lock() = Some(pair.clone());
            Ok(pair)
        })
    }
}

impl KeepAliveEndpoint for BackendClient {
    fn ping<'a>(&'a self, headers: &'a CsrfPair) -> BoxFuture<'a, anyhow::Result<PingResponse>> {
        Box::pin(async move {
            let req = self.client.post(self.url(&self.paths.keep_alive));
            let req = Self::apply_csrf(self.apply_auth(req), headers);
            let resp = req.send().await?;
            Ok(PingResponse { status: resp.status().as_u16() })
        })
    }
}

impl RenewalEndpoint for BackendClient {
    fn renew<'a>(
        &'a self,
        headers: &'a CsrfPair,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<RenewedUser, RenewalError>> {
        Box::pin(async move {
            let body = serde_json::json!({ "refreshToken": refresh_token });
            let req = self.client.post(self.url(&self.paths.renew)).json(&body);
            let req = Self::apply_csrf(self.apply_auth(req), headers);
            let resp = req.send().await.map_err(RenewalError::from_reqwest)?;

            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(RenewalError::status(status.as_u16(), text));
            }
            resp.json::<RenewedUser>()
                .await
                .map_err(|e| RenewalError::message(format!("invalid renewal response: {e}")))
        })
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
