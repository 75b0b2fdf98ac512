// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn prior() -> UserRecord {
    UserRecord {
        user_id: Some("u-1".to_owned()),
        username: Some("driver".to_owned()),
        business_id: Some("biz-1".to_owned()),
        site_id: Some("site-1".to_owned()),
        system_owner_id: Some("owner-1".to_owned()),
        user_preferences_id: Some("prefs-1".to_owned()),
        token: Some("old-token".to_owned()),
        token_expiration: Some(1_000),
        refresh_token: Some("refresh".to_owned()),
    }
}

#[test]
fn merge_preserves_site_id_when_absent() {
    let renewed = RenewedUser {
        token: Some("new-token".to_owned()),
        token_expiration: Some(9_000),
        ..Default::default()
    };
    let merged = prior().merge_renewed(renewed);
    assert_eq!(merged.site_id.as_deref(), Some("site-1"));
    assert_eq!(merged.business_id.as_deref(), Some("biz-1"));
    assert_eq!(merged.system_owner_id.as_deref(), Some("owner-1"));
    assert_eq!(merged.user_preferences_id.as_deref(), Some("prefs-1"));
    assert_eq!(merged.token.as_deref(), Some("new-token"));
    assert_eq!(merged.token_expiration, Some(9_000));
    assert_eq!(merged.refresh_token.as_deref(), Some("refresh"));
}

#[test]
fn merge_overwrites_site_id_when_present() {
    let renewed = RenewedUser { site_id: Some("site-2".to_owned()), ..Default::default() };
    let merged = prior().merge_renewed(renewed);
    assert_eq!(merged.site_id.as_deref(), Some("site-2"));
    assert_eq!(merged.token.as_deref(), Some("old-token"));
}

#[test]
fn renewed_user_parses_partial_camel_case() -> anyhow::Result<()> {
    let renewed: RenewedUser = serde_json::from_str(
        r#"{"token":"t","tokenExpiration":42,"businessId":"b","unexpected":true}"#,
    )?;
    assert_eq!(renewed.token.as_deref(), Some("t"));
    assert_eq!(renewed.token_expiration, Some(42));
    assert_eq!(renewed.business_id.as_deref(), Some("b"));
    assert!(renewed.site_id.is_none());
    Ok(())
}

#[yare::parameterized(
    ok          = { 200, true },
    no_content  = { 204, true },
    redirect    = { 302, false },
    unauthorized = { 401, false },
    server      = { 503, false },
)]
fn ping_response_success(status: u16, expected: bool) {
    assert_eq!(PingResponse { status }.is_success(), expected);
}
