// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    unauthorized = { ErrorCode::Unauthorized, StatusCode::UNAUTHORIZED, "UNAUTHORIZED" },
    bad_request = { ErrorCode::BadRequest, StatusCode::BAD_REQUEST, "BAD_REQUEST" },
    not_authenticated = { ErrorCode::NotAuthenticated, StatusCode::CONFLICT, "NOT_AUTHENTICATED" },
    session_expired = { ErrorCode::SessionExpired, StatusCode::GONE, "SESSION_EXPIRED" },
    internal = { ErrorCode::Internal, StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL" },
)]
fn status_and_code(code: ErrorCode, status: StatusCode, name: &str) {
    assert_eq!(code.status(), status);
    assert_eq!(code.as_str(), name);
    assert_eq!(code.to_string(), name);
}

#[test]
fn envelope_carries_code_and_message() -> anyhow::Result<()> {
    let err = ErrorCode::SessionExpired.with_message("gone");
    let json = serde_json::to_value(err.envelope())?;
    assert_eq!(json["error"]["code"], "SESSION_EXPIRED");
    assert_eq!(json["error"]["message"], "gone");
    Ok(())
}

#[test]
fn response_uses_code_status() {
    let resp = ErrorCode::NotAuthenticated.with_message("no stored credentials").into_response();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}
