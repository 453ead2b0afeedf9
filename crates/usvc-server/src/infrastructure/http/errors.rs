//! Consistent JSON error responses.
//!
//! Every failure leaves the API as `{"error": <code>, "message": <text>}`.
//! Internal failures are logged in full and answered with a fixed message.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{debug, error};

use crate::application::accounts::AccountError;

/// Everything an HTTP handler or the authorization gate can fail with.
#[derive(Debug)]
pub enum ApiError {
    /// No `Authorization` header.
    AuthenticationRequired,
    /// `Authorization` present but not `Bearer <token>`.
    InvalidAuthHeader,
    /// Bearer token failed verification.
    InvalidToken,
    /// Request body or path did not parse.  The parser detail is logged only.
    InvalidPayload,
    Account(AccountError),
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        Self::Account(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("request body rejected: {}", rejection.body_text());
        Self::InvalidPayload
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        debug!("request path rejected: {}", rejection.body_text());
        Self::InvalidPayload
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::AuthenticationRequired => {
                json_error(StatusCode::UNAUTHORIZED, "missing_auth", "missing auth")
            }
            ApiError::InvalidAuthHeader => json_error(
                StatusCode::UNAUTHORIZED,
                "invalid_auth_header",
                "invalid auth header",
            ),
            ApiError::InvalidToken => {
                json_error(StatusCode::UNAUTHORIZED, "invalid_token", "invalid token")
            }
            ApiError::InvalidPayload => {
                json_error(StatusCode::BAD_REQUEST, "validation_error", "invalid payload")
            }
            ApiError::Account(err) => account_error_to_response(err),
        }
    }
}

fn account_error_to_response(err: AccountError) -> Response {
    match err {
        AccountError::InvalidCredentials => json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "invalid credentials",
        ),
        AccountError::Forbidden(_) => json_error(StatusCode::FORBIDDEN, "forbidden", "forbidden"),
        e @ AccountError::NotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "not_found", e.to_string())
        }
        AccountError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        AccountError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        AccountError::Internal(detail) => {
            error!("request failed: {detail}");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal error",
            )
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
