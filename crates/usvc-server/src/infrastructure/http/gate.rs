//! Authorization gate: bearer-token middleware for the `/api` routes.
//!
//! The gate only establishes identity.  On success the verified [`Claims`]
//! are stored in the extensions of the request being processed, and the
//! handler reads them with `Extension<Claims>`.  Per-operation role checks
//! happen in the account use cases.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::debug;
use usvc_core::{Claims, TokenAuthority};

use super::errors::ApiError;

/// Rejects the request unless it carries a valid `Authorization: Bearer` token.
pub async fn require_bearer(
    State(tokens): State<Arc<TokenAuthority>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = authenticate(&tokens, req.headers())?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Extracts and verifies the bearer token from `headers`.
pub fn authenticate(tokens: &TokenAuthority, headers: &HeaderMap) -> Result<Claims, ApiError> {
    let token = extract_bearer(headers)?;
    tokens.verify(token).map_err(|e| {
        debug!("bearer token rejected: {e}");
        ApiError::InvalidToken
    })
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(ApiError::AuthenticationRequired)?;
    let header = header.to_str().map_err(|_| ApiError::InvalidAuthHeader)?;

    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Ok(token),
        _ => Err(ApiError::InvalidAuthHeader),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
