//! HS256 token issuance and verification.
//!
//! The authority is built once at startup from the process-wide secret and
//! shared read-only (behind an `Arc`) by every request handler.  There is no
//! key rotation: replacing the secret invalidates every token issued under
//! the old one, immediately and without a grace period.
//!
//! # Time handling
//!
//! `jsonwebtoken` normally validates `exp` against its own clock with a
//! default leeway.  That check is disabled here and replaced with an explicit
//! comparison against a caller-supplied `now`, so [`TokenAuthority::verify_at`]
//! is a pure function of (token, secret, now) and the expiry boundary is
//! exact: a token is rejected at `now == exp`.

use std::time::Duration;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use tracing::debug;

use super::{unix_now, Claims};
use crate::{RoleSet, UserId};

/// Validity window applied to newly issued tokens unless configured otherwise.
pub const DEFAULT_TOKEN_VALIDITY: Duration = Duration::from_secs(24 * 60 * 60);

/// Error type for token operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Signing failed; no token was produced.
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    /// The token failed verification.  Bad signature, wrong algorithm,
    /// malformed claims and expiry all map here so callers cannot tell which
    /// check failed.
    #[error("token expired or invalid")]
    Invalid,

    /// A window under one second would issue tokens with `exp == iat`, which
    /// never verify.
    #[error("token validity must be at least one second")]
    EmptyValidity,
}

/// Issues and verifies signed session tokens.
pub struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    validity: Duration,
}

impl TokenAuthority {
    /// Creates an authority signing with `secret` and issuing tokens valid
    /// for `validity`.  Sub-second parts of `validity` are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::EmptyValidity`] if `validity` is under one second.
    pub fn new(secret: impl AsRef<[u8]>, validity: Duration) -> Result<Self, TokenError> {
        if validity.as_secs() == 0 {
            return Err(TokenError::EmptyValidity);
        }
        let secret = secret.as_ref();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            validity,
        })
    }

    /// Issues a token for the subject, valid from now for the configured window.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if the token cannot be signed.
    pub fn issue(&self, user_id: UserId, email: &str, roles: &RoleSet) -> Result<String, TokenError> {
        self.issue_at(user_id, email, roles, unix_now())
    }

    /// Issues a token as if the current time were `now` (Unix seconds).
    pub fn issue_at(
        &self,
        user_id: UserId,
        email: &str,
        roles: &RoleSet,
        now: u64,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            user_id,
            email: email.to_string(),
            roles: roles.clone(),
            iat: now,
            exp: now.saturating_add(self.validity.as_secs()),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)
    }

    /// Verifies `token` against the current time.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Invalid`] for any verification failure.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, unix_now())
    }

    /// Verifies `token` as if the current time were `now` (Unix seconds).
    pub fn verify_at(&self, token: &str, now: u64) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            debug!("token rejected: {e}");
            TokenError::Invalid
        })?;
        let claims = data.claims;

        if claims.exp <= claims.iat {
            debug!("token rejected: empty validity window");
            return Err(TokenError::Invalid);
        }
        if now >= claims.exp {
            debug!("token rejected: expired at {} (now {now})", claims.exp);
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }
}

impl core::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("secret", &"<redacted>")
            .field("validity", &self.validity)
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
