//! Session tokens: claims model and the signing/verification authority.

pub mod authority;
pub mod claims;

pub use authority::{TokenAuthority, TokenError, DEFAULT_TOKEN_VALIDITY};
pub use claims::Claims;

/// Returns the current time as seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
