//! One-way, salted password hashing (Argon2id).
//!
//! The hash is stored as a PHC string (`$argon2id$v=19$...`), which carries
//! its own salt and parameters, so verification needs nothing but the stored
//! value and the candidate password.

use argon2::password_hash::{
    PasswordHash as PhcHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use rand_core::OsRng;
use thiserror::Error;

/// Error type for password hashing.
#[derive(Debug, Error)]
pub enum PasswordError {
    /// The hashing primitive rejected its input or parameters.
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// A salted Argon2id password hash.
///
/// Neither `Serialize` nor a revealing `Debug` is implemented; the stored
/// string only leaves this type through [`PasswordHash::as_phc`], which the
/// storage layer uses for persistence.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hashes `raw` with a fresh random salt.
    ///
    /// # Errors
    ///
    /// Returns [`PasswordError::Hash`] if the Argon2 primitive fails.
    pub fn generate(raw: &str) -> Result<Self, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let phc = Argon2::default()
            .hash_password(raw.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hash(e.to_string()))?;
        Ok(Self(phc.to_string()))
    }

    /// Wraps a previously stored PHC string.
    pub fn from_phc(phc: impl Into<String>) -> Self {
        Self(phc.into())
    }

    pub fn as_phc(&self) -> &str {
        &self.0
    }

    /// Returns `true` if `raw` matches this hash.
    ///
    /// A stored value that does not parse as a PHC string never matches.
    pub fn verify(&self, raw: &str) -> bool {
        match PhcHash::new(&self.0) {
            Ok(parsed) => Argon2::default()
                .verify_password(raw.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::warn!("stored password hash is not a valid PHC string: {e}");
                false
            }
        }
    }
}

impl core::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_hash_verifies_original_password() {
        // Arrange
        let hash = PasswordHash::generate("hunter2").unwrap();

        // Act / Assert
        assert!(hash.verify("hunter2"));
    }

    #[test]
    fn test_generated_hash_rejects_other_password() {
        let hash = PasswordHash::generate("hunter2").unwrap();
        assert!(!hash.verify("hunter3"));
        assert!(!hash.verify(""));
    }

    #[test]
    fn test_hash_never_contains_plaintext() {
        let hash = PasswordHash::generate("plain-secret").unwrap();
        assert!(!hash.as_phc().contains("plain-secret"));
        assert!(hash.as_phc().starts_with("$argon2id$"));
    }

    #[test]
    fn test_same_password_gets_distinct_salts() {
        let a = PasswordHash::generate("same").unwrap();
        let b = PasswordHash::generate("same").unwrap();
        assert_ne!(a, b, "each hash must carry its own salt");
    }

    #[test]
    fn test_debug_output_is_redacted() {
        let hash = PasswordHash::generate("secret").unwrap();
        let debug = format!("{hash:?}");
        assert_eq!(debug, "PasswordHash(<redacted>)");
    }

    #[test]
    fn test_malformed_stored_hash_never_verifies() {
        let hash = PasswordHash::from_phc("not-a-phc-string");
        assert!(!hash.verify("anything"));
    }
}
