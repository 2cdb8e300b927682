//! Password hashing and verification.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Argon2, Params,
};

use crate::config::PasswordConfig;
use crate::error::AuthError;

/// One-way salted password hasher.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    /// Argon2 hasher configuration.
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    /// Create a new hasher with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }

    /// Create a hasher from configuration.
    ///
    /// Falls back to default parameters if the configured values are
    /// rejected by argon2.
    #[must_use]
    pub fn from_config(config: &PasswordConfig) -> Self {
        Params::new(
            config.memory_cost,
            config.time_cost,
            config.parallelism,
            Some(config.hash_length),
        )
        .map_or_else(
            |e| {
                tracing::warn!(error = %e, "invalid argon2 parameters, using defaults");
                Self::new()
            },
            |params| Self {
                argon2: Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params),
            },
        )
    }

    /// Hash a password with a freshly generated salt.
    ///
    /// # Errors
    ///
    /// Returns an internal error if hashing fails.
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                tracing::error!(error = %e, "password hashing failed");
                AuthError::Internal("password hashing failed")
            })
    }

    /// Verify a password against a stored hash.
    ///
    /// An unparseable stored hash verifies as `false` rather than erroring.
    #[must_use]
    pub fn verify(&self, password: &str, stored_hash: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(stored_hash) else {
            return false;
        };
        self.argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}
