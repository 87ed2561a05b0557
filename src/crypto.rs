//! Password hashing.

use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;

use crate::config::Argon2 as ArgonConfig;

type Result<T> = std::result::Result<T, CryptoError>;

#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    #[error("argon2 error: {0}")]
    Argon2(String),
}

/// Argon2id password manager.
pub struct PasswordManager {
    argon2: Argon2<'static>,
}

impl PasswordManager {
    /// Create a new [`PasswordManager`].
    pub fn new(config: Option<ArgonConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();
        let params = Params::new(
            config.memory_cost,
            config.iterations,
            config.parallelism,
            Some(config.hash_length),
        )
        .map_err(|err| CryptoError::Argon2(err.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a password into a PHC string.
    pub fn hash_password(&self, password: impl AsRef<[u8]>) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Ok(self
            .argon2
            .hash_password(password.as_ref(), &salt)
            .map_err(|err| CryptoError::Argon2(err.to_string()))?
            .to_string())
    }

    /// Check a password against a stored PHC string.
    ///
    /// Returns `Ok(false)` on mismatch, `Err` only when the stored hash
    /// cannot be parsed.
    pub fn verify_password(
        &self,
        password: impl AsRef<[u8]>,
        stored: &str,
    ) -> Result<bool> {
        let hash = PasswordHash::new(stored)
            .map_err(|err| CryptoError::Argon2(err.to_string()))?;

        Ok(self
            .argon2
            .verify_password(password.as_ref(), &hash)
            .is_ok())
    }
}
