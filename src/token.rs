//! Access and refresh token issuance.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::ServerError;

/// Access token lifetime, in seconds.
pub const EXPIRATION_TIME: u64 = 3600; // 1 hour.
pub const TOKEN_TYPE: &str = "Bearer";

const REFRESH_TOKEN_BYTES: usize = 32;

/// Json Web Token payload as structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject of the JWT. User unique identifier.
    pub sub: String,
    /// Time after which the JWT expires.
    pub exp: u64,
    /// Issuer of the JWT.
    pub iss: String,
    /// Time at which the JWT was issued.
    pub iat: u64,
}

/// Signs and verifies access tokens.
#[derive(Clone)]
pub struct TokenManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
}

impl TokenManager {
    /// Create a new [`TokenManager`] from an HMAC secret.
    pub fn new(secret: impl AsRef<[u8]>, issuer: impl Into<String>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_ref()),
            decoding: DecodingKey::from_secret(secret.as_ref()),
            issuer: issuer.into(),
        }
    }

    /// Create a 1-hour access token for a user.
    pub fn create(&self, user_id: &str) -> Result<String, ServerError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| ServerError::Internal {
                details: err.to_string(),
            })?
            .as_secs();

        encode(
            &Header::new(Algorithm::HS256),
            &Claims {
                sub: user_id.to_owned(),
                exp: now + EXPIRATION_TIME,
                iss: self.issuer.clone(),
                iat: now,
            },
            &self.encoding,
        )
        .map_err(|err| ServerError::Internal {
            details: err.to_string(),
        })
    }

    /// Decode an access token and check its signature, expiry and issuer.
    pub fn decode(&self, token: &str) -> Result<Claims, ServerError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| ServerError::Unauthorized)
    }
}

/// Generate an opaque refresh token. The caller persists it.
pub fn refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
