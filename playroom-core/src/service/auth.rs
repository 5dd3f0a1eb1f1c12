//! JWT validation
//!
//! Only validation lives here; credential issuance and refresh are an
//! external concern. `sign` exists for tooling and tests.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{models::UserId, Error, Result};

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Name-identifier fallback some identity providers emit instead of `sub`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nameid: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// The subject claim, preferring `sub` and falling back to `nameid`.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.sub.as_deref().or(self.nameid.as_deref())
    }
}

/// JWT service for verifying (and, for tooling, signing) HS256 tokens
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService").finish()
    }
}

impl JwtService {
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Sign an access token for a user
    pub fn sign(&self, user_id: &UserId, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: Some(user_id.as_str().to_string()),
            nameid: None,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        self.sign_claims(&claims)
    }

    /// Sign arbitrary claims (tooling/tests)
    pub fn sign_claims(&self, claims: &Claims) -> Result<String> {
        let header = Header::new(Algorithm::HS256);
        encode(&header, claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("Failed to sign token: {e}")))
    }

    /// Verify a token and extract claims
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| Error::Authentication(format!("Invalid token: {e}")))
    }

    /// Verify a `Bearer <token>` authorization header value
    pub fn verify_bearer(&self, header: &str) -> Result<Claims> {
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| Error::Authentication("Expected Bearer token".to_string()))?;
        self.verify(token.trim())
    }
}
