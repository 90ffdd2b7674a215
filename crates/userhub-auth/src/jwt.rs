//! JWT token management

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use userhub_db::{UserProjection, UserRole};

use crate::error::AuthError;

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User ID
    pub id: String,
    pub email: String,
    pub role: UserRole,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// JWT manager for token generation and validation
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl_secs: u64,
}

impl JwtManager {
    /// Create a new JWT manager
    pub fn new(secret: &str, token_ttl_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_ttl_secs,
        }
    }

    pub fn token_ttl_secs(&self) -> u64 {
        self.token_ttl_secs
    }

    /// Generate a JWT token for a user
    pub fn generate_token(&self, user: &UserProjection) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = i64::try_from(self.token_ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or(AuthError::TokenLifetime(self.token_ttl_secs))?;

        let claims = Claims {
            id: user.id.clone(),
            email: user.email.clone(),
            role: user.user_role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        debug!("Generating token for user: {}", user.email);

        encode(&Header::default(), &claims, &self.encoding_key).map_err(AuthError::Jwt)
    }

    /// Validate a JWT token and return claims
    ///
    /// Bad signatures, malformed input and elapsed `exp` all collapse into
    /// [`AuthError::InvalidToken`].
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Rejected token: {}", e);
                AuthError::InvalidToken
            })
    }
}
