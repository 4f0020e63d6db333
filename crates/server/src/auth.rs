use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use vaidya_core::User;
use vaidya_gateway::GatewayError;

use crate::error::ServerError;
use crate::state::AppState;

/// Hash a password with argon2id and a fresh salt.
pub fn hash_password(password: &str) -> Result<String, ServerError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServerError::Config(format!("password hashing failed: {e}")))
}

/// Verify a candidate password against an argon2 hash string.
///
/// Returns `false` for malformed hashes rather than erroring.
#[must_use]
pub fn verify_password(hash: &str, candidate: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok()
}

/// JWT session claims.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// User email at issue time.
    pub email: String,
    /// Expiry (seconds since epoch).
    pub exp: i64,
}

/// Issue a session token for a user.
pub fn issue_token(
    user: &User,
    secret: &str,
    ttl: std::time::Duration,
) -> Result<String, ServerError> {
    let claims = Claims {
        sub: user.id.clone(),
        email: user.email.clone(),
        exp: (Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default()).timestamp(),
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ServerError::Config(format!("token signing failed: {e}")))
}

/// Decode and validate a session token, returning the user id.
pub fn decode_token(token: &str, secret: &str) -> Option<String> {
    jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims.sub)
}

/// Read the bearer token from request headers, if any.
#[must_use]
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// An authenticated, enabled user, extracted from the bearer token.
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| {
            ServerError::Gateway(GatewayError::Unauthorized(
                "missing bearer token".to_owned(),
            ))
        })?;
        let user_id = decode_token(token, &state.config.jwt_secret).ok_or_else(|| {
            ServerError::Gateway(GatewayError::Unauthorized(
                "invalid or expired token".to_owned(),
            ))
        })?;
        let user = state
            .users
            .get_user(&user_id)
            .await
            .map_err(GatewayError::from)?
            .ok_or_else(|| {
                ServerError::Gateway(GatewayError::Unauthorized("unknown user".to_owned()))
            })?;
        if user.disabled {
            return Err(ServerError::Gateway(GatewayError::AccountDisabled));
        }
        Ok(AuthUser(user))
    }
}
