//! Credential and token primitives: argon2 password hashing and HS256
//! bearer tokens with an expiry claim.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token expired")]
    TokenExpired,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("token encoding failed: {0}")]
    Encoding(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, AuthError> {
        self.sub
            .parse()
            .map_err(|_| AuthError::InvalidToken(format!("non-numeric subject `{}`", self.sub)))
    }
}

pub fn sign_token(
    secret: &SecretString,
    user_id: i64,
    ttl_hours: i64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(ttl_hours)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .map_err(|error| AuthError::Encoding(error.to_string()))
}

pub fn verify_token(secret: &SecretString, token: &str) -> Result<Claims, AuthError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|error| match error.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken(error.to_string()),
    })
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header.strip_prefix("Bearer ").map(str::trim).filter(|token| !token.is_empty())
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|error| AuthError::Hashing(error.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|error| AuthError::Hashing(error.to_string()))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::{bearer_token, hash_password, sign_token, verify_password, verify_token};

    fn secret() -> SecretString {
        SecretString::from("unit-test-signing-key")
    }

    #[test]
    fn token_round_trips_the_user_id() {
        let token = sign_token(&secret(), 42, 24).expect("sign");
        let claims = verify_token(&secret(), &token).expect("verify");
        assert_eq!(claims.user_id().unwrap(), 42);
    }

    #[test]
    fn token_rejects_a_foreign_key() {
        let token = sign_token(&secret(), 42, 24).expect("sign");
        let other = SecretString::from("a-different-signing-key");
        assert!(verify_token(&other, &token).is_err());
    }

    #[test]
    fn bearer_extraction_requires_the_scheme() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }

    #[test]
    fn password_verifies_against_its_own_hash_only() {
        let hash = hash_password("s3cret").expect("hash");
        assert!(verify_password("s3cret", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }
}
