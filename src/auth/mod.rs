pub mod password;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config;
use crate::permissions::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, email: String, role: Role) -> Self {
        let expiry_hours = config::config().security.jwt_expiry_hours;
        Self::with_ttl(user_id, email, role, Duration::hours(expiry_hours as i64))
    }

    pub fn with_ttl(user_id: Uuid, email: String, role: Role, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            email,
            role,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }

    /// Seconds until expiry, for `expires_in` in login responses
    pub fn expires_in(&self) -> i64 {
        (self.exp - self.iat).max(0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT secret")]
    InvalidSecret,

    #[error("Invalid JWT token: {0}")]
    Invalid(String),
}

pub fn generate_jwt(claims: &Claims) -> Result<String, JwtError> {
    encode_with_secret(claims, &config::config().security.jwt_secret)
}

pub fn validate_jwt(token: &str) -> Result<Claims, JwtError> {
    decode_with_secret(token, &config::config().security.jwt_secret)
}

fn encode_with_secret(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

fn decode_with_secret(token: &str, secret: &str) -> Result<Claims, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::default();
    validation.leeway = 0;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| JwtError::Invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn round_trips_claims() {
        let id = Uuid::new_v4();
        let claims = Claims::with_ttl(id, "ana@example.com".to_string(), Role::User, Duration::hours(1));
        let token = encode_with_secret(&claims, SECRET).unwrap();

        let decoded = decode_with_secret(&token, SECRET).unwrap();
        assert_eq!(decoded.sub, id);
        assert_eq!(decoded.email, "ana@example.com");
        assert_eq!(decoded.role, Role::User);
        assert_eq!(claims.expires_in(), 3600);
    }

    #[test]
    fn rejects_wrong_secret() {
        let claims = Claims::with_ttl(Uuid::new_v4(), "a@b.c".to_string(), Role::Admin, Duration::hours(1));
        let token = encode_with_secret(&claims, SECRET).unwrap();
        assert!(matches!(decode_with_secret(&token, "other"), Err(JwtError::Invalid(_))));
    }

    #[test]
    fn rejects_expired_token() {
        let claims = Claims::with_ttl(Uuid::new_v4(), "a@b.c".to_string(), Role::User, Duration::hours(-2));
        let token = encode_with_secret(&claims, SECRET).unwrap();
        assert!(decode_with_secret(&token, SECRET).is_err());
    }

    #[test]
    fn rejects_tampered_payload() {
        let claims = Claims::with_ttl(Uuid::new_v4(), "a@b.c".to_string(), Role::User, Duration::hours(1));
        let token = encode_with_secret(&claims, SECRET).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = Claims::with_ttl(Uuid::new_v4(), "a@b.c".to_string(), Role::Admin, Duration::hours(1));
        let forged_token = encode_with_secret(&forged, SECRET).unwrap();
        let forged_payload = forged_token.split('.').nth(1).unwrap();
        parts[1] = forged_payload;
        assert!(decode_with_secret(&parts.join("."), SECRET).is_err());
    }

    #[test]
    fn empty_secret_is_refused() {
        let claims = Claims::with_ttl(Uuid::new_v4(), "a@b.c".to_string(), Role::User, Duration::hours(1));
        assert!(matches!(encode_with_secret(&claims, ""), Err(JwtError::InvalidSecret)));
    }
}
