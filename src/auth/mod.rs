use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::{SecurityConfig, StreamConfig};
use crate::database::models::Role;

/// Session token claims. `sub` is the identity-provider user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: impl Into<String>, role: Role, security: &SecurityConfig) -> Self {
        Self::with_ttl(user_id, role, security, Duration::hours(security.jwt_expiry_hours as i64))
    }

    pub fn with_ttl(user_id: impl Into<String>, role: Role, security: &SecurityConfig, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.into(),
            role,
            iss: security.jwt_issuer.clone(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }
}

/// Authenticated caller extracted from a verified session token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub role: Role,
}

impl AuthUser {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self { user_id: user_id.into(), role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            role: claims.role,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),
    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),
    #[error("{0} secret not configured")]
    NotConfigured(&'static str),
}

pub fn issue_session_token(claims: &Claims, security: &SecurityConfig) -> Result<String, JwtError> {
    if security.jwt_secret.is_empty() {
        return Err(JwtError::NotConfigured("JWT"));
    }
    let key = EncodingKey::from_secret(security.jwt_secret.as_bytes());
    encode(&Header::new(Algorithm::HS256), claims, &key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Checks signature, expiry and issuer
pub fn verify_session_token(token: &str, security: &SecurityConfig) -> Result<Claims, JwtError> {
    if security.jwt_secret.is_empty() {
        return Err(JwtError::NotConfigured("JWT"));
    }
    let key = DecodingKey::from_secret(security.jwt_secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[security.jwt_issuer.as_str()]);

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| JwtError::InvalidToken(e.to_string()))
}

#[derive(Debug, Serialize, Deserialize)]
struct StreamClaims {
    user_id: String,
    iat: i64,
    exp: i64,
}

/// Token a client SDK presents to Stream's video/chat edge
#[derive(Debug, Clone, Serialize)]
pub struct StreamToken {
    pub token: String,
    pub api_key: String,
    pub user_id: String,
    pub expires_at: i64,
}

pub fn issue_stream_token(user_id: &str, stream: &StreamConfig) -> Result<StreamToken, JwtError> {
    if stream.api_secret.is_empty() {
        return Err(JwtError::NotConfigured("Stream"));
    }
    let now = Utc::now();
    let claims = StreamClaims {
        user_id: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(stream.token_ttl_secs as i64)).timestamp(),
    };
    let key = EncodingKey::from_secret(stream.api_secret.as_bytes());
    let token = encode(&Header::new(Algorithm::HS256), &claims, &key)
        .map_err(|e| JwtError::TokenGeneration(e.to_string()))?;

    Ok(StreamToken {
        token,
        api_key: stream.api_key.clone(),
        user_id: claims.user_id,
        expires_at: claims.exp,
    })
}
