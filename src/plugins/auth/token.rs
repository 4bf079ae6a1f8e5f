use axum::http::HeaderMap;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::http_error::AppError;

#[derive(Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: usize,
    exp: usize,
}

/// HS256 signing material plus token lifetime.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: chrono::Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, ttl: chrono::Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self::new(&cfg.secret, chrono::Duration::hours(cfg.expiry_hours))
    }

    pub fn issue(&self, user_id: Uuid) -> Result<String, AppError> {
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp().max(0) as usize,
            exp: (now + self.ttl).timestamp().max(0) as usize,
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(|e| AppError::internal(e.to_string()))
    }

    /// Checks signature and expiry and returns the user id carried in `sub`.
    pub fn verify(&self, token: &str) -> Result<Uuid, AppError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|_| AppError::unauthorized("Access denied. Invalid token.").with_code("invalid_token"))?;
        Uuid::parse_str(&data.claims.sub)
            .map_err(|_| AppError::unauthorized("invalid token subject").with_code("invalid_token"))
    }
}

/// Pulls the raw token from `Authorization: Bearer <token>`, falling back to
/// the legacy `auth-token` header.
pub fn token_from_headers(headers: &HeaderMap) -> Result<&str, AppError> {
    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION) {
        let value = value
            .to_str()
            .map_err(|_| AppError::unauthorized("invalid authorization header").with_code("invalid_token"))?;
        return match value.strip_prefix("Bearer ") {
            Some(token) if !token.trim().is_empty() => Ok(token.trim()),
            _ => Err(AppError::unauthorized("invalid authorization header").with_code("invalid_token")),
        };
    }
    headers
        .get("auth-token")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::unauthorized("Access denied. No token provided.").with_code("missing_token"))
}
