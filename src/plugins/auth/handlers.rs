use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::{Extension, Json};
use async_trait::async_trait;
use bcrypt::{hash, verify, DEFAULT_COST};
use std::sync::Arc;

use crate::http_error::{AppError, FieldError};
use crate::plugins::auth::models::{
    LoginRequest, LoginResponse, NewUser, RegisterRequest, UpdateUserRequest, UserDto, UserEnvelope,
};
use crate::plugins::auth::token::{token_from_headers, JwtKeys};
use crate::store::DynStore;

const MIN_PASSWORD_LEN: usize = 6;

/// Authenticated caller. Rejects with 401 when the token is missing or invalid;
/// use `Option<AuthUser>` on routes where authentication is optional.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: uuid::Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // already verified by require_auth
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }
        let keys = parts
            .extensions
            .get::<Arc<JwtKeys>>()
            .cloned()
            .ok_or_else(|| AppError::internal("token keys not configured").with_code("config_error"))?;
        let token = token_from_headers(&parts.headers)?;
        let user_id = keys.verify(token)?;
        Ok(AuthUser { user_id })
    }
}

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.split('.').count() >= 2
        && domain.split('.').all(|part| !part.is_empty())
        && !email.chars().any(char::is_whitespace)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn validate_registration(payload: &RegisterRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if payload.name.trim().is_empty() {
        errors.push(FieldError::new("name", "Name must be a non-empty string"));
    }
    if !looks_like_email(&normalize_email(&payload.email)) {
        errors.push(FieldError::new("email", "Invalid email address"));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new("password", "Password must be at least 6 characters long"));
    }
    errors
}

fn clean_phone(phone: Option<String>) -> Option<String> {
    phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty())
}

pub async fn register(
    Extension(store): Extension<DynStore>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserDto>), AppError> {
    let errors = validate_registration(&payload);
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    let email = normalize_email(&payload.email);
    if store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::conflict("Sorry a user with this email already exists", "duplicate_email"));
    }

    let password = payload.password;
    let password_hash = tokio::task::spawn_blocking(move || hash(password, DEFAULT_COST))
        .await
        .map_err(|e| AppError::internal(e.to_string()))?
        .map_err(|e| AppError::internal(e.to_string()))?;

    let user = store
        .insert_user(NewUser {
            name: payload.name.trim().to_string(),
            email,
            password_hash,
            phone: clean_phone(payload.phone),
        })
        .await?;
    tracing::info!(user_id = %user.id, "registered user");

    Ok((StatusCode::CREATED, Json(UserDto::from(user))))
}

pub async fn login(
    Extension(store): Extension<DynStore>,
    Extension(keys): Extension<Arc<JwtKeys>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::bad_request("emailAndPasswordRequired").with_code("invalid_credentials"));
    }

    let invalid = || AppError::unauthorized("Please try to login with correct credentials").with_code("invalid_credentials");
    let user = store.find_user_by_email(&normalize_email(&payload.email)).await?.ok_or_else(invalid)?;

    let password = payload.password;
    let stored_hash = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || verify(password, &stored_hash))
        .await
        .map_err(|e| AppError::internal(e.to_string()))?
        .map_err(|e| AppError::internal(e.to_string()))?;
    if !valid {
        return Err(invalid());
    }

    let token = keys.issue(user.id)?;
    Ok(Json(LoginResponse { success: true, token }))
}

pub async fn get_user(Extension(store): Extension<DynStore>, auth: AuthUser) -> Result<Json<UserEnvelope>, AppError> {
    let user = store
        .get_user(auth.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("userNotFound"))?;
    Ok(Json(UserEnvelope { success: true, user: user.into() }))
}

pub async fn update_user(
    Extension(store): Extension<DynStore>,
    auth: AuthUser,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserEnvelope>, AppError> {
    let name = match payload.name {
        Some(name) if name.trim().is_empty() => {
            return Err(AppError::validation(vec![FieldError::new("name", "Name must be a non-empty string")]));
        }
        Some(name) => Some(name.trim().to_string()),
        None => None,
    };
    let user = store
        .update_user(auth.user_id, name, clean_phone(payload.phone))
        .await?
        .ok_or_else(|| AppError::not_found("userNotFound"))?;
    Ok(Json(UserEnvelope { success: true, user: user.into() }))
}
