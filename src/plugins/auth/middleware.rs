use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

use crate::http_error::AppError;
use crate::plugins::auth::handlers::AuthUser;
use crate::plugins::auth::token::{token_from_headers, JwtKeys};

/// Route layer that rejects unauthenticated requests before the handler runs
/// and leaves the verified `AuthUser` in the request extensions.
pub async fn require_auth(mut req: Request, next: Next) -> Result<Response, AppError> {
    let keys = req
        .extensions()
        .get::<Arc<JwtKeys>>()
        .cloned()
        .ok_or_else(|| AppError::internal("token keys not configured").with_code("config_error"))?;
    let user_id = keys.verify(token_from_headers(req.headers())?)?;
    req.extensions_mut().insert(AuthUser { user_id });
    Ok(next.run(req).await)
}
