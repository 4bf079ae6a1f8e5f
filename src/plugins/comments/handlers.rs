use axum::extract::Path;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::http_error::AppError;
use crate::plugins::auth::AuthUser;
use crate::plugins::comments::models::{CommentView, CreateComment};
use crate::plugins::comments::service;
use crate::store::DynStore;

pub async fn list_comments(
    Extension(store): Extension<DynStore>,
    auth: Option<AuthUser>,
    Path(blog_id): Path<Uuid>,
) -> Result<Json<Vec<CommentView>>, AppError> {
    Ok(Json(service::list(&store, blog_id, auth.map(|a| a.user_id)).await?))
}

pub async fn add_comment(
    Extension(store): Extension<DynStore>,
    auth: AuthUser,
    Path(blog_id): Path<Uuid>,
    Json(payload): Json<CreateComment>,
) -> Result<(StatusCode, Json<CommentView>), AppError> {
    let comment = service::create(&store, blog_id, auth.user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn delete_comment(
    Extension(store): Extension<DynStore>,
    auth: AuthUser,
    Path(comment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let deleted = service::delete(&store, comment_id, auth.user_id).await?;
    Ok(Json(json!({ "success": true, "deleted": deleted })))
}

pub async fn mark_seen(
    Extension(store): Extension<DynStore>,
    auth: AuthUser,
    Path(comment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    service::mark_seen(&store, comment_id, auth.user_id).await?;
    Ok(Json(json!({ "success": true })))
}
