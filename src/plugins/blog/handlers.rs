use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::{Extension, Json};
use uuid::Uuid;

use crate::http_error::AppError;
use crate::media::DynMedia;
use crate::plugins::auth::AuthUser;
use crate::plugins::blog::models::{Blog, DeletedBlog, OwnBlog, PublicBlog, ViewCount};
use crate::plugins::blog::service;
use crate::plugins::blog::submission::BlogSubmission;
use crate::plugins::comments::models::{RecentQuery, UnseenComment};
use crate::plugins::comments::service as comments;
use crate::store::DynStore;

pub async fn public_blogs(Extension(store): Extension<DynStore>) -> Result<Json<Vec<PublicBlog>>, AppError> {
    Ok(Json(service::list_public(&store).await?))
}

pub async fn fetch_all_blogs(Extension(store): Extension<DynStore>, auth: AuthUser) -> Result<Json<Vec<OwnBlog>>, AppError> {
    Ok(Json(service::list_mine(&store, auth.user_id).await?))
}

pub async fn recent_comments(
    Extension(store): Extension<DynStore>,
    auth: AuthUser,
    Query(q): Query<RecentQuery>,
) -> Result<Json<Vec<UnseenComment>>, AppError> {
    Ok(Json(comments::recent_unseen(&store, auth.user_id, q.limit).await?))
}

pub async fn add_blog(
    Extension(store): Extension<DynStore>,
    Extension(media): Extension<DynMedia>,
    auth: AuthUser,
    submission: BlogSubmission,
) -> Result<(StatusCode, Json<Blog>), AppError> {
    let blog = service::create_blog(&store, &media, auth.user_id, submission).await?;
    Ok((StatusCode::CREATED, Json(blog)))
}

pub async fn update_blog(
    Extension(store): Extension<DynStore>,
    Extension(media): Extension<DynMedia>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    submission: BlogSubmission,
) -> Result<Json<Blog>, AppError> {
    Ok(Json(service::update_blog(&store, &media, id, auth.user_id, submission).await?))
}

pub async fn toggle_status(
    Extension(store): Extension<DynStore>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Blog>, AppError> {
    Ok(Json(service::toggle_status(&store, id, auth.user_id).await?))
}

pub async fn delete_blog(
    Extension(store): Extension<DynStore>,
    Extension(media): Extension<DynMedia>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletedBlog>, AppError> {
    Ok(Json(service::delete_blog(&store, &media, id, auth.user_id).await?))
}

pub async fn get_blog(
    Extension(store): Extension<DynStore>,
    auth: Option<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Blog>, AppError> {
    let requester = auth.map(|a| a.user_id);
    Ok(Json(service::get_blog(&store, id, requester).await?))
}

pub async fn record_view(
    Extension(store): Extension<DynStore>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ViewCount>, AppError> {
    Ok(Json(service::record_view(&store, id, auth.user_id).await?))
}

pub async fn toggle_like(
    Extension(store): Extension<DynStore>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Blog>, AppError> {
    Ok(Json(service::toggle_like(&store, id, auth.user_id).await?))
}
