//! Threaded comments. Served under the blog plugin's mount point.

use axum::{middleware, routing::{delete, get, post, put}, Router};

use crate::plugins::auth::middleware::require_auth;

pub mod handlers;
pub mod models;
pub mod service;

/// Comment routes, merged into the blog router by `BlogPlugin`.
pub fn routes() -> Router {
    let public = Router::new().route("/:id/comments", get(handlers::list_comments));

    let protected = Router::new()
        .route("/:id/comments", post(handlers::add_comment))
        .route("/comments/:commentId", delete(handlers::delete_comment))
        .route("/comments/:commentId/seen", put(handlers::mark_seen))
        .route_layer(middleware::from_fn(require_auth));

    public.merge(protected)
}
