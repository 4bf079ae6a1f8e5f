use axum::{middleware, routing::{delete, get, post, put}, Router};
use async_trait::async_trait;

use crate::context::AppContext;
use crate::kernel::Plugin;
use crate::plugins::auth::middleware::require_auth;
use crate::plugins::blog::handlers;
use crate::plugins::comments;

pub struct BlogPlugin {
    ctx: AppContext,
}

impl BlogPlugin {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Plugin for BlogPlugin {
    async fn router(&self) -> Router {
        let public = Router::new()
            .route("/public-blogs", get(handlers::public_blogs))
            .route("/blog/:id", get(handlers::get_blog));

        let protected = Router::new()
            .route("/fetchallblogs", get(handlers::fetch_all_blogs))
            .route("/recentcomments", get(handlers::recent_comments))
            .route("/addblog", post(handlers::add_blog))
            .route("/updateblog/:id", put(handlers::update_blog))
            .route("/togglestatus/:id", put(handlers::toggle_status))
            .route("/deleteblog/:id", delete(handlers::delete_blog))
            .route("/blog/:id/view", post(handlers::record_view))
            .route("/:id/like", put(handlers::toggle_like))
            .route_layer(middleware::from_fn(require_auth));

        self.ctx.attach(public.merge(protected).merge(comments::routes()))
    }

    fn name(&self) -> &'static str {
        "api/blog"
    }
}
