use axum::{middleware, routing::{post, put}, Router};
use async_trait::async_trait;

use crate::context::AppContext;
use crate::kernel::Plugin;
use crate::plugins::auth::handlers;
use crate::plugins::auth::middleware::require_auth;

pub struct AuthPlugin {
    ctx: AppContext,
}

impl AuthPlugin {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Plugin for AuthPlugin {
    async fn router(&self) -> Router {
        let public = Router::new()
            .route("/", post(handlers::register))
            .route("/login", post(handlers::login));

        let protected = Router::new()
            .route("/getuser", post(handlers::get_user))
            .route("/updateuser", put(handlers::update_user))
            .route_layer(middleware::from_fn(require_auth));

        self.ctx.attach(public.merge(protected))
    }

    fn name(&self) -> &'static str {
        "api/auth"
    }
}
