use axum::{Extension, Router};
use std::sync::Arc;

use crate::media::DynMedia;
use crate::plugins::auth::token::JwtKeys;
use crate::store::DynStore;

/// Collaborators shared by the plugins, handed to each router as `Extension`s.
#[derive(Clone)]
pub struct AppContext {
    pub store: DynStore,
    pub media: DynMedia,
    pub keys: Arc<JwtKeys>,
}

impl AppContext {
    pub fn new(store: DynStore, media: DynMedia, keys: JwtKeys) -> Self {
        Self { store, media, keys: Arc::new(keys) }
    }

    pub fn attach(&self, router: Router) -> Router {
        router
            .layer(Extension(self.store.clone()))
            .layer(Extension(self.media.clone()))
            .layer(Extension(self.keys.clone()))
    }
}
