use axum::extract::Request;
use axum::{middleware, Router, ServiceExt};
use async_trait::async_trait;
use tokio::net::TcpListener;
use tower::Layer;
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::plugins::metrics::{track_metrics, MetricsPlugin};

#[async_trait]
pub trait Plugin: Send + Sync {
    async fn router(&self) -> Router;

    /// Mount path, without the leading slash.
    fn name(&self) -> &'static str;
    /// Optional lifecycle hook called when the kernel starts.
    async fn on_start(&self) {}
    /// Optional lifecycle hook called on shutdown.
    async fn on_shutdown(&self) {}
}

/// Builds the application router by mounting each plugin under `/{plugin.name()}`.
/// When `metrics` is given every plugin router records request metrics labelled
/// with its matched route.
pub async fn build_app(plugins: &[Box<dyn Plugin>], metrics: Option<MetricsPlugin>) -> Router {
    let mut app = Router::new();

    for plugin in plugins.iter() {
        info!("starting plugin {}", plugin.name());
        plugin.on_start().await;
        let mut router = plugin.router().await;
        if let Some(metrics) = &metrics {
            router = router.route_layer(middleware::from_fn_with_state(metrics.clone(), track_metrics));
        }
        // mount plugin under its name to namespace routes
        app = app.nest(&format!("/{}", plugin.name()), router);
    }

    app.layer(CorsLayer::permissive()).layer(TraceLayer::new_for_http())
}

/// Wraps the router so `/api/auth/` and `/api/auth` hit the same route. The
/// normalization has to run before routing, hence outside the router.
pub fn into_service(app: Router) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(app)
}

pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let service = into_service(app);
    axum::serve(listener, ServiceExt::<Request>::into_make_service(service))
        .with_graceful_shutdown(shutdown)
        .await
}

pub async fn shutdown_plugins(plugins: &[Box<dyn Plugin>]) {
    for plugin in plugins.iter() {
        plugin.on_shutdown().await;
    }
}
