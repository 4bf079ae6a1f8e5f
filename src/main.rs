use axum::extract::DefaultBodyLimit;
use axum::Router;
use inkwell_api::config::{Config, StoreBackend};
use inkwell_api::context::AppContext;
use inkwell_api::db;
use inkwell_api::kernel::{build_app, serve, shutdown_plugins, Plugin};
use inkwell_api::media::{DynMedia, LocalMediaStore, MemoryMediaStore};
use inkwell_api::plugins::auth::token::JwtKeys;
use inkwell_api::plugins::auth::AuthPlugin;
use inkwell_api::plugins::blog::BlogPlugin;
use inkwell_api::plugins::health::HealthPlugin;
use inkwell_api::plugins::metrics::MetricsPlugin;
use inkwell_api::store::{DynStore, MemoryStore, PgStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("inkwell_api=info,tower_http=info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Config::from_env()?;
    let keys = JwtKeys::from_config(&cfg.jwt);

    // uploads are only served from disk for the persistent backend
    let (store, media, upload_root): (DynStore, DynMedia, Option<PathBuf>) = match cfg.store_backend {
        StoreBackend::Postgres => {
            let pool = db::init_db(&cfg.database_url).await?;
            let local = LocalMediaStore::new(&cfg.media.upload_dir, &cfg.media.public_base_url).await?;
            let root = local.root().to_path_buf();
            (Arc::new(PgStore::new(pool)), Arc::new(local), Some(root))
        }
        StoreBackend::Memory => {
            tracing::warn!("running with the in-memory store; data is lost on exit");
            (Arc::new(MemoryStore::new()), Arc::new(MemoryMediaStore::new()), None)
        }
    };

    let ctx = AppContext::new(store, media, keys);
    let metrics_plugin = MetricsPlugin::new()?;
    let plugins_vec: Vec<Box<dyn Plugin>> = vec![
        Box::new(HealthPlugin),
        Box::new(AuthPlugin::new(ctx.clone())),
        Box::new(BlogPlugin::new(ctx)),
    ];

    let plugin_names: Vec<&'static str> = plugins_vec.iter().map(|p| p.name()).collect();
    tracing::info!("mounting plugins: {:?}", plugin_names);

    let mut app: Router = build_app(&plugins_vec, Some(metrics_plugin.clone())).await;

    // expose metrics at /metrics (not instrumented to avoid double-counting)
    app = app.nest("/metrics", metrics_plugin.router());
    if let Some(root) = upload_root {
        app = app.nest_service("/uploads", ServeDir::new(root));
    }
    app = app.layer(DefaultBodyLimit::max(cfg.media.max_upload_bytes));

    let addr = cfg.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", addr);

    serve(listener, app, async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    })
    .await?;

    shutdown_plugins(&plugins_vec).await;
    Ok(())
}
