use axum::extract::{MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Router};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct MetricsPlugin {
    registry: Arc<Registry>,
    pub request_counter: Arc<IntCounterVec>,
    pub request_duration: Arc<HistogramVec>,
}

impl MetricsPlugin {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let counter = IntCounterVec::new(
            Opts::new("requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(counter.clone()))?;

        let histogram = HistogramVec::new(
            HistogramOpts::new("request_duration_seconds", "HTTP request latencies in seconds"),
            &["method", "path"],
        )?;
        registry.register(Box::new(histogram.clone()))?;

        #[cfg(target_os = "linux")]
        {
            let collector = prometheus::process_collector::ProcessCollector::for_self();
            registry.register(Box::new(collector)).ok();
        }

        Ok(MetricsPlugin {
            registry: Arc::new(registry),
            request_counter: Arc::new(counter),
            request_duration: Arc::new(histogram),
        })
    }

    /// Records one request, labelled with the route template rather than the raw path.
    pub async fn track(&self, req: Request, next: Next) -> Response {
        let method = req.method().to_string();
        let path = req
            .extensions()
            .get::<MatchedPath>()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| "unmatched".to_string());
        let started = Instant::now();

        let response = next.run(req).await;

        let status = response.status().as_u16().to_string();
        self.request_counter.with_label_values(&[&method, &path, &status]).inc();
        self.request_duration
            .with_label_values(&[&method, &path])
            .observe(started.elapsed().as_secs_f64());
        response
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn router(&self) -> Router {
        let metrics = self.clone();
        Router::new().route(
            "/",
            get(move || {
                let metrics = metrics.clone();
                async move {
                    match metrics.render() {
                        Ok(body) => (StatusCode::OK, body).into_response(),
                        Err(e) => {
                            tracing::error!("failed to encode metrics: {}", e);
                            StatusCode::INTERNAL_SERVER_ERROR.into_response()
                        }
                    }
                }
            }),
        )
    }
}

/// Route layer used by the kernel to instrument each plugin router.
pub async fn track_metrics(State(metrics): State<MetricsPlugin>, req: Request, next: Next) -> Response {
    metrics.track(req, next).await
}
