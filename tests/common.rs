#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use inkwell_api::context::AppContext;
use inkwell_api::kernel::{build_app, into_service, Plugin};
use inkwell_api::media::{DynMedia, MemoryMediaStore};
use inkwell_api::plugins::auth::token::JwtKeys;
use inkwell_api::plugins::auth::AuthPlugin;
use inkwell_api::plugins::blog::BlogPlugin;
use inkwell_api::plugins::health::HealthPlugin;
use inkwell_api::store::{DynStore, MemoryStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::normalize_path::NormalizePath;

pub const JWT_SECRET: &str = "inkwell-test-secret";
pub const BOUNDARY: &str = "inkwell-test-boundary";

pub struct TestApp {
    pub service: NormalizePath<Router>,
    pub store: DynStore,
}

pub async fn spawn_app() -> (TestApp, Arc<MemoryMediaStore>) {
    let media = Arc::new(MemoryMediaStore::new());
    let app = spawn_app_with_media(media.clone()).await;
    (app, media)
}

pub async fn spawn_app_with_media(media: DynMedia) -> TestApp {
    let store: DynStore = Arc::new(MemoryStore::new());
    let keys = JwtKeys::new(JWT_SECRET, chrono::Duration::hours(1));
    let ctx = AppContext::new(store.clone(), media, keys);
    let plugins: Vec<Box<dyn Plugin>> = vec![
        Box::new(HealthPlugin),
        Box::new(AuthPlugin::new(ctx.clone())),
        Box::new(BlogPlugin::new(ctx)),
    ];
    let app = build_app(&plugins, None).await;
    TestApp { service: into_service(app), store }
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> anyhow::Result<(StatusCode, Value)> {
        let resp = self.service.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
        Ok((status, value))
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> anyhow::Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };
        self.send(req).await
    }

    pub async fn multipart(
        &self,
        method: Method,
        uri: &str,
        token: &str,
        body: Vec<u8>,
    ) -> anyhow::Result<(StatusCode, Value)> {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))?;
        self.send(req).await
    }

    /// Registers a user and returns a bearer token for it.
    pub async fn signup(&self, name: &str, email: &str) -> anyhow::Result<String> {
        let (status, _) = self
            .call(
                Method::POST,
                "/api/auth",
                None,
                Some(json!({"name": name, "email": email, "password": "secret123"})),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::CREATED, "register failed with {status}");
        let (status, body) = self
            .call(Method::POST, "/api/auth/login", None, Some(json!({"email": email, "password": "secret123"})))
            .await?;
        anyhow::ensure!(status == StatusCode::OK, "login failed with {status}");
        Ok(body["token"].as_str().unwrap_or_default().to_string())
    }

    pub async fn create_blog(&self, token: &str, body: Value) -> anyhow::Result<String> {
        let (status, blog) = self.call(Method::POST, "/api/blog/addblog", Some(token), Some(body)).await?;
        anyhow::ensure!(status == StatusCode::CREATED, "addblog failed with {status}: {blog}");
        Ok(blog["id"].as_str().unwrap_or_default().to_string())
    }
}

pub fn hello_blog() -> Value {
    json!({"title": "Hello", "content": [{"type": "text", "value": "first post"}]})
}

/// Builds a multipart body from text fields and `(field, file name, bytes)` file parts.
pub fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    for (name, file_name, data) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}
