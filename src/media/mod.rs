//! Blob storage for uploaded images.
//!
//! Write paths reference uploaded files from content blocks with an
//! `upload:<field>` placeholder. `resolve_uploads` pushes every referenced
//! file to the media store concurrently and rewrites the placeholders in place.
//! The returned [`UploadBatch`] removes the uploaded objects again unless the
//! caller commits it after the blog has been persisted.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::http_error::{AppError, FieldError};

mod local;
mod memory;

pub use local::LocalMediaStore;
pub use memory::MemoryMediaStore;

pub const PLACEHOLDER_PREFIX: &str = "upload:";

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("url is not managed by this media store: {0}")]
    UnknownUrl(String),
}

impl From<MediaError> for AppError {
    fn from(e: MediaError) -> Self {
        tracing::error!("media store error: {}", e);
        AppError::internal("uploadFailed").with_code("upload_error")
    }
}

#[async_trait]
pub trait MediaStore: Send + Sync + 'static {
    /// Stores `data` and returns the public URL it is served from.
    async fn upload(&self, data: Bytes, suggested_name: &str) -> Result<String, MediaError>;
    async fn delete(&self, url: &str) -> Result<(), MediaError>;
    /// Whether `url` points at an object this store would delete.
    fn manages(&self, url: &str) -> bool;
}

pub type DynMedia = Arc<dyn MediaStore>;

/// A file part received with a write request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub data: Bytes,
}

pub fn placeholder_field(value: &str) -> Option<&str> {
    value.strip_prefix(PLACEHOLDER_PREFIX).map(str::trim).filter(|f| !f.is_empty())
}

pub fn placeholder_for(field: &str) -> String {
    format!("{PLACEHOLDER_PREFIX}{field}")
}

/// Objects uploaded for one write. URLs are recorded as each upload finishes,
/// so dropping an uncommitted batch deletes them in the background whether
/// the store write failed or the request was abandoned mid-upload.
pub struct UploadBatch {
    media: DynMedia,
    urls: Mutex<Vec<String>>,
    committed: bool,
}

impl UploadBatch {
    fn new(media: DynMedia) -> Self {
        Self { media, urls: Mutex::new(Vec::new()), committed: false }
    }

    fn record(&self, url: String) {
        self.urls.lock().push(url);
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for UploadBatch {
    fn drop(&mut self) {
        let urls = std::mem::take(self.urls.get_mut());
        if self.committed || urls.is_empty() {
            return;
        }
        let media = self.media.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::info!(count = urls.len(), "discarding uploads of an unfinished write");
                handle.spawn(async move { delete_best_effort(&media, urls).await });
            }
            Err(_) => tracing::warn!(count = urls.len(), "no runtime to discard orphaned uploads"),
        }
    }
}

/// Deletes each URL, logging failures instead of returning them.
pub async fn delete_best_effort<I>(media: &DynMedia, urls: I)
where
    I: IntoIterator<Item = String>,
{
    for url in urls {
        if let Err(e) = media.delete(&url).await {
            tracing::warn!(%url, "failed to delete media: {}", e);
        }
    }
}

/// Uploads the files referenced by placeholder values in `targets` and
/// rewrites each placeholder to its final URL, keeping positions.
///
/// Either every upload succeeds or none of them is kept: on a failure the
/// uploads that did complete are deleted before the error is returned.
pub async fn resolve_uploads(
    media: &DynMedia,
    targets: Vec<&mut String>,
    mut files: HashMap<String, UploadedFile>,
) -> Result<UploadBatch, AppError> {
    let mut fields: Vec<String> = Vec::new();
    let mut missing: Vec<FieldError> = Vec::new();
    for value in targets.iter() {
        if let Some(field) = placeholder_field(value) {
            if fields.iter().any(|f| f == field) {
                continue;
            }
            if files.contains_key(field) {
                fields.push(field.to_string());
            } else {
                missing.push(FieldError::new(field, format!("no file uploaded for {}", placeholder_for(field))));
            }
        } else if value.starts_with(PLACEHOLDER_PREFIX) {
            missing.push(FieldError::new("content", "empty upload placeholder"));
        }
    }
    if !missing.is_empty() {
        return Err(AppError::validation(missing));
    }
    if fields.len() < files.len() {
        let unused: Vec<&String> = files.keys().filter(|k| !fields.contains(*k)).collect();
        tracing::debug!(?unused, "ignoring file parts without a placeholder");
    }

    let batch = UploadBatch::new(media.clone());
    let jobs = fields.iter().filter_map(|field| {
        files.remove(field).map(|file| {
            let batch = &batch;
            async move {
                let url = batch.media.upload(file.data, &file.file_name).await?;
                batch.record(url.clone());
                Ok::<String, MediaError>(url)
            }
        })
    });
    let results = futures::future::join_all(jobs).await;

    let mut urls: HashMap<String, String> = HashMap::new();
    let mut failure: Option<MediaError> = None;
    for (field, result) in fields.iter().zip(results) {
        match result {
            Ok(url) => {
                urls.insert(field.clone(), url);
            }
            Err(e) => {
                tracing::warn!(%field, "upload failed: {}", e);
                failure.get_or_insert(e);
            }
        }
    }

    if let Some(e) = failure {
        // dropping the batch discards the partial uploads
        drop(batch);
        return Err(e.into());
    }

    for value in targets {
        if let Some(url) = placeholder_field(value).and_then(|f| urls.get(f)) {
            *value = url.clone();
        }
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct FailingOn {
        inner: MemoryMediaStore,
        bad_name: &'static str,
    }

    #[async_trait]
    impl MediaStore for FailingOn {
        async fn upload(&self, data: Bytes, suggested_name: &str) -> Result<String, MediaError> {
            if suggested_name == self.bad_name {
                tokio::time::sleep(Duration::from_millis(5)).await;
                return Err(MediaError::Upload("bucket unavailable".into()));
            }
            self.inner.upload(data, suggested_name).await
        }

        async fn delete(&self, url: &str) -> Result<(), MediaError> {
            self.inner.delete(url).await
        }

        fn manages(&self, url: &str) -> bool {
            self.inner.manages(url)
        }
    }

    /// Never finishes uploading `slow_name`.
    struct StallsOn {
        inner: MemoryMediaStore,
        slow_name: &'static str,
    }

    #[async_trait]
    impl MediaStore for StallsOn {
        async fn upload(&self, data: Bytes, suggested_name: &str) -> Result<String, MediaError> {
            if suggested_name == self.slow_name {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            self.inner.upload(data, suggested_name).await
        }

        async fn delete(&self, url: &str) -> Result<(), MediaError> {
            self.inner.delete(url).await
        }

        fn manages(&self, url: &str) -> bool {
            self.inner.manages(url)
        }
    }

    fn file(name: &str) -> UploadedFile {
        UploadedFile { file_name: name.to_string(), data: Bytes::from_static(b"png-bytes") }
    }

    #[tokio::test]
    async fn placeholders_resolve_in_place() {
        let store = Arc::new(MemoryMediaStore::new());
        let media: DynMedia = store.clone();
        let mut a = "upload:img0".to_string();
        let mut b = "https://cdn.example.com/kept.png".to_string();
        let mut c = "upload:img1".to_string();
        let files = HashMap::from([("img0".to_string(), file("a.png")), ("img1".to_string(), file("c.png"))]);

        let batch = resolve_uploads(&media, vec![&mut a, &mut b, &mut c], files).await.unwrap();
        assert_eq!(batch.urls().len(), 2);
        batch.commit();

        assert!(store.contains(&a));
        assert!(store.contains(&c));
        assert_ne!(a, c);
        assert_eq!(b, "https://cdn.example.com/kept.png");
    }

    #[tokio::test]
    async fn missing_file_is_a_validation_error() {
        let media: DynMedia = Arc::new(MemoryMediaStore::new());
        let mut a = "upload:nope".to_string();
        let err = resolve_uploads(&media, vec![&mut a], HashMap::new()).await.err().unwrap();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(err.errors[0].field, "nope");
    }

    #[tokio::test]
    async fn one_failed_upload_discards_the_others() {
        let store = Arc::new(FailingOn { inner: MemoryMediaStore::new(), bad_name: "bad.png" });
        let media: DynMedia = store.clone();
        let mut a = "upload:good".to_string();
        let mut b = "upload:bad".to_string();
        let files = HashMap::from([("good".to_string(), file("good.png")), ("bad".to_string(), file("bad.png"))]);

        let err = resolve_uploads(&media, vec![&mut a, &mut b], files).await.err().unwrap();
        assert_eq!(err.status, axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code.as_deref(), Some("upload_error"));

        // cleanup runs on a spawned task
        for _ in 0..50 {
            if store.inner.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(store.inner.is_empty());
        assert_eq!(a, "upload:good");
    }

    #[tokio::test]
    async fn uncommitted_batch_is_cleaned_up() {
        let store = Arc::new(MemoryMediaStore::new());
        let media: DynMedia = store.clone();
        let mut a = "upload:f".to_string();
        let files = HashMap::from([("f".to_string(), file("f.png"))]);
        let batch = resolve_uploads(&media, vec![&mut a], files).await.unwrap();
        assert!(store.contains(&a));
        drop(batch);
        for _ in 0..50 {
            if store.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn abandoned_write_discards_finished_uploads() {
        let store = Arc::new(StallsOn { inner: MemoryMediaStore::new(), slow_name: "slow.png" });
        let media: DynMedia = store.clone();
        let mut a = "upload:fast".to_string();
        let mut b = "upload:slow".to_string();
        let files = HashMap::from([("fast".to_string(), file("fast.png")), ("slow".to_string(), file("slow.png"))]);

        // the client goes away while the slow upload is still running
        let abandoned = tokio::time::timeout(
            Duration::from_millis(100),
            resolve_uploads(&media, vec![&mut a, &mut b], files),
        )
        .await;
        assert!(abandoned.is_err());

        for _ in 0..50 {
            if store.inner.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(store.inner.is_empty());
        assert_eq!(a, "upload:fast");
    }
}
