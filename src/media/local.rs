use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::{MediaError, MediaStore};

/// Media store writing into a local directory that the app serves at `/uploads`.
pub struct LocalMediaStore {
    root: PathBuf,
    url_prefix: String,
}

impl LocalMediaStore {
    pub async fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Result<Self, MediaError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            url_prefix: format!("{}/uploads/", public_base_url.trim_end_matches('/')),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_name(&self, url: &str) -> Option<String> {
        let name = url.strip_prefix(&self.url_prefix)?;
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.starts_with('.') {
            return None;
        }
        Some(name.to_string())
    }
}

fn extension_of(suggested_name: &str) -> String {
    let ext = Path::new(suggested_name)
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("bin")
        .to_ascii_lowercase();
    if ext.is_empty() || ext.len() > 10 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        "bin".to_string()
    } else {
        ext
    }
}

/// Removes a file that an interrupted upload left behind.
struct PartialFile {
    path: Option<PathBuf>,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn keep(mut self) {
        self.path = None;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), "failed to remove partial upload: {}", e);
                }
            }
        }
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn upload(&self, data: Bytes, suggested_name: &str) -> Result<String, MediaError> {
        let fname = format!("{}-{}.{}", Uuid::new_v4(), chrono::Utc::now().timestamp(), extension_of(suggested_name));
        let partial = self.root.join(format!(".{fname}.part"));
        let path = self.root.join(&fname);

        // both guards fire if the upload is dropped half way
        let partial_guard = PartialFile::new(partial.clone());
        let final_guard = PartialFile::new(path.clone());
        tokio::fs::write(&partial, &data).await?;
        tokio::fs::rename(&partial, &path).await?;
        partial_guard.keep();
        final_guard.keep();

        tracing::debug!(path = %path.display(), bytes = data.len(), "stored upload");
        Ok(format!("{}{}", self.url_prefix, fname))
    }

    async fn delete(&self, url: &str) -> Result<(), MediaError> {
        let name = self.object_name(url).ok_or_else(|| MediaError::UnknownUrl(url.to_string()))?;
        match tokio::fs::remove_file(self.root.join(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn manages(&self, url: &str) -> bool {
        self.object_name(url).is_some()
    }
}
