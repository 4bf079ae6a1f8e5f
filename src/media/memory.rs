use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{MediaError, MediaStore};

const URL_PREFIX: &str = "memory://media/";

/// Keeps uploaded objects in process memory.
#[derive(Default)]
pub struct MemoryMediaStore {
    objects: Mutex<HashMap<String, Bytes>>,
    next_id: AtomicU64,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.objects.lock().contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn upload(&self, data: Bytes, suggested_name: &str) -> Result<String, MediaError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let url = format!("{URL_PREFIX}{id}-{}", suggested_name.replace('/', "_"));
        self.objects.lock().insert(url.clone(), data);
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<(), MediaError> {
        if !url.starts_with(URL_PREFIX) {
            return Err(MediaError::UnknownUrl(url.to_string()));
        }
        self.objects.lock().remove(url);
        Ok(())
    }

    fn manages(&self, url: &str) -> bool {
        url.starts_with(URL_PREFIX)
    }
}
