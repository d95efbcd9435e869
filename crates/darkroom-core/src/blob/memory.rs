//! In-process blob store for tests and embedding.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Cursor;
use tokio::sync::Mutex;

use super::{validate_key, BlobStore, BlobStream};
use crate::error::BlobError;

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently stored, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let blobs = self.blobs.lock().await;
        let mut keys: Vec<String> = blobs.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.blobs.lock().await.get(path).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn load(&self, path: &str) -> Result<BlobStream, BlobError> {
        validate_key(path)?;
        let blobs = self.blobs.lock().await;
        let bytes = blobs
            .get(path)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(path.to_string()))?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    async fn save(&self, path: &str, data: &[u8]) -> Result<(), BlobError> {
        validate_key(path)?;
        self.blobs
            .lock()
            .await
            .insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), BlobError> {
        validate_key(path)?;
        self.blobs
            .lock()
            .await
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| BlobError::NotFound(path.to_string()))
    }

    async fn exists(&self, path: &str) -> Result<bool, BlobError> {
        validate_key(path)?;
        Ok(self.blobs.lock().await.contains_key(path))
    }
}
