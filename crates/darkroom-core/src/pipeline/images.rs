//! Upload, retrieval and deletion of original images.

use std::sync::Arc;

use chrono::Utc;
use tracing::{Instrument, Span};

use crate::blob::{BlobStore, BlobStream};
use crate::error::{ServiceError, StoreError};
use crate::paths::{original_path, processed_path};
use crate::store::ImageStore;
use crate::types::{Image, ImageId, TaskType};

pub struct ImageService {
    images: Arc<dyn ImageStore>,
    blobs: Arc<dyn BlobStore>,
    max_upload_bytes: u64,
    span: Span,
}

impl ImageService {
    pub fn new(
        images: Arc<dyn ImageStore>,
        blobs: Arc<dyn BlobStore>,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            images,
            blobs,
            max_upload_bytes,
            span: Span::none(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Store `bytes` as a new original with extension `ext` (e.g. `.jpg`).
    ///
    /// The blob is written first; if the row cannot be created the blob is
    /// removed again.
    pub async fn upload(&self, bytes: &[u8], ext: &str) -> Result<Image, ServiceError> {
        self.store_upload(bytes, ext)
            .instrument(self.span.clone())
            .await
    }

    async fn store_upload(&self, bytes: &[u8], ext: &str) -> Result<Image, ServiceError> {
        validate_extension(ext)?;
        if bytes.is_empty() {
            return Err(ServiceError::Validation("upload is empty".into()));
        }
        if bytes.len() as u64 > self.max_upload_bytes {
            return Err(ServiceError::Validation(format!(
                "upload of {} bytes exceeds the {} byte limit",
                bytes.len(),
                self.max_upload_bytes
            )));
        }

        let id = ImageId::new();
        let path = original_path(id, &ext.to_ascii_lowercase());
        self.blobs.save(&path, bytes).await?;

        let image = Image {
            id,
            path,
            uploaded_at: Utc::now(),
        };
        if let Err(e) = self.images.create_image(&image).await {
            if let Err(cleanup) = self.blobs.delete(&image.path).await {
                tracing::warn!("Failed to remove {} after aborted upload: {}", image.path, cleanup);
            }
            return Err(e.into());
        }

        tracing::info!(image_id = %id, "Uploaded {} ({} bytes)", image.path, bytes.len());
        Ok(image)
    }

    pub async fn get(&self, id: ImageId) -> Result<Image, ServiceError> {
        self.images
            .get_image(id)
            .await
            .map_err(|e| image_lookup_error(e, id))
    }

    /// Blob key of the original, or of its `processed` variant.
    pub async fn image_path(
        &self,
        id: ImageId,
        processed: Option<TaskType>,
    ) -> Result<String, ServiceError> {
        let image = self.get(id).await?;
        Ok(match processed {
            Some(action) => processed_path(&image.path, action),
            None => image.path,
        })
    }

    /// Open the original (or a processed variant) for reading.
    pub async fn open(
        &self,
        id: ImageId,
        processed: Option<TaskType>,
    ) -> Result<BlobStream, ServiceError> {
        let path = self.image_path(id, processed).await?;
        Ok(self.blobs.load(&path).await?)
    }

    /// Delete the original, any processed variants, then the row (and with
    /// it every task for the image).
    pub async fn delete(&self, id: ImageId) -> Result<(), ServiceError> {
        self.remove(id).instrument(self.span.clone()).await
    }

    async fn remove(&self, id: ImageId) -> Result<(), ServiceError> {
        let image = self.get(id).await?;

        match self.blobs.delete(&image.path).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::warn!("Original {} was already gone", image.path);
            }
            Err(e) => return Err(e.into()),
        }

        for action in TaskType::ALL {
            let variant = processed_path(&image.path, action);
            match self.blobs.delete(&variant).await {
                Ok(()) => tracing::debug!("Removed {}", variant),
                Err(e) if e.is_not_found() => {}
                Err(e) => tracing::warn!("Failed to remove {}: {}", variant, e),
            }
        }

        self.images
            .delete_image(id)
            .await
            .map_err(|e| image_lookup_error(e, id))?;
        tracing::info!(image_id = %id, "Deleted image");
        Ok(())
    }
}

fn image_lookup_error(err: StoreError, id: ImageId) -> ServiceError {
    if err.is_not_found() {
        ServiceError::ImageNotFound(id)
    } else {
        err.into()
    }
}

/// A dot followed by 1-10 ASCII alphanumerics.
fn validate_extension(ext: &str) -> Result<(), ServiceError> {
    let body = ext.strip_prefix('.').unwrap_or("");
    if body.is_empty() || body.len() > 10 || !body.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ServiceError::Validation(format!(
            "invalid file extension {ext:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::{read_all, MemoryBlobStore};
    use crate::error::StoreError;
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    struct RejectingImageStore;

    #[async_trait]
    impl ImageStore for RejectingImageStore {
        async fn create_image(&self, _image: &Image) -> Result<(), StoreError> {
            Err(StoreError::backend("store.image.create", "read-only database"))
        }
        async fn get_image(&self, id: ImageId) -> Result<Image, StoreError> {
            Err(StoreError::NotFound {
                entity: "image",
                id: id.to_string(),
            })
        }
        async fn delete_image(&self, _id: ImageId) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn service() -> (ImageService, Arc<MemoryStore>, Arc<MemoryBlobStore>) {
        let store = Arc::new(MemoryStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let svc = ImageService::new(store.clone(), blobs.clone(), 1024);
        (svc, store, blobs)
    }

    #[tokio::test]
    async fn test_upload_stores_blob_and_row() {
        let (svc, store, blobs) = service();
        let image = svc.upload(b"bytes", ".JPG").await.unwrap();

        assert_eq!(image.path, format!("original/{}.jpg", image.id));
        assert_eq!(blobs.get(&image.path).await.unwrap(), b"bytes");
        assert_eq!(store.get_image(image.id).await.unwrap(), image);
    }

    #[tokio::test]
    async fn test_upload_validation() {
        let (svc, _, blobs) = service();
        for ext in ["jpg", ".", ".j/pg", ".averyverylongext"] {
            let err = svc.upload(b"x", ext).await.unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)), "{ext}");
        }
        assert!(matches!(
            svc.upload(&[0u8; 2048], ".png").await,
            Err(ServiceError::Validation(_))
        ));
        assert!(blobs.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_row_insert_removes_blob() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let svc = ImageService::new(Arc::new(RejectingImageStore), blobs.clone(), 1024);

        let err = svc.upload(b"bytes", ".png").await.unwrap_err();
        assert!(matches!(err, ServiceError::Store(_)));
        assert!(blobs.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_image_path_and_open() {
        let (svc, _, blobs) = service();
        let image = svc.upload(b"orig", ".png").await.unwrap();

        let processed = svc
            .image_path(image.id, Some(TaskType::Thumbnail))
            .await
            .unwrap();
        assert_eq!(processed, format!("processed/{}_thumbnail.png", image.id));

        let mut stream = svc.open(image.id, None).await.unwrap();
        assert_eq!(read_all(&mut stream, &image.path).await.unwrap(), b"orig");

        // Not produced yet
        assert!(matches!(
            svc.open(image.id, Some(TaskType::Thumbnail)).await,
            Err(ServiceError::BlobNotFound(_))
        ));

        blobs.save(&processed, b"thumb").await.unwrap();
        assert!(svc.open(image.id, Some(TaskType::Thumbnail)).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_image() {
        let (svc, _, _) = service();
        let err = svc.image_path(ImageId::new(), None).await.unwrap_err();
        assert!(matches!(err, ServiceError::ImageNotFound(_)));
        let err = svc.delete(ImageId::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::ImageNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_removes_original_and_variants() {
        let (svc, store, blobs) = service();
        let image = svc.upload(b"orig", ".jpg").await.unwrap();
        let resized = processed_path(&image.path, TaskType::Resize);
        blobs.save(&resized, b"resized").await.unwrap();

        svc.delete(image.id).await.unwrap();
        assert!(blobs.keys().await.is_empty());
        assert!(store.get_image(image.id).await.unwrap_err().is_not_found());
    }
}
