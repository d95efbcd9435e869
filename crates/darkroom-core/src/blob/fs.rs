//! Filesystem-backed blob store.

use async_trait::async_trait;
use std::io::ErrorKind as IoErrorKind;
use std::path::PathBuf;

use super::{validate_key, BlobStore, BlobStream};
use crate::error::BlobError;

/// Stores each blob as a file under `root`, keyed by its relative path.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never observes a partially written output.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, BlobError> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |acc, seg| acc.join(seg)))
    }
}

fn io_error(op: &'static str, key: &str, source: std::io::Error) -> BlobError {
    if source.kind() == IoErrorKind::NotFound {
        BlobError::NotFound(key.to_string())
    } else {
        BlobError::Io {
            op,
            path: key.to_string(),
            source,
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn load(&self, path: &str) -> Result<BlobStream, BlobError> {
        let file_path = self.resolve(path)?;
        let file = tokio::fs::File::open(&file_path)
            .await
            .map_err(|e| io_error("open", path, e))?;
        Ok(Box::new(file))
    }

    async fn save(&self, path: &str, data: &[u8]) -> Result<(), BlobError> {
        let file_path = self.resolve(path)?;
        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| BlobError::Io {
                    op: "create_dir",
                    path: path.to_string(),
                    source,
                })?;
        }

        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp_path =
            file_path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

        let write_err = |source| BlobError::Io {
            op: "write",
            path: path.to_string(),
            source,
        };
        tokio::fs::write(&tmp_path, data).await.map_err(write_err)?;
        if let Err(source) = tokio::fs::rename(&tmp_path, &file_path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(write_err(source));
        }

        tracing::debug!("Saved blob {} ({} bytes)", path, data.len());
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), BlobError> {
        let file_path = self.resolve(path)?;
        tokio::fs::remove_file(&file_path)
            .await
            .map_err(|e| io_error("delete", path, e))
    }

    async fn exists(&self, path: &str) -> Result<bool, BlobError> {
        let file_path = self.resolve(path)?;
        tokio::fs::try_exists(&file_path)
            .await
            .map_err(|e| io_error("stat", path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::read_all;

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        store.save("original/abc.jpg", b"pixels").await.unwrap();
        assert!(dir.path().join("original").join("abc.jpg").exists());

        let mut stream = store.load("original/abc.jpg").await.unwrap();
        let bytes = read_all(&mut stream, "original/abc.jpg").await.unwrap();
        assert_eq!(bytes, b"pixels");
    }

    #[tokio::test]
    async fn test_save_replaces_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        store.save("processed/a_resize.jpg", b"one").await.unwrap();
        store.save("processed/a_resize.jpg", b"two").await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("processed"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            std::fs::read(dir.path().join("processed/a_resize.jpg")).unwrap(),
            b"two"
        );
    }

    #[tokio::test]
    async fn test_missing_blob_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        assert!(matches!(
            store.load("original/missing.jpg").await,
            Err(BlobError::NotFound(_))
        ));
        assert!(matches!(
            store.delete("original/missing.jpg").await,
            Err(BlobError::NotFound(_))
        ));
        assert!(!store.exists("original/missing.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().join("root"));

        let err = store.save("../outside.jpg", b"x").await.err().unwrap();
        assert!(matches!(err, BlobError::InvalidKey(_)));
        assert!(!dir.path().join("outside.jpg").exists());
    }

    #[tokio::test]
    async fn test_delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        store.save("original/x.png", b"x").await.unwrap();
        assert!(store.exists("original/x.png").await.unwrap());
        store.delete("original/x.png").await.unwrap();
        assert!(!store.exists("original/x.png").await.unwrap());
    }
}
