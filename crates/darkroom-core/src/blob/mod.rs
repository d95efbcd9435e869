//! Blob storage for original uploads and transformation outputs.
//!
//! Keys are relative, `/`-separated paths such as `original/<uuid>.jpg`.

mod fs;
mod memory;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::BlobError;

/// An open blob. Dropping it releases the underlying handle.
pub type BlobStream = Box<dyn AsyncRead + Send + Unpin>;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Open the blob at `path` for reading.
    async fn load(&self, path: &str) -> Result<BlobStream, BlobError>;

    /// Write `data` at `path`, replacing any existing blob.
    async fn save(&self, path: &str, data: &[u8]) -> Result<(), BlobError>;

    /// Remove the blob at `path`.
    async fn delete(&self, path: &str) -> Result<(), BlobError>;

    async fn exists(&self, path: &str) -> Result<bool, BlobError>;
}

/// Drain a blob stream into memory.
pub async fn read_all(stream: &mut BlobStream, path: &str) -> Result<Vec<u8>, BlobError> {
    let mut buf = Vec::new();
    stream
        .read_to_end(&mut buf)
        .await
        .map_err(|source| BlobError::Io {
            op: "read",
            path: path.to_string(),
            source,
        })?;
    Ok(buf)
}

/// Reject keys that could escape the store root.
pub(crate) fn validate_key(key: &str) -> Result<(), BlobError> {
    let bad_segment = key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if key.is_empty() || bad_segment || key.contains('\\') {
        return Err(BlobError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("original/abc.jpg").is_ok());
        assert!(validate_key("a/b/c.png").is_ok());

        for bad in ["", "/etc/passwd", "original/../x", "./x", "a//b", "a\\b", "dir/"] {
            assert!(
                matches!(validate_key(bad), Err(BlobError::InvalidKey(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
