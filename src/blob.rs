// Mirroring of inline token icons into a blob store.

use std::path::PathBuf;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid object name: {0}")]
    InvalidName(String),
}

/// Stores blobs under logical object names and hands back their public URL.
///
/// Storing an object name that already exists returns the existing URL.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn store(&self, object_name: &str, bytes: &[u8], content_type: &str) -> Result<String, BlobError>;
}

/// Filesystem-backed store served from `base_url`.
pub struct LocalBlobStore {
    root: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, object_name: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), object_name)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, object_name: &str, bytes: &[u8], content_type: &str) -> Result<String, BlobError> {
        if object_name.is_empty() || object_name.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(BlobError::InvalidName(object_name.to_string()));
        }

        let path = self.root.join(object_name);
        if tokio::fs::try_exists(&path).await? {
            debug!("Reusing existing blob {}", object_name);
            return Ok(self.url_for(object_name));
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!("Stored blob {} ({}, {} bytes)", object_name, content_type, bytes.len());

        Ok(self.url_for(object_name))
    }
}

/// Replace an inline `data:image/...;base64,` icon by the URL of its mirrored copy.
///
/// URLs, empty values and anything that is not inline image data are returned
/// unchanged, as is the original value when decoding or storing fails.
pub async fn mirror_icon(store: &dyn BlobStore, icon: &str, object_name: &str) -> String {
    if !icon.starts_with("data:image") {
        return icon.to_string();
    }

    let Some((header, payload)) = icon.split_once(',') else {
        return icon.to_string();
    };
    let Some(content_type) = header
        .strip_prefix("data:")
        .and_then(|h| h.strip_suffix(";base64"))
    else {
        return icon.to_string();
    };

    let bytes = match STANDARD.decode(payload.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Icon for {} is not valid base64: {}", object_name, e);
            return icon.to_string();
        }
    };

    match store.store(object_name, &bytes, content_type).await {
        Ok(url) => url,
        Err(e) => {
            warn!("Failed to mirror icon {}: {}", object_name, e);
            icon.to_string()
        }
    }
}
