//! Image storage backends.
//!
//! The catalog never writes image bytes itself; it hands uploads to an
//! [`ImageStorage`] and records the URL and pixel dimensions it gets back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use image::GenericImageView;
use rand::{distr::Alphanumeric, Rng};
use thiserror::Error;

use crate::model::ImageUpload;

/// Failure reported by a storage backend
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("unsupported or corrupt image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// A persisted image as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// Storage collaborator contract
#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// Persist the image and report where it lives and how large it is
    async fn store(&self, upload: &ImageUpload) -> Result<StoredImage, StorageError>;

    /// Remove a previously stored image; unknown URLs are ignored
    async fn discard(&self, url: &str) -> Result<(), StorageError>;
}

/// Stores images as files under a local directory
#[derive(Debug, Clone)]
pub struct LocalImageStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalImageStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn file_name_for(&self, url: &str) -> Option<String> {
        let name = url.strip_prefix(&self.base_url)?.strip_prefix('/')?;
        // Only flat names we issued ourselves
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return None;
        }
        Some(name.to_string())
    }
}

#[async_trait]
impl ImageStorage for LocalImageStorage {
    async fn store(&self, upload: &ImageUpload) -> Result<StoredImage, StorageError> {
        let data = upload.data.clone();
        let (extension, width, height) = tokio::task::spawn_blocking(move || {
            let format = image::guess_format(&data)?;
            let (width, height) = image::load_from_memory_with_format(&data, format)?.dimensions();
            let extension = format.extensions_str().first().copied().unwrap_or("bin");
            Ok::<_, StorageError>((extension, width, height))
        })
        .await
        .map_err(|e| StorageError::Unavailable(e.to_string()))??;

        let stem: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        let name = format!("{stem}.{extension}");

        tokio::fs::create_dir_all(&self.root).await?;

        // Write under a hidden name, then move into place
        let partial = PartialFile::new(self.root.join(format!(".{name}.part")));
        tokio::fs::write(partial.path(), &upload.data).await?;
        tokio::fs::rename(partial.path(), self.root.join(&name)).await?;
        partial.disarm();

        tracing::debug!(file = %name, width, height, "Stored image locally");

        Ok(StoredImage {
            url: format!("{}/{}", self.base_url, name),
            width,
            height,
        })
    }

    async fn discard(&self, url: &str) -> Result<(), StorageError> {
        let Some(name) = self.file_name_for(url) else {
            return Ok(());
        };
        match tokio::fs::remove_file(self.root.join(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Removes an unfinished upload file when dropped before [`disarm`](Self::disarm).
///
/// The upload timeout cancels `store` by dropping its future, so cleanup has to
/// happen on drop rather than on an error path.
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(file = %self.path.display(), "Removed unfinished upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(file = %self.path.display(), error = %e, "Unfinished upload left behind")
            }
        }
    }
}

/// Tries several backends in order until one accepts the upload
#[derive(Clone, Default)]
pub struct FallbackImageStorage {
    backends: Vec<Arc<dyn ImageStorage>>,
}

impl FallbackImageStorage {
    pub fn new(backends: Vec<Arc<dyn ImageStorage>>) -> Self {
        Self { backends }
    }
}

#[async_trait]
impl ImageStorage for FallbackImageStorage {
    async fn store(&self, upload: &ImageUpload) -> Result<StoredImage, StorageError> {
        let mut last_error = None;
        for (index, backend) in self.backends.iter().enumerate() {
            match backend.store(upload).await {
                Ok(stored) => return Ok(stored),
                Err(e) => {
                    tracing::warn!(backend = index, error = %e, "Image backend failed, trying next");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| StorageError::Unavailable("no image backend configured".into())))
    }

    async fn discard(&self, url: &str) -> Result<(), StorageError> {
        let mut last_error = None;
        for backend in &self.backends {
            if let Err(e) = backend.discard(url).await {
                last_error = Some(e);
            }
        }
        last_error.map_or(Ok(()), Err)
    }
}
