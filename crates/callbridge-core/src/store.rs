//! Directory-backed storage for greeting and reply audio.
//!
//! Files are written to a temporary name and renamed into place, so a reader
//! never observes a partially written file.

use crate::error::StoreError;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Extension every stored audio file carries.
pub const AUDIO_EXTENSION: &str = ".wav";

/// URL path prefix under which stored audio is served.
pub const AUDIO_ROUTE_PREFIX: &str = "/audio/";

#[derive(Debug, Clone)]
pub struct AudioStore {
    dir: PathBuf,
}

/// Checks that `name` is a plain `.wav` file name with no path components.
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    let invalid = name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
        || name.starts_with('.')
        || !name.ends_with(AUDIO_EXTENSION)
        || name.len() == AUDIO_EXTENSION.len();

    if invalid {
        Err(StoreError::InvalidName(name.to_string()))
    } else {
        Ok(())
    }
}

impl AudioStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the storage directory if it does not exist.
    pub async fn ensure_dir(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Maps a file name to its path inside the store after validating it.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, StoreError> {
        validate_name(name)?;
        Ok(self.dir.join(name))
    }

    pub async fn exists(&self, name: &str) -> bool {
        match self.resolve(name) {
            Ok(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Writes `bytes` under `name`, replacing any previous file atomically.
    pub async fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let path = self.resolve(name)?;
        self.ensure_dir().await?;

        let tmp = self.dir.join(format!(".{}.{}.tmp", name, Uuid::new_v4()));
        if let Err(e) = tokio::fs::write(&tmp, bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::debug!(file = name, bytes = bytes.len(), "stored audio file");
        Ok(path)
    }

    /// A fresh, never-reused file name for a turn reply.
    pub fn new_reply_name() -> String {
        format!("reply-{}{}", Uuid::new_v4(), AUDIO_EXTENSION)
    }

    /// Public URL of a stored file.
    pub fn url_for(host: &str, name: &str) -> String {
        format!("https://{}{}{}", host, AUDIO_ROUTE_PREFIX, name)
    }
}
