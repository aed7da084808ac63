//! Filesystem-safety helpers
//!
//! Wrap a [`FileSystem`] into the uniform contract the publish pipeline
//! relies on:
//! - removal of a missing directory is success
//! - creation of an existing directory is success
//! - an existence check never fails, I/O errors read as "absent"

use crate::core::error::PublishError;
use crate::core::traits::FileSystem;
use async_trait::async_trait;
use std::io;
use std::path::Path;
use tracing::debug;

/// Recursively remove `path`. A directory that is already gone counts as removed.
pub async fn safe_remove_dir(fs: &dyn FileSystem, path: &Path) -> Result<(), PublishError> {
    match fs.remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "nothing to clean");
            Ok(())
        }
        Err(e) => Err(PublishError::CleanupFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        }),
    }
}

/// Recursively create `path`
pub async fn safe_create_dir(fs: &dyn FileSystem, path: &Path) -> Result<(), PublishError> {
    fs.create_dir_all(path)
        .await
        .map_err(|e| PublishError::DirectoryCreateFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

pub async fn file_exists(fs: &dyn FileSystem, path: &Path) -> bool {
    match fs.exists(path).await {
        Ok(exists) => exists,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "existence check failed");
            false
        }
    }
}

/// [`FileSystem`] backed by `tokio::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileSystem;

#[async_trait]
impl FileSystem for TokioFileSystem {
    async fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_dir_all(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn exists(&self, path: &Path) -> io::Result<bool> {
        tokio::fs::try_exists(path).await
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }
}
