//! Repository cloning
//!
//! [`RepositoryCloner`] prepares the destination and delegates the clone to
//! a [`VersionControl`] implementation. [`GitCli`] is the production one and
//! runs `git clone` through the whitelisted executor.

use crate::core::error::PublishError;
use crate::core::traits::{CommandLine, FileSystem, ProcessExecutor, VersionControl};
use crate::publishing::fs_safe::safe_create_dir;
use anyhow::Context;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Clones repositories into fresh destinations
#[derive(Clone)]
pub struct RepositoryCloner {
    fs: Arc<dyn FileSystem>,
    vcs: Arc<dyn VersionControl>,
}

impl RepositoryCloner {
    pub fn new(fs: Arc<dyn FileSystem>, vcs: Arc<dyn VersionControl>) -> Self {
        Self { fs, vcs }
    }

    /// Ensure `destination` exists, then clone `repository` into it
    pub async fn clone_into(&self, repository: &str, destination: &Path) -> Result<(), PublishError> {
        safe_create_dir(self.fs.as_ref(), destination).await?;

        self.vcs
            .clone_repository(repository, destination)
            .await
            .map_err(|e| PublishError::CloneFailed {
                repository: repository.to_string(),
                message: format!("{:#}", e),
            })?;

        info!(repository, destination = %destination.display(), "repository cloned");
        Ok(())
    }
}

/// `git` command-line client
#[derive(Clone)]
pub struct GitCli {
    executor: Arc<dyn ProcessExecutor>,
    binary: String,
}

impl GitCli {
    pub fn new(executor: Arc<dyn ProcessExecutor>, binary: impl Into<String>) -> Self {
        Self {
            executor,
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn clone_repository(&self, remote: &str, destination: &Path) -> anyhow::Result<()> {
        // git runs inside the destination, so the target is "."
        let command = CommandLine::new(&self.binary)
            .arg("clone")
            .arg(remote)
            .arg(".");

        self.executor
            .exec(&command, destination)
            .await
            .with_context(|| format!("{} clone {}", self.binary, remote))?;
        Ok(())
    }
}
