//! Dependency installation
//!
//! A cloned directory is a manageable project when it carries the manifest
//! file (`package.json` by default). For such projects the module directory
//! is created first, so the package manager installs locally instead of
//! walking up into an ancestor's module directory, and then the configured
//! install command runs in the project directory.

use crate::core::config::PublishSettings;
use crate::core::error::PublishError;
use crate::core::traits::{CommandLine, FileSystem, ProcessExecutor};
use crate::publishing::fs_safe::{file_exists, safe_create_dir};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Entry point used when the manifest names none
const DEFAULT_ENTRY_POINT: &str = "index.js";

/// What the publish pipeline found in the cloned directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProjectKind {
    /// Manifest present; dependencies were installed
    Managed { manifest: PathBuf },
    /// No manifest; nothing to install
    Plain,
}

impl ProjectKind {
    pub fn is_manageable(&self) -> bool {
        matches!(self, ProjectKind::Managed { .. })
    }
}

/// Fields of the manifest this crate reads
#[derive(Debug, Deserialize)]
struct PackageManifest {
    main: Option<String>,
}

/// Installs dependencies of manageable projects
#[derive(Clone)]
pub struct DependencyInstaller {
    fs: Arc<dyn FileSystem>,
    executor: Arc<dyn ProcessExecutor>,
    settings: PublishSettings,
}

impl DependencyInstaller {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        executor: Arc<dyn ProcessExecutor>,
        settings: PublishSettings,
    ) -> Self {
        Self {
            fs,
            executor,
            settings,
        }
    }

    pub async fn detect(&self, project_path: &Path) -> ProjectKind {
        let manifest = project_path.join(&self.settings.manifest_file);
        if file_exists(self.fs.as_ref(), &manifest).await {
            ProjectKind::Managed { manifest }
        } else {
            ProjectKind::Plain
        }
    }

    /// Install dependencies for the project at `project_path`.
    ///
    /// Plain projects succeed without side effects. For managed projects
    /// the installer is never invoked unless the module directory exists.
    pub async fn install(&self, project_path: &Path) -> Result<ProjectKind, PublishError> {
        let kind = self.detect(project_path).await;
        if !kind.is_manageable() {
            debug!(path = %project_path.display(), "no manifest, skipping install");
            return Ok(kind);
        }

        safe_create_dir(
            self.fs.as_ref(),
            &project_path.join(&self.settings.modules_dir),
        )
        .await?;

        let command = CommandLine::parse(&self.settings.install_command).map_err(|e| {
            PublishError::DependencyInstallFailed {
                path: project_path.to_path_buf(),
                message: e.to_string(),
            }
        })?;

        info!(command = %command, path = %project_path.display(), "installing dependencies");
        self.executor
            .exec(&command, project_path)
            .await
            .map_err(|e| PublishError::DependencyInstallFailed {
                path: project_path.to_path_buf(),
                message: e.to_string(),
            })?;

        Ok(kind)
    }

    /// Script a process manager should run for this project.
    ///
    /// Reads `main` from the manifest, falling back to `index.js`. Returns
    /// `None` for plain projects and for manifests that cannot be read.
    pub async fn resolve_entry_point(&self, project_path: &Path) -> Option<PathBuf> {
        let ProjectKind::Managed { manifest } = self.detect(project_path).await else {
            return None;
        };

        let contents = match self.fs.read_to_string(&manifest).await {
            Ok(contents) => contents,
            Err(e) => {
                debug!(path = %manifest.display(), error = %e, "manifest unreadable");
                return None;
            }
        };

        let parsed: PackageManifest = match serde_json::from_str(&contents) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(path = %manifest.display(), error = %e, "manifest is not valid JSON");
                return None;
            }
        };

        let main = parsed
            .main
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ENTRY_POINT.to_string());
        Some(project_path.join(main))
    }
}
