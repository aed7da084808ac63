//! Scoped access to a process manager
//!
//! Every call opens a connection, runs exactly one operation and closes the
//! connection again, whether the operation succeeded or not. Nothing is
//! held between calls.

use crate::core::error::ProcessManagerError;
use crate::core::traits::{ProcessInfo, ProcessManager, ProcessRef, StartOptions};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Connect-operate-disconnect wrapper over a [`ProcessManager`]
#[derive(Clone)]
pub struct ProcessSupervisor {
    manager: Arc<dyn ProcessManager>,
    script_root: Option<PathBuf>,
}

impl ProcessSupervisor {
    pub fn new(manager: Arc<dyn ProcessManager>) -> Self {
        Self {
            manager,
            script_root: None,
        }
    }

    /// Resolve relative script paths against `root`
    pub fn with_script_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.script_root = Some(root.into());
        self
    }

    pub fn resolve_script(&self, script: &Path) -> PathBuf {
        match &self.script_root {
            Some(root) if script.is_relative() => root.join(script),
            _ => script.to_path_buf(),
        }
    }

    async fn scoped<T, F>(
        &self,
        operation: &'static str,
        run: impl FnOnce(Arc<dyn ProcessManager>) -> F,
    ) -> Result<T, ProcessManagerError>
    where
        F: Future<Output = Result<T, ProcessManagerError>>,
    {
        // only a connection that was opened is released
        let result = match self.manager.connect().await {
            Ok(()) => {
                let result = run(self.manager.clone()).await;
                self.manager.disconnect().await;
                result
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(_) => debug!(operation, "process manager operation complete"),
            Err(e) => warn!(operation, code = e.code(), error = %e, "process manager operation failed"),
        }
        result
    }

    /// Start `script` under `name` without file watching
    pub async fn run(
        &self,
        script: &Path,
        name: &str,
    ) -> Result<Vec<ProcessInfo>, ProcessManagerError> {
        self.start(StartOptions {
            script: script.to_path_buf(),
            name: name.to_string(),
            watch: false,
        })
        .await
    }

    /// Start `script` under `name`, restarting on file changes
    pub async fn watch(
        &self,
        script: &Path,
        name: &str,
    ) -> Result<Vec<ProcessInfo>, ProcessManagerError> {
        self.start(StartOptions {
            script: script.to_path_buf(),
            name: name.to_string(),
            watch: true,
        })
        .await
    }

    pub async fn start(
        &self,
        mut options: StartOptions,
    ) -> Result<Vec<ProcessInfo>, ProcessManagerError> {
        options.script = self.resolve_script(&options.script);
        self.scoped("start", |pm| async move { pm.start(&options).await })
            .await
    }

    /// Stop a process but keep it registered
    pub async fn stop(&self, target: &ProcessRef) -> Result<(), ProcessManagerError> {
        let target = target.clone();
        self.scoped("stop", |pm| async move { pm.stop(&target).await })
            .await
    }

    pub async fn restart(&self, target: &ProcessRef) -> Result<(), ProcessManagerError> {
        let target = target.clone();
        self.scoped("restart", |pm| async move { pm.restart(&target).await })
            .await
    }

    /// Stop a process and remove it from the manager
    pub async fn kill(&self, target: &ProcessRef) -> Result<(), ProcessManagerError> {
        let target = target.clone();
        self.scoped("kill", |pm| async move { pm.delete(&target).await })
            .await
    }

    pub async fn describe(
        &self,
        target: &ProcessRef,
    ) -> Result<Vec<ProcessInfo>, ProcessManagerError> {
        let target = target.clone();
        self.scoped("describe", |pm| async move { pm.describe(&target).await })
            .await
    }

    pub async fn list(&self) -> Result<Vec<ProcessInfo>, ProcessManagerError> {
        self.scoped("list", |pm| async move { pm.list().await })
            .await
    }
}
