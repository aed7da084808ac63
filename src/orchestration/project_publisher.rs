//! Project Publisher - clone and install orchestration
//!
//! Runs the publish pipeline for one repository:
//! - Clean the publish directory (a missing directory is fine)
//! - Clone the repository into it
//! - Install dependencies when the project carries a manifest
//!
//! A progress event is reported after each completed stage. The first
//! failing stage ends the run; later stages never start and nothing is
//! rolled back.

use crate::core::config::PublishSettings;
use crate::core::error::{PublishError, PublishFailure, PublishStage};
use crate::core::state_machine::{PublishStateMachine, StateTransition};
use crate::core::traits::{FileSystem, ProcessExecutor, VersionControl};
use crate::publishing::cloner::RepositoryCloner;
use crate::publishing::fs_safe::safe_remove_dir;
use crate::publishing::installer::{DependencyInstaller, ProjectKind};
use crate::publishing::progress::{report, ProgressKind, ProgressObserver};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// One publish invocation
#[derive(Clone)]
pub struct PublishRequest {
    /// Remote repository URL or path
    pub repository: String,

    /// Destination directory; relative paths resolve against `publishRoot`
    /// or the current directory
    pub publish_path: PathBuf,

    /// Receives stage notifications (optional)
    pub observer: Option<Arc<dyn ProgressObserver>>,
}

impl PublishRequest {
    pub fn new(repository: impl Into<String>, publish_path: impl Into<PathBuf>) -> Self {
        Self {
            repository: repository.into(),
            publish_path: publish_path.into(),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }
}

/// Publishing report returned after a successful run
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub run_id: Uuid,
    pub repository: String,
    pub publish_path: PathBuf,
    pub project: ProjectKind,
    pub history: Vec<StateTransition>,
    pub duration_ms: u64,
}

pub fn cleaned_message(path: &Path) -> String {
    format!("Directory '{}' cleaned\nCloning repository...", path.display())
}

pub fn cloned_message(repository: &str, path: &Path) -> String {
    format!(
        "{} cloned to {}\nInstalling dependencies...",
        repository,
        path.display()
    )
}

pub const INSTALLED_MESSAGE: &str = "Dependencies installed";

/// Publish pipeline with its collaborators bound once
#[derive(Clone)]
pub struct ProjectPublisher {
    fs: Arc<dyn FileSystem>,
    cloner: RepositoryCloner,
    installer: DependencyInstaller,
    publish_root: Option<PathBuf>,
}

impl ProjectPublisher {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        vcs: Arc<dyn VersionControl>,
        executor: Arc<dyn ProcessExecutor>,
        settings: PublishSettings,
    ) -> Self {
        Self {
            cloner: RepositoryCloner::new(fs.clone(), vcs),
            publish_root: settings.publish_root.clone(),
            installer: DependencyInstaller::new(fs.clone(), executor, settings),
            fs,
        }
    }

    pub fn installer(&self) -> &DependencyInstaller {
        &self.installer
    }

    /// Absolute destination for a requested publish path.
    ///
    /// Relative paths join `publishRoot` when set, otherwise the current
    /// directory.
    pub fn resolve_publish_path(&self, path: &Path) -> PathBuf {
        let joined = match &self.publish_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        };
        std::path::absolute(&joined).unwrap_or(joined)
    }

    /// Run the pipeline. Exactly one of report or failure is returned.
    pub async fn publish(&self, request: PublishRequest) -> Result<PublishReport, PublishFailure> {
        let run_id = Uuid::new_v4();
        let span = info_span!("publish", %run_id, repository = %request.repository);
        self.run(run_id, request).instrument(span).await
    }

    async fn run(&self, run_id: Uuid, request: PublishRequest) -> Result<PublishReport, PublishFailure> {
        let started = Instant::now();
        let observer = request.observer.as_deref();
        let publish_path = self.resolve_publish_path(&request.publish_path);
        let mut machine = PublishStateMachine::new();

        // Cleaning
        enter_next(&mut machine);
        info!(path = %publish_path.display(), "cleaning publish directory");
        if let Err(error) = safe_remove_dir(self.fs.as_ref(), &publish_path).await {
            return Err(abort(&mut machine, PublishStage::Cleaning, error));
        }
        report(observer, ProgressKind::Progress, &cleaned_message(&publish_path));

        // Cloning
        enter_next(&mut machine);
        if let Err(error) = self
            .cloner
            .clone_into(&request.repository, &publish_path)
            .await
        {
            return Err(abort(&mut machine, PublishStage::Cloning, error));
        }
        report(
            observer,
            ProgressKind::Progress,
            &cloned_message(&request.repository, &publish_path),
        );

        // Installing
        enter_next(&mut machine);
        let project = match self.installer.install(&publish_path).await {
            Ok(project) => project,
            Err(error) => return Err(abort(&mut machine, PublishStage::Installing, error)),
        };
        report(observer, ProgressKind::Progress, INSTALLED_MESSAGE);

        enter_next(&mut machine);
        let duration_ms = started.elapsed().as_millis() as u64;
        info!(duration_ms, manageable = project.is_manageable(), "publish complete");

        Ok(PublishReport {
            run_id,
            repository: request.repository,
            publish_path,
            project,
            history: machine.into_transitions(),
            duration_ms,
        })
    }
}

// The pipeline is linear, so these transitions only fail on a bug here.
fn enter_next(machine: &mut PublishStateMachine) {
    if let Err(err) = machine.advance() {
        warn!(%err, "publish state machine out of step");
    }
}

fn abort(machine: &mut PublishStateMachine, stage: PublishStage, error: PublishError) -> PublishFailure {
    if let Err(err) = machine.fail() {
        warn!(%err, "publish state machine out of step");
    }
    warn!(%stage, code = error.code(), %error, "publish failed");
    PublishFailure::new(stage, error)
}
