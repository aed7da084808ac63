//! Recording fakes for the capability traits.

use crate::core::error::ProcessManagerError;
use crate::core::traits::{
    CommandLine, CommandOutput, FileSystem, ProcessExecutor, ProcessInfo, ProcessManager,
    ProcessRef, StartOptions, VersionControl,
};
use crate::publishing::progress::{ObserverError, ProgressEvent, ProgressObserver};
use crate::security::CommandError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// A filesystem call as seen by [`FakeFileSystem`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsCall {
    RemoveDirAll(PathBuf),
    CreateDirAll(PathBuf),
    Exists(PathBuf),
    ReadToString(PathBuf),
}

/// In-memory filesystem that records every call.
#[derive(Debug, Default)]
pub struct FakeFileSystem {
    calls: Mutex<Vec<FsCall>>,
    dirs: Mutex<HashSet<PathBuf>>,
    files: Mutex<HashMap<PathBuf, String>>,
    remove_error: Mutex<Option<io::ErrorKind>>,
    create_failures: Mutex<HashSet<PathBuf>>,
}

impl FakeFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.files
            .lock()
            .insert(path.into(), contents.into());
    }

    /// Make every `remove_dir_all` fail with `kind`
    pub fn fail_remove(&self, kind: io::ErrorKind) {
        *self.remove_error.lock() = Some(kind);
    }

    /// Make `create_dir_all(path)` fail with a permission error
    pub fn fail_create(&self, path: impl Into<PathBuf>) {
        self.create_failures.lock().insert(path.into());
    }

    pub fn calls(&self) -> Vec<FsCall> {
        self.calls.lock().clone()
    }

    pub fn has_dir(&self, path: &Path) -> bool {
        self.dirs.lock().contains(path)
    }

    pub fn has_file(&self, path: &Path) -> bool {
        self.files.lock().contains_key(path)
    }

    fn record(&self, call: FsCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl FileSystem for FakeFileSystem {
    async fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        self.record(FsCall::RemoveDirAll(path.to_path_buf()));

        if let Some(kind) = *self.remove_error.lock() {
            return Err(io::Error::from(kind));
        }

        let mut dirs = self.dirs.lock();
        let mut files = self.files.lock();
        let present = dirs.iter().any(|d| d.starts_with(path))
            || files.keys().any(|f| f.starts_with(path));
        if !present {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }

        dirs.retain(|d| !d.starts_with(path));
        files.retain(|f, _| !f.starts_with(path));
        Ok(())
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.record(FsCall::CreateDirAll(path.to_path_buf()));

        if self.create_failures.lock().contains(path) {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        self.dirs.lock().insert(path.to_path_buf());
        Ok(())
    }

    async fn exists(&self, path: &Path) -> io::Result<bool> {
        self.record(FsCall::Exists(path.to_path_buf()));
        Ok(self.has_dir(path) || self.has_file(path))
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.record(FsCall::ReadToString(path.to_path_buf()));
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }
}

/// Version control fake that records clones and can materialize files
/// into a [`FakeFileSystem`] as the checkout.
#[derive(Debug, Default)]
pub struct FakeVcs {
    clones: Mutex<Vec<(String, PathBuf)>>,
    error: Mutex<Option<String>>,
    checkout: Mutex<Option<(Arc<FakeFileSystem>, Vec<(String, String)>)>>,
}

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: impl Into<String>) -> Self {
        let vcs = Self::default();
        *vcs.error.lock() = Some(message.into());
        vcs
    }

    /// Files written relative to the destination on every successful clone
    pub fn with_checkout(fs: Arc<FakeFileSystem>, files: &[(&str, &str)]) -> Self {
        let vcs = Self::default();
        let files = files
            .iter()
            .map(|(name, contents)| (name.to_string(), contents.to_string()))
            .collect();
        *vcs.checkout.lock() = Some((fs, files));
        vcs
    }

    pub fn clones(&self) -> Vec<(String, PathBuf)> {
        self.clones.lock().clone()
    }
}

#[async_trait]
impl VersionControl for FakeVcs {
    async fn clone_repository(&self, remote: &str, destination: &Path) -> anyhow::Result<()> {
        self.clones
            .lock()
            .push((remote.to_string(), destination.to_path_buf()));

        if let Some(message) = self.error.lock().clone() {
            anyhow::bail!(message);
        }

        if let Some((fs, files)) = self.checkout.lock().as_ref() {
            for (name, contents) in files {
                fs.add_file(destination.join(name), contents.clone());
            }
        }
        Ok(())
    }
}

/// Executor fake that records commands and replays queued results.
///
/// Queued results win. Otherwise the stdout registered for the command's
/// first argument is returned, and failing that empty output.
#[derive(Debug, Default)]
pub struct FakeExecutor {
    calls: Mutex<Vec<(CommandLine, PathBuf)>>,
    responses: Mutex<VecDeque<Result<CommandOutput, CommandError>>>,
    stdout_by_subcommand: Mutex<HashMap<String, String>>,
    delays: Mutex<HashMap<String, Duration>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_stdout(&self, stdout: impl Into<String>) {
        self.responses.lock().push_back(Ok(CommandOutput {
            stdout: stdout.into(),
            stderr: String::new(),
        }));
    }

    pub fn push_error(&self, error: CommandError) {
        self.responses.lock().push_back(Err(error));
    }

    /// Answer every `<program> <subcommand> ...` with `stdout`
    pub fn set_stdout_for(&self, subcommand: &str, stdout: impl Into<String>) {
        self.stdout_by_subcommand
            .lock()
            .insert(subcommand.to_string(), stdout.into());
    }

    /// Hold every `<program> <subcommand> ...` for `delay` before answering
    pub fn delay_for(&self, subcommand: &str, delay: Duration) {
        self.delays.lock().insert(subcommand.to_string(), delay);
    }

    pub fn calls(&self) -> Vec<(CommandLine, PathBuf)> {
        self.calls.lock().clone()
    }

    /// Recorded commands rendered as strings
    pub fn commands(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|(command, _)| command.to_string())
            .collect()
    }
}

#[async_trait]
impl ProcessExecutor for FakeExecutor {
    async fn exec(
        &self,
        command: &CommandLine,
        working_dir: &Path,
    ) -> Result<CommandOutput, CommandError> {
        self.calls
            .lock()
            .push((command.clone(), working_dir.to_path_buf()));

        let subcommand = command.args.first().cloned().unwrap_or_default();
        let delay = self.delays.lock().get(&subcommand).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(queued) = self.responses.lock().pop_front() {
            return queued;
        }
        let stdout = self
            .stdout_by_subcommand
            .lock()
            .get(&subcommand)
            .cloned()
            .unwrap_or_default();
        Ok(CommandOutput {
            stdout,
            stderr: String::new(),
        })
    }
}

/// Observer that keeps every event, or rejects them all.
#[derive(Debug, Default)]
pub struct CollectingObserver {
    events: Mutex<Vec<ProgressEvent>>,
    reject: bool,
}

impl CollectingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            reject: true,
        }
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }
}

impl ProgressObserver for CollectingObserver {
    fn emit(&self, event: &ProgressEvent) -> Result<(), ObserverError> {
        if self.reject {
            return Err(ObserverError::Rejected("observer offline".to_string()));
        }
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Process manager fake that records the call sequence.
#[derive(Debug, Default)]
pub struct FakeProcessManager {
    calls: Mutex<Vec<String>>,
    processes: Mutex<Vec<ProcessInfo>>,
    fail_connect: bool,
    fail_operations: bool,
}

impl FakeProcessManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_processes(processes: Vec<ProcessInfo>) -> Self {
        let manager = Self::default();
        *manager.processes.lock() = processes;
        manager
    }

    pub fn refusing_connections() -> Self {
        Self {
            fail_connect: true,
            ..Self::default()
        }
    }

    pub fn failing_operations() -> Self {
        Self {
            fail_operations: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    fn operation(&self, operation: &'static str) -> Result<(), ProcessManagerError> {
        if self.fail_operations {
            return Err(ProcessManagerError::OperationFailed {
                operation,
                message: "daemon rejected request".to_string(),
            });
        }
        Ok(())
    }
}

/// Minimal process description used across tests
pub fn process_info(pm_id: u32, name: &str) -> ProcessInfo {
    ProcessInfo {
        status: Some("online".to_string()),
        pid: Some(1000 + pm_id),
        name: Some(name.to_string()),
        version: None,
        pm_id: Some(pm_id),
        created_at: None,
        uptime_ms: 0,
        namespace: Some("default".to_string()),
        autorestart: true,
        watch: false,
        memory_mb: 0.0,
        cpu: 0.0,
    }
}

#[async_trait]
impl ProcessManager for FakeProcessManager {
    async fn connect(&self) -> Result<(), ProcessManagerError> {
        self.record("connect");
        if self.fail_connect {
            return Err(ProcessManagerError::ConnectionFailed(
                "daemon unreachable".to_string(),
            ));
        }
        Ok(())
    }

    async fn disconnect(&self) {
        self.record("disconnect");
    }

    async fn start(&self, options: &StartOptions) -> Result<Vec<ProcessInfo>, ProcessManagerError> {
        self.record(format!(
            "start {} {}{}",
            options.script.display(),
            options.name,
            if options.watch { " --watch" } else { "" }
        ));
        self.operation("start")?;
        Ok(vec![process_info(0, &options.name)])
    }

    async fn stop(&self, target: &ProcessRef) -> Result<(), ProcessManagerError> {
        self.record(format!("stop {}", target));
        self.operation("stop")
    }

    async fn restart(&self, target: &ProcessRef) -> Result<(), ProcessManagerError> {
        self.record(format!("restart {}", target));
        self.operation("restart")
    }

    async fn delete(&self, target: &ProcessRef) -> Result<(), ProcessManagerError> {
        self.record(format!("delete {}", target));
        self.operation("delete")
    }

    async fn describe(&self, target: &ProcessRef) -> Result<Vec<ProcessInfo>, ProcessManagerError> {
        self.record(format!("describe {}", target));
        self.operation("describe")?;
        let processes = self.processes.lock();
        Ok(processes
            .iter()
            .filter(|p| match target {
                ProcessRef::Id(id) => p.pm_id == Some(*id),
                ProcessRef::Name(name) => p.name.as_deref() == Some(name.as_str()),
            })
            .cloned()
            .collect())
    }

    async fn list(&self) -> Result<Vec<ProcessInfo>, ProcessManagerError> {
        self.record("list");
        self.operation("list")?;
        Ok(self.processes.lock().clone())
    }
}
