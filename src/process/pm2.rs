//! pm2 backend
//!
//! Drives the pm2 command-line client through the whitelisted executor.
//! `connect` pings the daemon (starting it when needed) and opens one
//! connection; every operation refuses to run unless at least one is open.
//! Connections are counted, so overlapping callers sharing one backend
//! cannot close each other's connection.

use crate::core::error::ProcessManagerError;
use crate::core::traits::{
    CommandLine, ProcessExecutor, ProcessInfo, ProcessManager, ProcessRef, StartOptions,
};
use crate::process::description::parse_process_list;
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// [`ProcessManager`] backed by the `pm2` CLI
pub struct Pm2ProcessManager {
    executor: Arc<dyn ProcessExecutor>,
    binary: String,
    working_dir: PathBuf,
    connections: AtomicUsize,
}

impl Pm2ProcessManager {
    /// `working_dir` is where pm2 commands run; relative script paths are
    /// resolved by the caller before reaching this backend.
    pub fn new(
        executor: Arc<dyn ProcessExecutor>,
        binary: impl Into<String>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            executor,
            binary: binary.into(),
            working_dir: working_dir.into(),
            connections: AtomicUsize::new(0),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connections.load(Ordering::SeqCst) > 0
    }

    fn ensure_connected(&self, operation: &'static str) -> Result<(), ProcessManagerError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(ProcessManagerError::NotConnected(operation))
        }
    }

    async fn run(
        &self,
        operation: &'static str,
        args: Vec<String>,
    ) -> Result<String, ProcessManagerError> {
        self.ensure_connected(operation)?;

        let command = CommandLine::new(&self.binary).args(args);
        let output = self
            .executor
            .exec(&command, &self.working_dir)
            .await
            .map_err(|e| ProcessManagerError::OperationFailed {
                operation,
                message: e.to_string(),
            })?;
        Ok(output.stdout)
    }

    async fn jlist(&self, operation: &'static str) -> Result<Vec<ProcessInfo>, ProcessManagerError> {
        let stdout = self.run(operation, vec!["jlist".to_string()]).await?;
        parse_process_list(&stdout, Utc::now())
    }
}

fn matches_ref(info: &ProcessInfo, target: &ProcessRef) -> bool {
    match target {
        ProcessRef::Id(id) => info.pm_id == Some(*id),
        ProcessRef::Name(name) => info.name.as_deref() == Some(name.as_str()),
    }
}

#[async_trait]
impl ProcessManager for Pm2ProcessManager {
    async fn connect(&self) -> Result<(), ProcessManagerError> {
        let command = CommandLine::new(&self.binary).arg("ping");
        self.executor
            .exec(&command, &self.working_dir)
            .await
            .map_err(|e| ProcessManagerError::ConnectionFailed(e.to_string()))?;

        let open = self.connections.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(binary = %self.binary, open, "connected to process manager");
        Ok(())
    }

    async fn disconnect(&self) {
        let released = self
            .connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |open| open.checked_sub(1));
        if let Ok(open) = released {
            debug!(binary = %self.binary, open = open - 1, "disconnected from process manager");
        }
    }

    async fn start(&self, options: &StartOptions) -> Result<Vec<ProcessInfo>, ProcessManagerError> {
        let mut args = vec![
            "start".to_string(),
            options.script.to_string_lossy().into_owned(),
            "--name".to_string(),
            options.name.clone(),
        ];
        if options.watch {
            args.push("--watch".to_string());
        }
        self.run("start", args).await?;

        let target = ProcessRef::Name(options.name.clone());
        Ok(self
            .jlist("start")
            .await?
            .into_iter()
            .filter(|p| matches_ref(p, &target))
            .collect())
    }

    async fn stop(&self, target: &ProcessRef) -> Result<(), ProcessManagerError> {
        self.run("stop", vec!["stop".to_string(), target.to_string()])
            .await
            .map(|_| ())
    }

    async fn restart(&self, target: &ProcessRef) -> Result<(), ProcessManagerError> {
        self.run("restart", vec!["restart".to_string(), target.to_string()])
            .await
            .map(|_| ())
    }

    async fn delete(&self, target: &ProcessRef) -> Result<(), ProcessManagerError> {
        self.run("delete", vec!["delete".to_string(), target.to_string()])
            .await
            .map(|_| ())
    }

    async fn describe(&self, target: &ProcessRef) -> Result<Vec<ProcessInfo>, ProcessManagerError> {
        let matching: Vec<ProcessInfo> = self
            .jlist("describe")
            .await?
            .into_iter()
            .filter(|p| matches_ref(p, target))
            .collect();

        if matching.is_empty() {
            return Err(ProcessManagerError::NotFound(target.to_string()));
        }
        Ok(matching)
    }

    async fn list(&self) -> Result<Vec<ProcessInfo>, ProcessManagerError> {
        self.jlist("list").await
    }
}
