//! Core traits and types for publishing and process control
//!
//! This module defines the capability interfaces the rest of the crate is
//! written against. Each external collaborator (filesystem, version
//! control, subprocess execution, process manager) sits behind one narrow
//! async trait so the publish pipeline and the process supervisor can be
//! driven by test doubles.

use crate::core::error::ProcessManagerError;
use crate::security::CommandError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

// ============================================================================
// Filesystem
// ============================================================================

/// Filesystem operations used by the publish pipeline
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Recursively remove a directory and its contents
    async fn remove_dir_all(&self, path: &Path) -> std::io::Result<()>;

    /// Recursively create a directory; an existing directory is not an error
    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()>;

    /// Check whether a path exists
    async fn exists(&self, path: &Path) -> std::io::Result<bool>;

    /// Read a file as UTF-8
    async fn read_to_string(&self, path: &Path) -> std::io::Result<String>;
}

// ============================================================================
// Version control
// ============================================================================

/// Version control tool able to clone a remote repository
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Clone `remote` into the existing directory `destination`
    async fn clone_repository(&self, remote: &str, destination: &Path) -> anyhow::Result<()>;
}

// ============================================================================
// Subprocess execution
// ============================================================================

/// A program and its arguments, never passed through a shell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Split a configured command string such as `npm install` on whitespace
    pub fn parse(command: &str) -> Result<Self, CommandError> {
        let mut parts = command.split_whitespace();
        let program = parts.next().ok_or(CommandError::EmptyCommand)?;
        Ok(Self::new(program).args(parts))
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured output of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs a command in a working directory and resolves once it exits
///
/// A non-zero exit status is reported as an error.
#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    async fn exec(
        &self,
        command: &CommandLine,
        working_dir: &Path,
    ) -> Result<CommandOutput, CommandError>;
}

// ============================================================================
// Process manager
// ============================================================================

/// Reference to a managed process: numeric id or name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProcessRef {
    Id(u32),
    Name(String),
}

impl FromStr for ProcessRef {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.parse::<u32>() {
            Ok(id) => ProcessRef::Id(id),
            Err(_) => ProcessRef::Name(s.to_string()),
        })
    }
}

impl fmt::Display for ProcessRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessRef::Id(id) => write!(f, "{}", id),
            ProcessRef::Name(name) => f.write_str(name),
        }
    }
}

/// Options for starting a managed process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartOptions {
    /// Path to the script to run
    pub script: PathBuf,
    /// Alias used to reference the process
    pub name: String,
    /// Restart on file changes
    #[serde(default)]
    pub watch: bool,
}

/// Normalized description of a managed process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub status: Option<String>,
    pub pid: Option<u32>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub pm_id: Option<u32>,
    pub created_at: Option<DateTime<Utc>>,
    /// Milliseconds since `created_at`
    pub uptime_ms: i64,
    pub namespace: Option<String>,
    pub autorestart: bool,
    pub watch: bool,
    /// Resident memory in megabytes
    pub memory_mb: f64,
    /// CPU usage in percent
    pub cpu: f64,
}

/// Process manager operations
///
/// Each operation expects an open connection; [`ProcessManager::connect`]
/// and [`ProcessManager::disconnect`] bracket it. Use
/// [`crate::process::ProcessSupervisor`] rather than calling these directly.
#[async_trait]
pub trait ProcessManager: Send + Sync {
    async fn connect(&self) -> Result<(), ProcessManagerError>;

    /// Release the connection; never fails
    async fn disconnect(&self);

    async fn start(&self, options: &StartOptions) -> Result<Vec<ProcessInfo>, ProcessManagerError>;

    async fn stop(&self, target: &ProcessRef) -> Result<(), ProcessManagerError>;

    async fn restart(&self, target: &ProcessRef) -> Result<(), ProcessManagerError>;

    /// Stop the process and remove it from the manager
    async fn delete(&self, target: &ProcessRef) -> Result<(), ProcessManagerError>;

    async fn describe(&self, target: &ProcessRef) -> Result<Vec<ProcessInfo>, ProcessManagerError>;

    async fn list(&self) -> Result<Vec<ProcessInfo>, ProcessManagerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_parse() {
        let command = CommandLine::parse("npm install --no-audit").unwrap();
        assert_eq!(command.program, "npm");
        assert_eq!(command.args, vec!["install", "--no-audit"]);
        assert_eq!(command.to_string(), "npm install --no-audit");
    }

    #[test]
    fn test_command_line_parse_empty() {
        assert!(matches!(
            CommandLine::parse("   "),
            Err(CommandError::EmptyCommand)
        ));
    }

    #[test]
    fn test_command_line_builder_keeps_spaces_in_args() {
        let command = CommandLine::new("git")
            .arg("clone")
            .arg("/path with spaces/repo");
        assert_eq!(command.args.len(), 2);
        assert_eq!(command.args[1], "/path with spaces/repo");
    }

    #[test]
    fn test_process_ref_parse() {
        assert_eq!("7".parse::<ProcessRef>().unwrap(), ProcessRef::Id(7));
        assert_eq!(
            "api-server".parse::<ProcessRef>().unwrap(),
            ProcessRef::Name("api-server".to_string())
        );
        assert_eq!(ProcessRef::Id(3).to_string(), "3");
    }

    #[test]
    fn test_process_info_serialization() {
        let info = ProcessInfo {
            status: Some("online".to_string()),
            pid: Some(4242),
            name: Some("api".to_string()),
            version: Some("1.0.0".to_string()),
            pm_id: Some(0),
            created_at: None,
            uptime_ms: 0,
            namespace: Some("default".to_string()),
            autorestart: true,
            watch: false,
            memory_mb: 42.5,
            cpu: 1.0,
        };

        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"memory_mb\":42.5"));
        let back: ProcessInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }
}
