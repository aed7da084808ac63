//! SafeCommandExecutor: whitelisted subprocess execution
//!
//! # Security Features
//!
//! - **Whitelist-based validation**: Only pre-approved programs can execute
//! - **Injection prevention**: Uses `tokio::process::Command`, never a shell
//! - **Argument sanitization**: Arguments passed as Vec, never interpolated into shell strings
//! - **Working directory validation**: Validates existence before execution
//! - **Timeout control**: Optional limit on how long a command may run
//!
//! # Example
//!
//! ```rust,no_run
//! use deploy_manager::{CommandLine, ProcessExecutor, SafeCommandExecutor};
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut executor = SafeCommandExecutor::new();
//! executor.set_timeout(Duration::from_secs(300));
//!
//! let output = executor
//!     .exec(&CommandLine::parse("npm install")?, std::path::Path::new("/srv/app"))
//!     .await?;
//! println!("{}", output.stdout);
//! # Ok(())
//! # }
//! ```

use crate::core::traits::{CommandLine, CommandOutput, ProcessExecutor};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Default allowed programs
const ALLOWED_COMMANDS: &[&str] = &["npm", "yarn", "pnpm", "git", "pm2"];

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    /// Command line had no program
    #[error("Command line is empty")]
    EmptyCommand,

    /// Command is not in the allowed whitelist
    #[error("Command '{0}' is not in the allowed whitelist")]
    CommandNotAllowed(String),

    /// Working directory does not exist or is not accessible
    #[error("Working directory does not exist: {}", .0.display())]
    InvalidWorkingDirectory(PathBuf),

    /// Command could not be spawned (e.g., binary not found, permission denied)
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    /// Command ran and exited unsuccessfully
    #[error("Command '{command}' exited with {}: {stderr}", .code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()))]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Command exceeded the timeout duration
    #[error("Command timeout after {0:?}")]
    Timeout(Duration),
}

/// Safe command executor with security controls
#[derive(Debug, Clone)]
pub struct SafeCommandExecutor {
    allowed: Vec<String>,
    timeout: Option<Duration>,
}

impl Default for SafeCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl SafeCommandExecutor {
    /// Create an executor allowing the default program whitelist
    pub fn new() -> Self {
        Self::with_allowed(ALLOWED_COMMANDS.iter().map(|s| s.to_string()))
    }

    /// Create an executor allowing exactly the given programs
    pub fn with_allowed<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            timeout: None,
        }
    }

    /// Set command execution timeout.
    ///
    /// Commands exceeding this duration are killed.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    pub fn is_allowed(&self, program: &str) -> bool {
        self.allowed.iter().any(|allowed| allowed == program)
    }

    // Windows-specific: npm, yarn, etc. are .cmd files, not .exe
    #[cfg(target_os = "windows")]
    fn resolve_program(program: &str) -> String {
        if matches!(program, "npm" | "yarn" | "pnpm" | "pm2") {
            format!("{}.cmd", program)
        } else {
            program.to_string()
        }
    }

    #[cfg(not(target_os = "windows"))]
    fn resolve_program(program: &str) -> String {
        program.to_string()
    }
}

#[async_trait]
impl ProcessExecutor for SafeCommandExecutor {
    async fn exec(
        &self,
        command: &CommandLine,
        working_dir: &Path,
    ) -> Result<CommandOutput, CommandError> {
        if command.program.is_empty() {
            return Err(CommandError::EmptyCommand);
        }

        if !self.is_allowed(&command.program) {
            return Err(CommandError::CommandNotAllowed(command.program.clone()));
        }

        if !tokio::fs::metadata(working_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(CommandError::InvalidWorkingDirectory(
                working_dir.to_path_buf(),
            ));
        }

        debug!(command = %command, cwd = %working_dir.display(), "executing command");

        let child = Command::new(Self::resolve_program(&command.program))
            .args(&command.args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child)
                .await
                .map_err(|_| CommandError::Timeout(limit))?,
            None => child.await,
        }
        .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(CommandError::NonZeroExit {
                command: command.to_string(),
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }
}
