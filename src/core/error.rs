//! Error handling for publishing and process control
//!
//! This module provides the error types shared across the crate, with
//! recovery guidance in the form of stable codes and suggested actions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage a publish failure originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublishStage {
    Cleaning,
    Cloning,
    Installing,
}

impl PublishStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStage::Cleaning => "cleaning",
            PublishStage::Cloning => "cloning",
            PublishStage::Installing => "installing",
        }
    }
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by the publish pipeline stages
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("failed to clean publish directory '{}': {message}", .path.display())]
    CleanupFailed { path: PathBuf, message: String },

    #[error("failed to create directory '{}': {message}", .path.display())]
    DirectoryCreateFailed { path: PathBuf, message: String },

    #[error("failed to clone {repository}: {message}")]
    CloneFailed { repository: String, message: String },

    #[error("dependency install failed in '{}': {message}", .path.display())]
    DependencyInstallFailed { path: PathBuf, message: String },
}

impl PublishError {
    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::CleanupFailed { .. } => "CLEANUP_FAILED",
            Self::DirectoryCreateFailed { .. } => "DIRECTORY_CREATE_FAILED",
            Self::CloneFailed { .. } => "CLONE_FAILED",
            Self::DependencyInstallFailed { .. } => "DEPENDENCY_INSTALL_FAILED",
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::CleanupFailed { .. } => vec![
                "Check that no running process holds files in the publish directory",
                "Check write permissions on the publish directory",
            ],
            Self::DirectoryCreateFailed { .. } => vec![
                "Check that the parent directory exists and is writable",
            ],
            Self::CloneFailed { .. } => vec![
                "Check the repository URL",
                "Check network access and credentials for the remote",
            ],
            Self::DependencyInstallFailed { .. } => vec![
                "Check the installer output above",
                "Check that the package manager is installed and on PATH",
            ],
        }
    }
}

/// Terminal failure of a publish run, tagged with the stage that produced it
#[derive(Error, Debug)]
#[error("publish failed while {stage}: {error}")]
pub struct PublishFailure {
    pub stage: PublishStage,
    #[source]
    pub error: PublishError,
}

impl PublishFailure {
    pub fn new(stage: PublishStage, error: PublishError) -> Self {
        Self { stage, error }
    }
}

/// Errors returned by process manager backends
#[derive(Error, Debug)]
pub enum ProcessManagerError {
    #[error("could not connect to the process manager: {0}")]
    ConnectionFailed(String),

    #[error("process manager operation '{0}' attempted without an open connection")]
    NotConnected(&'static str),

    #[error("process manager operation '{operation}' failed: {message}")]
    OperationFailed {
        operation: &'static str,
        message: String,
    },

    #[error("unexpected process manager response: {0}")]
    InvalidResponse(String),

    #[error("process not found: {0}")]
    NotFound(String),
}

impl ProcessManagerError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConnectionFailed(_) => "PM_CONNECTION_FAILED",
            Self::NotConnected(_) => "PM_NOT_CONNECTED",
            Self::OperationFailed { .. } => "PM_OPERATION_FAILED",
            Self::InvalidResponse(_) => "PM_INVALID_RESPONSE",
            Self::NotFound(_) => "PM_NOT_FOUND",
        }
    }

    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::ConnectionFailed(_) | Self::NotConnected(_) => vec![
                "Check that pm2 is installed and on PATH",
                "Run `pm2 ping` to start the daemon",
            ],
            Self::OperationFailed { .. } => vec!["Check the pm2 logs for the process"],
            Self::InvalidResponse(_) => vec!["Check the installed pm2 version"],
            Self::NotFound(_) => vec!["Run `deploy-manager list` to see known processes"],
        }
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{}': {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
