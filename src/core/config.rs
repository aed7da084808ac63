//! Configuration structures and types for deploy-manager
//!
//! This module provides type-safe configuration management with serde support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ManagerConfig {
    /// Schema version
    pub version: String,

    /// Publish pipeline settings
    pub publish: PublishSettings,

    /// Version control settings
    pub git: GitSettings,

    /// Process manager settings
    #[serde(rename = "processManager")]
    pub process_manager: ProcessManagerSettings,

    /// Subprocess execution settings
    pub commands: CommandSettings,
}

/// Publish pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PublishSettings {
    /// File whose presence marks a directory as a manageable package
    #[serde(rename = "manifestFile")]
    pub manifest_file: String,

    /// Module directory created before running the installer
    #[serde(rename = "modulesDir")]
    pub modules_dir: String,

    /// Command run in the project directory to install dependencies
    #[serde(rename = "installCommand")]
    pub install_command: String,

    /// Base directory for relative publish paths (optional)
    #[serde(rename = "publishRoot", skip_serializing_if = "Option::is_none")]
    pub publish_root: Option<PathBuf>,
}

/// Version control settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GitSettings {
    /// git executable
    pub binary: String,
}

/// Process manager settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProcessManagerSettings {
    /// pm2 executable
    pub binary: String,

    /// Base directory for relative script paths (optional)
    #[serde(rename = "scriptRoot", skip_serializing_if = "Option::is_none")]
    pub script_root: Option<PathBuf>,
}

/// Subprocess execution settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CommandSettings {
    /// Programs the executor is allowed to run
    pub allowed: Vec<String>,

    /// Per-command timeout in seconds (optional, no timeout by default)
    #[serde(rename = "timeoutSecs", skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            publish: PublishSettings::default(),
            git: GitSettings::default(),
            process_manager: ProcessManagerSettings::default(),
            commands: CommandSettings::default(),
        }
    }
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            manifest_file: "package.json".to_string(),
            modules_dir: "node_modules".to_string(),
            install_command: "npm install".to_string(),
            publish_root: None,
        }
    }
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            binary: "git".to_string(),
        }
    }
}

impl Default for ProcessManagerSettings {
    fn default() -> Self {
        Self {
            binary: "pm2".to_string(),
            script_root: None,
        }
    }
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            allowed: ["npm", "yarn", "pnpm", "git", "pm2"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timeout_secs: None,
        }
    }
}
