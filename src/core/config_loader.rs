//! Configuration file loader for deploy-manager
//!
//! This module provides configuration loading, validation, and merging capabilities.

use super::config::*;
use crate::core::error::ConfigError;
use crate::core::traits::CommandLine;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs;
use tracing::{debug, warn};

/// Configuration file name
pub const CONFIG_FILENAME: &str = ".deploy-manager.yaml";

/// Environment variable pattern (${VAR_NAME})
static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var pattern is valid")
});

/// Environment variables mapped onto config keys
const ENV_OVERRIDES: &[(&str, &str, &str)] = &[
    ("DEPLOY_INSTALL_COMMAND", "publish", "installCommand"),
    ("DEPLOY_PUBLISH_ROOT", "publish", "publishRoot"),
    ("DEPLOY_SCRIPT_ROOT", "processManager", "scriptRoot"),
    ("DEPLOY_PM_BINARY", "processManager", "binary"),
    ("DEPLOY_GIT_BINARY", "git", "binary"),
];

/// Configuration load options
#[derive(Debug, Clone, Default)]
pub struct ConfigLoadOptions {
    /// Directory searched for a project config file
    pub project_path: PathBuf,

    /// Explicit config file (highest file priority)
    pub config_file: Option<PathBuf>,

    /// Environment variables
    pub env: HashMap<String, String>,
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    pub valid: bool,
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationWarning>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field path (e.g., "publish.installCommand")
    pub field: String,
    pub message: String,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. Environment variables
    /// 2. Explicit config file (`--config`)
    /// 3. Project config (./.deploy-manager.yaml)
    /// 4. Global config (~/.deploy-manager.yaml)
    /// 5. Default values
    pub async fn load(options: ConfigLoadOptions) -> Result<ManagerConfig, ConfigError> {
        let mut layers: Vec<Value> = Vec::new();

        if let Some(home) = options.env.get("HOME") {
            let global_path = PathBuf::from(home).join(CONFIG_FILENAME);
            if let Some(layer) = Self::load_config_file(&global_path, false).await? {
                layers.push(layer);
            }
        } else {
            debug!("HOME not set, skipping global config");
        }

        let project_config = options.project_path.join(CONFIG_FILENAME);
        if let Some(layer) = Self::load_config_file(&project_config, false).await? {
            layers.push(layer);
        }

        if let Some(config_file) = &options.config_file
            && let Some(layer) = Self::load_config_file(config_file, true).await?
        {
            layers.push(layer);
        }

        if let Some(layer) = Self::load_env_config(&options.env) {
            layers.push(layer);
        }

        let merged = Self::merge_layers(layers);
        let config: ManagerConfig = serde_yaml::from_value(merged)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(Self::expand_env_vars(config, &options.env))
    }

    /// Load one YAML layer; a missing file is `None` unless `required`
    async fn load_config_file(path: &Path, required: bool) -> Result<Option<Value>, ConfigError> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                return Ok(None);
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        debug!(path = %path.display(), "loaded config file");

        let value: Value = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        match value {
            Value::Null => Ok(None),
            Value::Mapping(_) => Ok(Some(value)),
            _ => Err(ConfigError::Parse {
                path: path.to_path_buf(),
                message: "top level must be a mapping".to_string(),
            }),
        }
    }

    /// Build a layer from `DEPLOY_*` environment variables
    fn load_env_config(env: &HashMap<String, String>) -> Option<Value> {
        let mut root = Mapping::new();

        for &(var, section, key) in ENV_OVERRIDES {
            let Some(value) = env.get(var) else {
                continue;
            };

            if root.get(section).is_none() {
                root.insert(Value::from(section), Value::Mapping(Mapping::new()));
            }
            if let Some(Value::Mapping(section_map)) = root.get_mut(section) {
                section_map.insert(Value::from(key), Value::from(value.as_str()));
            }
        }

        if root.is_empty() {
            None
        } else {
            Some(Value::Mapping(root))
        }
    }

    /// Merge layers in order, later layers win
    fn merge_layers(layers: Vec<Value>) -> Value {
        let mut result = Value::Mapping(Mapping::new());
        for layer in layers {
            Self::merge_into(&mut result, layer);
        }
        result
    }

    /// Deep-merge mappings; any other value replaces the target
    fn merge_into(target: &mut Value, source: Value) {
        match (target, source) {
            (Value::Mapping(target_map), Value::Mapping(source_map)) => {
                for (key, value) in source_map {
                    match target_map.get_mut(&key) {
                        Some(existing) => Self::merge_into(existing, value),
                        None => {
                            target_map.insert(key, value);
                        }
                    }
                }
            }
            (target, source) => *target = source,
        }
    }

    /// Expand `${VAR}` references in string settings
    fn expand_env_vars(mut config: ManagerConfig, env: &HashMap<String, String>) -> ManagerConfig {
        config.publish.install_command = Self::expand_string(&config.publish.install_command, env);
        config.git.binary = Self::expand_string(&config.git.binary, env);
        config.process_manager.binary = Self::expand_string(&config.process_manager.binary, env);

        config.publish.publish_root = config
            .publish
            .publish_root
            .take()
            .map(|root| PathBuf::from(Self::expand_string(&root.to_string_lossy(), env)));
        config.process_manager.script_root = config
            .process_manager
            .script_root
            .take()
            .map(|root| PathBuf::from(Self::expand_string(&root.to_string_lossy(), env)));

        config
    }

    /// Expand environment variables in a single string
    fn expand_string(input: &str, env: &HashMap<String, String>) -> String {
        let mut result = input.to_string();
        for cap in ENV_VAR_PATTERN.captures_iter(input) {
            let var_name = &cap[1];
            match env.get(var_name) {
                Some(value) => {
                    result = result.replace(&format!("${{{}}}", var_name), value);
                }
                None => warn!(variable = var_name, "environment variable not found"),
            }
        }
        result
    }

    /// Validate configuration
    pub fn validate(config: &ManagerConfig) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if config.version.is_empty() {
            errors.push(ConfigValidationError {
                field: "version".to_string(),
                message: "Version is required".to_string(),
            });
        } else if config.version != "1.0" {
            warnings.push(ConfigValidationWarning {
                field: "version".to_string(),
                message: format!("Unknown version: {}", config.version),
                suggestion: Some("Currently supported version is \"1.0\" only".to_string()),
            });
        }

        if config.publish.manifest_file.trim().is_empty() {
            errors.push(ConfigValidationError {
                field: "publish.manifestFile".to_string(),
                message: "manifestFile is required".to_string(),
            });
        }

        if config.publish.modules_dir.trim().is_empty() {
            errors.push(ConfigValidationError {
                field: "publish.modulesDir".to_string(),
                message: "modulesDir is required".to_string(),
            });
        }

        match CommandLine::parse(&config.publish.install_command) {
            Ok(command) => Self::check_allowed(
                config,
                "publish.installCommand",
                &command.program,
                &mut errors,
            ),
            Err(_) => errors.push(ConfigValidationError {
                field: "publish.installCommand".to_string(),
                message: "installCommand is required".to_string(),
            }),
        }

        Self::check_allowed(config, "git.binary", &config.git.binary, &mut errors);
        Self::check_allowed(
            config,
            "processManager.binary",
            &config.process_manager.binary,
            &mut errors,
        );

        if config.commands.timeout_secs == Some(0) {
            warnings.push(ConfigValidationWarning {
                field: "commands.timeoutSecs".to_string(),
                message: "A timeout of 0 seconds fails every command".to_string(),
                suggestion: Some("Remove timeoutSecs to disable the timeout".to_string()),
            });
        }

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    fn check_allowed(
        config: &ManagerConfig,
        field: &str,
        program: &str,
        errors: &mut Vec<ConfigValidationError>,
    ) {
        if !config.commands.allowed.iter().any(|allowed| allowed == program) {
            errors.push(ConfigValidationError {
                field: field.to_string(),
                message: format!("'{}' is not listed in commands.allowed", program),
            });
        }
    }

    /// Format validation result as human-readable string
    pub fn format_validation_result(result: &ConfigValidationResult) -> String {
        let mut lines = Vec::new();

        if result.valid {
            lines.push("✅ Configuration validation succeeded".to_string());
        } else {
            lines.push("❌ Configuration has errors".to_string());
        }

        if !result.errors.is_empty() {
            lines.push("\n🔴 Errors:".to_string());
            for error in &result.errors {
                lines.push(format!("  - [{}] {}", error.field, error.message));
            }
        }

        if !result.warnings.is_empty() {
            lines.push("\n🟡 Warnings:".to_string());
            for warning in &result.warnings {
                lines.push(format!("  - [{}] {}", warning.field, warning.message));
                if let Some(suggestion) = &warning.suggestion {
                    lines.push(format!("    Suggestion: {}", suggestion));
                }
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options_for(dir: &TempDir) -> ConfigLoadOptions {
        ConfigLoadOptions {
            project_path: dir.path().to_path_buf(),
            config_file: None,
            env: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_load_defaults_without_files() {
        let temp_dir = TempDir::new().unwrap();

        let config = ConfigLoader::load(options_for(&temp_dir)).await.unwrap();

        assert_eq!(config, ManagerConfig::default());
    }

    #[tokio::test]
    async fn test_project_config_overrides_global() {
        let home = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        std::fs::write(
            home.path().join(CONFIG_FILENAME),
            "publish:\n  installCommand: yarn install\n  modulesDir: vendor_modules\n",
        )
        .unwrap();
        std::fs::write(
            project.path().join(CONFIG_FILENAME),
            "publish:\n  installCommand: pnpm install\n",
        )
        .unwrap();

        let mut options = options_for(&project);
        options
            .env
            .insert("HOME".to_string(), home.path().display().to_string());

        let config = ConfigLoader::load(options).await.unwrap();

        assert_eq!(config.publish.install_command, "pnpm install");
        assert_eq!(config.publish.modules_dir, "vendor_modules");
        assert_eq!(config.publish.manifest_file, "package.json");
    }

    #[tokio::test]
    async fn test_env_overrides_files() {
        let project = TempDir::new().unwrap();
        std::fs::write(
            project.path().join(CONFIG_FILENAME),
            "processManager:\n  scriptRoot: /from/file\n",
        )
        .unwrap();

        let mut options = options_for(&project);
        options
            .env
            .insert("DEPLOY_SCRIPT_ROOT".to_string(), "/from/env".to_string());
        options
            .env
            .insert("DEPLOY_PM_BINARY".to_string(), "pm2".to_string());

        let config = ConfigLoader::load(options).await.unwrap();

        assert_eq!(
            config.process_manager.script_root,
            Some(PathBuf::from("/from/env"))
        );
    }

    #[tokio::test]
    async fn test_missing_explicit_config_is_error() {
        let project = TempDir::new().unwrap();
        let mut options = options_for(&project);
        options.config_file = Some(project.path().join("missing.yaml"));

        let result = ConfigLoader::load(options).await;

        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[tokio::test]
    async fn test_invalid_yaml_is_parse_error() {
        let project = TempDir::new().unwrap();
        std::fs::write(project.path().join(CONFIG_FILENAME), "publish: [unclosed").unwrap();

        let result = ConfigLoader::load(options_for(&project)).await;

        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_expands_variables_in_paths() {
        let project = TempDir::new().unwrap();
        std::fs::write(
            project.path().join(CONFIG_FILENAME),
            "publish:\n  publishRoot: ${APPS_DIR}/published\n",
        )
        .unwrap();

        let mut options = options_for(&project);
        options
            .env
            .insert("APPS_DIR".to_string(), "/srv/apps".to_string());

        let config = ConfigLoader::load(options).await.unwrap();

        assert_eq!(
            config.publish.publish_root,
            Some(PathBuf::from("/srv/apps/published"))
        );
    }

    #[test]
    fn test_expand_string_leaves_unknown_variables() {
        let env = HashMap::new();
        let result = ConfigLoader::expand_string("${UNSET_VAR}/x", &env);
        assert_eq!(result, "${UNSET_VAR}/x");
    }

    #[test]
    fn test_validate_default_config() {
        let result = ConfigLoader::validate(&ManagerConfig::default());
        assert!(result.valid);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_validate_rejects_unlisted_installer() {
        let mut config = ManagerConfig::default();
        config.publish.install_command = "bash -c 'npm install'".to_string();

        let result = ConfigLoader::validate(&config);

        assert!(!result.valid);
        assert_eq!(result.errors[0].field, "publish.installCommand");
    }

    #[test]
    fn test_validate_empty_version_and_install_command() {
        let mut config = ManagerConfig::default();
        config.version = String::new();
        config.publish.install_command = "  ".to_string();

        let result = ConfigLoader::validate(&config);

        assert!(!result.valid);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_format_validation_result() {
        let mut config = ManagerConfig::default();
        config.version = "2.0".to_string();
        config.git.binary = "hg".to_string();

        let formatted = ConfigLoader::format_validation_result(&ConfigLoader::validate(&config));

        assert!(formatted.contains("❌ Configuration has errors"));
        assert!(formatted.contains("[git.binary]"));
        assert!(formatted.contains("🟡 Warnings:"));
        assert!(formatted.contains("[version]"));
    }
}
