//! File and environment configuration.
//!
//! Precedence is command-line flag, then environment, then config file, then default.
//! Flags are applied by `main`; this module handles the rest.

use crate::core::run_config::ConfigurationError;
use crate::discovery::registry::{MatchRule, ResourceKind, ResourceRegistry};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub aws: AwsConfig,
    pub terraform: TerraformConfig,
    pub reconcile: ReconcileConfig,
    /// Extra naming rules, evaluated before the built-in rules of their type
    pub rules: Vec<CustomRule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    pub executable_path: Option<String>,
    pub profile: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TerraformConfig {
    pub executable_path: Option<String>,
    pub project_directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub parallel_discovery: bool,
    pub command_timeout_secs: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            parallel_discovery: false,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRule {
    pub resource_type: String,
    pub pattern: String,
    pub address: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// Load configuration from a JSON file, then apply environment overrides
pub fn init_from_path(path: &str) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path))?;
    let mut config: Config = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path))?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Load `~/.tfimport/config.json` when present, otherwise defaults; env overrides apply either way
pub fn init_default() -> anyhow::Result<Config> {
    match default_config_path() {
        Some(path) if path.exists() => init_from_path(&path.to_string_lossy()),
        _ => {
            let mut config = Config::default();
            apply_env_overrides(&mut config);
            Ok(config)
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".tfimport").join("config.json"))
}

fn apply_env_overrides(config: &mut Config) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// Apply overrides from an arbitrary variable source
pub fn apply_overrides_from<F>(config: &mut Config, var: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = var("TERRAFORM_DIR") {
        config.terraform.project_directory = Some(dir);
    }
    if let Some(name) = var("TERRAFORM_BINARY_NAME") {
        config.terraform.executable_path = Some(name);
    }
    if let Some(name) = var("AWS_CLI_BINARY_NAME") {
        config.aws.executable_path = Some(name);
    }
    if let Some(profile) = var("AWS_PROFILE") {
        config.aws.profile = Some(profile);
    }
    if let Some(region) = var("AWS_REGION").or_else(|| var("AWS_DEFAULT_REGION")) {
        config.aws.region = Some(region);
    }
    if let Some(timeout) = var("TFIMPORT_COMMAND_TIMEOUT") {
        match timeout.parse::<u64>() {
            Ok(secs) if secs > 0 => config.reconcile.command_timeout_secs = secs,
            _ => tracing::warn!("Ignoring invalid TFIMPORT_COMMAND_TIMEOUT: {}", timeout),
        }
    }
}

impl Config {
    /// Built-in registry with this config's custom rules merged in
    pub fn build_registry(&self) -> Result<ResourceRegistry, ConfigurationError> {
        let mut registry = ResourceRegistry::builtin();

        for kind in ResourceKind::ALL {
            let rules: Vec<MatchRule> = self
                .rules
                .iter()
                .filter(|rule| ResourceKind::parse(&rule.resource_type) == Some(kind))
                .map(|rule| {
                    MatchRule::new(
                        rule.pattern.clone(),
                        rule.address.clone(),
                        rule.label.clone().unwrap_or_else(|| "Custom rule".to_string()),
                    )
                })
                .collect();
            if !rules.is_empty() {
                registry.prepend_rules(kind, rules);
            }
        }

        if let Some(unknown) = self
            .rules
            .iter()
            .find(|rule| ResourceKind::parse(&rule.resource_type).is_none())
        {
            return Err(ConfigurationError::UnknownResourceType(
                unknown.resource_type.clone(),
            ));
        }
        if let Some(bad) = self
            .rules
            .iter()
            .find(|rule| rule.pattern.trim().is_empty() || rule.address.trim().is_empty())
        {
            return Err(ConfigurationError::InvalidRule {
                kind: bad.resource_type.clone(),
                pattern: bad.pattern.clone(),
                reason: "pattern and address must not be empty".to_string(),
            });
        }

        Ok(registry)
    }

    pub fn command_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.reconcile.command_timeout_secs.max(1))
    }

    /// Resolve a configured path relative to the current directory
    pub fn absolutize(path: &str) -> anyhow::Result<PathBuf> {
        let path_buf = PathBuf::from(path);
        if path_buf.is_absolute() {
            Ok(path_buf)
        } else {
            Ok(std::env::current_dir()?.join(Path::new(path)))
        }
    }
}
