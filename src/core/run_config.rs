use crate::discovery::registry::ResourceKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that abort a run before any discovery happens
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Project prefix must not be empty")]
    EmptyPrefix,

    #[error("Invalid project prefix '{0}': use only letters, digits, '.', '_', '-' and '/'")]
    InvalidPrefix(String),

    #[error("AWS region must not be empty")]
    EmptyRegion,

    #[error("Unknown resource type: {0}. Use --list-types to see supported types")]
    UnknownResourceType(String),

    #[error("Invalid match rule '{pattern}' for {kind}: {reason}")]
    InvalidRule {
        kind: String,
        pattern: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Import every matched resource not yet in state
    Apply,
    /// Report what would be imported
    DryRun,
    /// List resources only, no matching
    DiscoverOnly,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Apply => write!(f, "apply"),
            RunMode::DryRun => write!(f, "dry-run"),
            RunMode::DiscoverOnly => write!(f, "discover-only"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeFilter {
    All,
    Only(ResourceKind),
}

impl TypeFilter {
    pub fn parse(s: &str) -> Result<Self, ConfigurationError> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(TypeFilter::All);
        }
        ResourceKind::parse(trimmed)
            .map(TypeFilter::Only)
            .ok_or_else(|| ConfigurationError::UnknownResourceType(s.to_string()))
    }
}

/// Parameters of a single reconciliation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub prefix: String,
    pub region: String,
    pub filter: TypeFilter,
    pub mode: RunMode,
    pub parallel_discovery: bool,
}

impl RunConfig {
    /// Build a config from raw option values; the filter is `"all"` or a type identifier
    pub fn new(
        prefix: impl Into<String>,
        region: impl Into<String>,
        filter: &str,
        mode: RunMode,
    ) -> Result<Self, ConfigurationError> {
        let config = Self {
            prefix: prefix.into(),
            region: region.into(),
            filter: TypeFilter::parse(filter)?,
            mode,
            parallel_discovery: false,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_parallel_discovery(mut self, enabled: bool) -> Self {
        self.parallel_discovery = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_prefix(&self.prefix)?;
        if self.region.trim().is_empty() {
            return Err(ConfigurationError::EmptyRegion);
        }
        Ok(())
    }
}

/// The prefix ends up inside a JMESPath string literal, so it is kept to a safe charset
pub fn validate_prefix(prefix: &str) -> Result<(), ConfigurationError> {
    if prefix.trim().is_empty() {
        return Err(ConfigurationError::EmptyPrefix);
    }
    let valid = prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'));
    if !valid {
        return Err(ConfigurationError::InvalidPrefix(prefix.to_string()));
    }
    Ok(())
}
