//! Read-only enumeration of existing cloud resources.

pub mod aws;
pub mod matcher;
pub mod registry;

use async_trait::async_trait;
use registry::{ResourceKind, ResourceTypeSpec};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use matcher::{match_name, PatternError, RuleMatch, RuleSet};
pub use registry::{MatchRule, ResourceRegistry};

/// A resource found in the cloud account during one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredResource {
    pub kind: ResourceKind,
    /// Name matched against the naming rules
    pub name: String,
    /// Identifier handed to `terraform import` (name or ARN)
    pub import_id: String,
    pub region: String,
}

impl DiscoveredResource {
    pub fn new(kind: ResourceKind, name: impl Into<String>, region: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind,
            import_id: name.clone(),
            name,
            region: region.into(),
        }
    }

    pub fn with_import_id(mut self, import_id: impl Into<String>) -> Self {
        self.import_id = import_id.into();
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryCause {
    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("region mismatch: {0}")]
    RegionMismatch(String),

    #[error("command failed: {0}")]
    CommandFailed(String),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("malformed output: {0}")]
    MalformedOutput(String),

    #[error("IO error: {0}")]
    Io(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("discovery of {kind} failed: {cause}")]
pub struct DiscoveryError {
    pub kind: ResourceKind,
    pub cause: DiscoveryCause,
}

impl DiscoveryError {
    pub fn new(kind: ResourceKind, cause: DiscoveryCause) -> Self {
        Self { kind, cause }
    }
}

/// Lists resources of one type whose names carry the project prefix
#[async_trait]
pub trait Lister: Send + Sync {
    async fn list(
        &self,
        spec: &ResourceTypeSpec,
        prefix: &str,
        region: &str,
    ) -> Result<Vec<DiscoveredResource>, DiscoveryError>;
}
