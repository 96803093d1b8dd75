//! Resource listing through the `aws` CLI.

use crate::discovery::registry::{IdentifierSource, ResourceKind, ResourceTypeSpec};
use crate::discovery::{DiscoveredResource, DiscoveryCause, DiscoveryError, Lister};
use crate::shared::logging;
use crate::shared::process::{display_command, run_with_timeout, CommandError};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum PreflightError {
    #[error("AWS credentials check failed: {0}")]
    Credentials(String),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Unexpected output from sts get-caller-identity: {0}")]
    MalformedOutput(String),
}

/// Identity returned by `aws sts get-caller-identity`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
    pub user_id: String,
}

/// `aws` CLI wrapper implementing [`Lister`]
#[derive(Debug, Clone)]
pub struct AwsCli {
    binary: PathBuf,
    profile: Option<String>,
    timeout: Duration,
}

impl AwsCli {
    pub fn new(binary: PathBuf, profile: Option<String>, timeout: Duration) -> Self {
        logging::debug(&format!(
            "AwsCli initialized with binary: {}, profile: {:?}",
            binary.display(),
            profile
        ));
        Self {
            binary,
            profile,
            timeout,
        }
    }

    fn command(&self, region: &str) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--region").arg(region).arg("--output").arg("json");
        if let Some(profile) = &self.profile {
            cmd.arg("--profile").arg(profile);
        }
        cmd
    }

    /// Verify credentials resolve to an account before any discovery
    pub async fn caller_identity(&self, region: &str) -> Result<CallerIdentity, PreflightError> {
        let mut cmd = self.command(region);
        cmd.arg("sts").arg("get-caller-identity");
        let output = run_with_timeout(&mut cmd, self.timeout).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PreflightError::Credentials(stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        serde_json::from_str(&stdout).map_err(|e| PreflightError::MalformedOutput(e.to_string()))
    }
}

#[async_trait]
impl Lister for AwsCli {
    async fn list(
        &self,
        spec: &ResourceTypeSpec,
        prefix: &str,
        region: &str,
    ) -> Result<Vec<DiscoveredResource>, DiscoveryError> {
        let mut cmd = self.command(region);
        cmd.arg(spec.list.service)
            .arg(spec.list.operation)
            .arg("--query")
            .arg(spec.list.render_query(prefix));

        logging::debug(&format!("Running: {}", display_command(&cmd)));

        let output = run_with_timeout(&mut cmd, self.timeout)
            .await
            .map_err(|e| {
                let cause = match &e {
                    CommandError::Timeout { timeout, .. } => {
                        DiscoveryCause::Timeout(timeout.as_secs())
                    }
                    CommandError::Spawn { .. } => DiscoveryCause::Io(e.to_string()),
                };
                DiscoveryError::new(spec.kind, cause)
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DiscoveryError::new(spec.kind, classify_aws_error(&stderr)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_list_output(spec.kind, spec.list.identifier, region, &stdout)
            .map_err(|cause| DiscoveryError::new(spec.kind, cause))
    }
}

/// Map AWS CLI stderr onto a discovery cause
pub fn classify_aws_error(stderr: &str) -> DiscoveryCause {
    let message = stderr.trim().replace('\n', " ");
    if stderr.contains("AccessDenied")
        || stderr.contains("UnauthorizedOperation")
        || stderr.contains("not authorized")
    {
        DiscoveryCause::AccessDenied(message)
    } else if stderr.contains("Could not connect")
        || stderr.contains("EndpointConnectionError")
        || stderr.contains("Connection was closed")
    {
        DiscoveryCause::Network(message)
    } else if stderr.contains("Invalid region")
        || stderr.contains("InvalidRegion")
        || stderr.contains("Provided region_name")
    {
        DiscoveryCause::RegionMismatch(message)
    } else {
        DiscoveryCause::CommandFailed(message)
    }
}

/// Parse the JSON array produced by a `--query` listing call.
///
/// A `null` result (no matching items on some services) is an empty list.
pub fn parse_list_output(
    kind: ResourceKind,
    identifier: IdentifierSource,
    region: &str,
    stdout: &str,
) -> Result<Vec<DiscoveredResource>, DiscoveryCause> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }

    let items: Vec<serde_json::Value> = serde_json::from_str(trimmed)
        .map_err(|e| DiscoveryCause::MalformedOutput(format!("expected JSON array: {}", e)))?;

    let mut resources = Vec::with_capacity(items.len());
    for item in items {
        let resource = match (identifier, &item) {
            (IdentifierSource::Name, serde_json::Value::String(name)) => {
                DiscoveredResource::new(kind, name.as_str(), region)
            }
            (IdentifierSource::NameAndId, serde_json::Value::Array(pair)) => {
                let name = pair.first().and_then(|v| v.as_str());
                let id = pair.get(1).and_then(|v| v.as_str());
                match (name, id) {
                    (Some(name), Some(id)) => {
                        DiscoveredResource::new(kind, name, region).with_import_id(id)
                    }
                    _ => {
                        return Err(DiscoveryCause::MalformedOutput(format!(
                            "expected [name, id] pair, got {}",
                            item
                        )))
                    }
                }
            }
            (IdentifierSource::ArnTail(marker), serde_json::Value::String(arn)) => {
                let name = arn
                    .rsplit_once(marker)
                    .map(|(_, tail)| tail)
                    .unwrap_or(arn.as_str());
                DiscoveredResource::new(kind, name, region)
            }
            _ => {
                return Err(DiscoveryCause::MalformedOutput(format!(
                    "unexpected item {}",
                    item
                )))
            }
        };
        resources.push(resource);
    }

    Ok(resources)
}
