//! Import of existing resources into Terraform state.

use crate::discovery::registry::ResourceKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an import did not go through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportErrorCause {
    /// The remote object does not exist (deleted between listing and import)
    NotFound,
    /// Something else already bound the address
    AlreadyDeclared,
    Other,
}

impl std::fmt::Display for ImportErrorCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportErrorCause::NotFound => write!(f, "not found"),
            ImportErrorCause::AlreadyDeclared => write!(f, "already declared"),
            ImportErrorCause::Other => write!(f, "other"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("import of {address} failed ({cause}): {detail}")]
pub struct ImportError {
    pub address: String,
    pub cause: ImportErrorCause,
    pub detail: String,
}

impl ImportError {
    pub fn new(
        address: impl Into<String>,
        cause: ImportErrorCause,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            cause,
            detail: detail.into(),
        }
    }
}

/// Binds an existing remote object to a Terraform address
#[async_trait]
pub trait Importer: Send + Sync {
    async fn import(&self, address: &str, import_id: &str) -> Result<(), ImportError>;
}

/// Turn `terraform import` stderr into a classified error.
///
/// Anything that is not clearly "missing remote object" or "already managed",
/// including a provider-side success followed by a failed state write, is `Other`.
pub fn classify_import_failure(address: &str, import_id: &str, stderr: &str) -> ImportError {
    if stderr.contains("Cannot import non-existent remote object") {
        ImportError::new(
            address,
            ImportErrorCause::NotFound,
            format!("Resource with ID '{}' does not exist in the cloud", import_id),
        )
    } else if stderr.contains("Resource already managed by Terraform") {
        ImportError::new(
            address,
            ImportErrorCause::AlreadyDeclared,
            format!("Resource '{}' is already managed by Terraform", address),
        )
    } else if stderr.contains("configuration for") && stderr.contains("is not present") {
        ImportError::new(
            address,
            ImportErrorCause::Other,
            format!(
                "No configuration found for '{}'. Add a resource block before importing.",
                address
            ),
        )
    } else if stderr.contains("Error acquiring the state lock") {
        ImportError::new(
            address,
            ImportErrorCause::Other,
            "State is locked by another operation; retry once the lock is released",
        )
    } else {
        ImportError::new(
            address,
            ImportErrorCause::Other,
            stderr.trim().replace('\n', " "),
        )
    }
}

/// Follow-up checks worth doing after importing a resource of `kind`
pub fn post_import_notes(kind: ResourceKind) -> Vec<String> {
    let mut notes = Vec::new();

    match kind {
        ResourceKind::S3 => {
            notes.push(
                "Bucket policy, versioning and encryption are separate resources; import them too"
                    .to_string(),
            );
        }
        ResourceKind::IamRole => {
            notes.push(
                "IAM roles are security-sensitive - review attached and inline policies"
                    .to_string(),
            );
        }
        ResourceKind::Secret => {
            notes.push("Secret values are not imported, only the secret container".to_string());
        }
        ResourceKind::LambdaFunction => {
            notes.push(
                "Function code is not part of state - keep the deployment package source in sync"
                    .to_string(),
            );
        }
        ResourceKind::EcrRepo => {
            notes.push("Lifecycle policies are a separate resource".to_string());
        }
        ResourceKind::DynamodbTable
        | ResourceKind::CloudwatchLogGroup
        | ResourceKind::EcsCluster => {}
    }

    notes.push(
        "Run 'terraform plan' to check the configuration matches the imported state".to_string(),
    );
    notes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found() {
        let err = classify_import_failure(
            "aws_s3_bucket.logs",
            "acme-logs",
            "Error: Cannot import non-existent remote object\n\nWhile attempting to import...",
        );
        assert_eq!(err.cause, ImportErrorCause::NotFound);
        assert!(err.detail.contains("acme-logs"));
    }

    #[test]
    fn test_classify_already_managed() {
        let err = classify_import_failure(
            "aws_s3_bucket.logs",
            "acme-logs",
            "Error: Resource already managed by Terraform",
        );
        assert_eq!(err.cause, ImportErrorCause::AlreadyDeclared);
    }

    #[test]
    fn test_classify_other() {
        let err = classify_import_failure(
            "aws_s3_bucket.logs",
            "acme-logs",
            "Error: configuration for aws_s3_bucket.logs is not present",
        );
        assert_eq!(err.cause, ImportErrorCause::Other);
        assert!(err.detail.contains("Add a resource block"));

        let err = classify_import_failure("a.b", "id", "Error: Failed to persist state\nbackend");
        assert_eq!(err.cause, ImportErrorCause::Other);
        assert_eq!(err.detail, "Error: Failed to persist state backend");
    }

    #[test]
    fn test_post_import_notes() {
        let notes = post_import_notes(ResourceKind::IamRole);
        assert!(notes.iter().any(|n| n.contains("policies")));
        assert!(notes.iter().any(|n| n.contains("terraform plan")));

        let notes = post_import_notes(ResourceKind::EcsCluster);
        assert_eq!(notes.len(), 1);
    }
}
