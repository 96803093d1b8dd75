//! Terraform state membership queries and the CLI-backed collaborator.

use crate::shared::logging;
use crate::shared::process::{display_command, run_with_timeout};
use crate::terraform::import::{classify_import_failure, ImportError, ImportErrorCause, Importer};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Mutex;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateQueryError {
    #[error("Terraform command failed: {0}")]
    CommandError(String),

    #[error("Terraform init required in {0}")]
    InitRequired(String),
}

/// Answers whether an address is already tracked in state
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn is_declared(&self, address: &str) -> Result<bool, StateQueryError>;
}

/// `terraform` CLI wrapper implementing both [`StateStore`] and [`Importer`].
///
/// `terraform state list` is read once, on first query, and its outcome (including
/// a failure) answers every later query. Successful imports are added to the
/// loaded set so later queries in the same run see them.
pub struct TerraformCli {
    terraform_path: PathBuf,
    project_directory: PathBuf,
    timeout: Duration,
    declared: Mutex<Option<Result<HashSet<String>, StateQueryError>>>,
}

impl TerraformCli {
    pub fn new(terraform_path: PathBuf, project_directory: PathBuf, timeout: Duration) -> Self {
        logging::debug(&format!(
            "TerraformCli initialized with terraform path: {} and project directory: {}",
            terraform_path.display(),
            project_directory.display()
        ));
        Self {
            terraform_path,
            project_directory,
            timeout,
            declared: Mutex::new(None),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.terraform_path);
        cmd.current_dir(&self.project_directory);
        cmd
    }

    pub async fn state_list(&self) -> Result<HashSet<String>, StateQueryError> {
        let mut cmd = self.command();
        cmd.arg("state").arg("list");
        logging::debug(&format!("Running: {}", display_command(&cmd)));

        let output = run_with_timeout(&mut cmd, self.timeout)
            .await
            .map_err(|e| StateQueryError::CommandError(e.to_string()))?;

        if output.status.success() {
            return Ok(parse_state_list(&String::from_utf8_lossy(&output.stdout)));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("No state file was found") {
            // Fresh workspace with nothing applied yet
            return Ok(HashSet::new());
        }
        if stderr.contains("terraform init") || stderr.contains("Backend initialization required")
        {
            return Err(StateQueryError::InitRequired(
                self.project_directory.display().to_string(),
            ));
        }
        Err(StateQueryError::CommandError(stderr.trim().to_string()))
    }
}

#[async_trait]
impl StateStore for TerraformCli {
    async fn is_declared(&self, address: &str) -> Result<bool, StateQueryError> {
        let mut declared = self.declared.lock().await;
        if declared.is_none() {
            let loaded = self.state_list().await;
            match &loaded {
                Ok(set) => logging::debug(&format!(
                    "Loaded {} addresses from Terraform state",
                    set.len()
                )),
                Err(e) => {
                    logging::warn(&format!("Terraform state unavailable for this run: {}", e))
                }
            }
            *declared = Some(loaded);
        }
        match declared.as_ref() {
            Some(Ok(set)) => Ok(set.contains(address)),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(false),
        }
    }
}

#[async_trait]
impl Importer for TerraformCli {
    async fn import(&self, address: &str, import_id: &str) -> Result<(), ImportError> {
        let mut cmd = self.command();
        cmd.arg("import").arg("-input=false").arg(address).arg(import_id);
        logging::debug(&format!("Running: {}", display_command(&cmd)));

        let output = run_with_timeout(&mut cmd, self.timeout)
            .await
            .map_err(|e| ImportError::new(address, ImportErrorCause::Other, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_import_failure(address, import_id, &stderr));
        }

        if let Some(Ok(set)) = self.declared.lock().await.as_mut() {
            set.insert(address.to_string());
        }
        Ok(())
    }
}

/// One address per line, blank lines ignored
pub fn parse_state_list(stdout: &str) -> HashSet<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
