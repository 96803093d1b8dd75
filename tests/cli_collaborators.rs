// Exercises the aws/terraform CLI wrappers against stub executables
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tfimport::core::{Outcome, Reconciler, RunConfig, RunMode};
use tfimport::discovery::DiscoveryCause;
use tfimport::terraform::{ImportErrorCause, Importer, StateQueryError, StateStore};
use tfimport::{AwsCli, Lister, ResourceKind, ResourceRegistry, TerraformCli};

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

const AWS_STUB: &str = r#"
case "$*" in
  *"s3api list-buckets"*)
    echo '["acme-lambda-deployment-x7f2", "acme-unrelated-thing"]' ;;
  *"iam list-roles"*)
    echo "An error occurred (AccessDenied) when calling the ListRoles operation" >&2
    exit 254 ;;
  *"secretsmanager list-secrets"*)
    echo '[["acme/db-credentials", "arn:aws:secretsmanager:us-east-1:123:secret:acme/db-credentials-Ab12"]]' ;;
  *"ecs list-clusters"*)
    echo '["arn:aws:ecs:us-east-1:123:cluster/acme-cluster"]' ;;
  *"sts get-caller-identity"*)
    echo '{"UserId": "AIDA", "Account": "123456789012", "Arn": "arn:aws:iam::123456789012:user/ci"}' ;;
  *)
    echo 'null' ;;
esac
"#;

const TERRAFORM_STUB: &str = r#"
case "$1" in
  state)
    echo 'aws_ecs_cluster.main' ;;
  import)
    if [ "$4" = "missing" ]; then
      echo "Error: Cannot import non-existent remote object" >&2
      exit 1
    fi
    echo "$3 $4" >> imports.log ;;
esac
"#;

fn stubs() -> (tempfile::TempDir, Arc<AwsCli>, Arc<TerraformCli>) {
    let dir = tempfile::tempdir().unwrap();
    let aws = write_script(dir.path(), "aws", AWS_STUB);
    let terraform = write_script(dir.path(), "terraform", TERRAFORM_STUB);
    let timeout = Duration::from_secs(10);
    let aws = Arc::new(AwsCli::new(aws, None, timeout));
    let terraform = Arc::new(TerraformCli::new(terraform, dir.path().to_path_buf(), timeout));
    (dir, aws, terraform)
}

#[tokio::test]
async fn test_aws_lister_parses_names() {
    let (_dir, aws, _) = stubs();
    let registry = ResourceRegistry::builtin();

    let buckets = aws
        .list(registry.get(ResourceKind::S3).unwrap(), "acme", "us-east-1")
        .await
        .unwrap();
    assert_eq!(buckets.len(), 2);
    assert_eq!(buckets[0].name, "acme-lambda-deployment-x7f2");

    let secrets = aws
        .list(registry.get(ResourceKind::Secret).unwrap(), "acme", "us-east-1")
        .await
        .unwrap();
    assert!(secrets[0].import_id.starts_with("arn:aws:secretsmanager"));

    let empty = aws
        .list(registry.get(ResourceKind::EcrRepo).unwrap(), "acme", "us-east-1")
        .await
        .unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_aws_lister_classifies_access_denied() {
    let (_dir, aws, _) = stubs();
    let registry = ResourceRegistry::builtin();

    let err = aws
        .list(registry.get(ResourceKind::IamRole).unwrap(), "acme", "us-east-1")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ResourceKind::IamRole);
    assert!(matches!(err.cause, DiscoveryCause::AccessDenied(_)));
}

#[tokio::test]
async fn test_caller_identity() {
    let (_dir, aws, _) = stubs();
    let identity = aws.caller_identity("us-east-1").await.unwrap();
    assert_eq!(identity.account, "123456789012");
}

#[tokio::test]
async fn test_terraform_state_and_import() {
    let (dir, _, terraform) = stubs();

    assert!(terraform.is_declared("aws_ecs_cluster.main").await.unwrap());
    assert!(!terraform.is_declared("aws_s3_bucket.logs").await.unwrap());

    terraform.import("aws_s3_bucket.logs", "acme-logs").await.unwrap();
    assert!(terraform.is_declared("aws_s3_bucket.logs").await.unwrap());

    let err = terraform
        .import("aws_s3_bucket.gone", "missing")
        .await
        .unwrap_err();
    assert_eq!(err.cause, ImportErrorCause::NotFound);

    let log = std::fs::read_to_string(dir.path().join("imports.log")).unwrap();
    assert_eq!(log.trim(), "aws_s3_bucket.logs acme-logs");
}

#[tokio::test]
async fn test_failed_state_list_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let terraform = write_script(
        dir.path(),
        "terraform",
        r#"
echo call >> state-calls.log
echo 'Error: Failed to load state: connection refused' >&2
exit 1
"#,
    );
    let cli = TerraformCli::new(terraform, dir.path().to_path_buf(), Duration::from_secs(10));

    for address in ["aws_s3_bucket.logs", "aws_s3_bucket.artifacts", "aws_ecs_cluster.main"] {
        let err = cli.is_declared(address).await.unwrap_err();
        match err {
            StateQueryError::CommandError(msg) => assert!(msg.contains("connection refused")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    let calls = std::fs::read_to_string(dir.path().join("state-calls.log")).unwrap();
    assert_eq!(calls.lines().count(), 1);
}

#[tokio::test]
async fn test_end_to_end_apply_run() {
    let (dir, aws, terraform) = stubs();
    let reconciler = Reconciler::new(
        ResourceRegistry::builtin(),
        aws,
        terraform.clone(),
        terraform,
    );

    let config = RunConfig::new("acme", "us-east-1", "all", RunMode::Apply).unwrap();
    let report = reconciler.run(&config).await.unwrap();

    let outcome_of = |name: &str| {
        report
            .decisions
            .iter()
            .find(|d| d.name.as_deref() == Some(name))
            .map(|d| d.outcome)
    };
    assert_eq!(outcome_of("acme-lambda-deployment-x7f2"), Some(Outcome::Imported));
    assert_eq!(outcome_of("acme-unrelated-thing"), Some(Outcome::Unmatched));
    assert_eq!(outcome_of("acme/db-credentials"), Some(Outcome::Imported));
    assert_eq!(outcome_of("acme-cluster"), Some(Outcome::AlreadyDeclared));
    assert_eq!(report.summary.discovery_failed, 1);

    let log = std::fs::read_to_string(dir.path().join("imports.log")).unwrap();
    assert!(log.contains("aws_s3_bucket.lambda_deployment acme-lambda-deployment-x7f2"));
    assert!(log.contains("aws_secretsmanager_secret.db_credentials arn:aws:secretsmanager"));
}

#[tokio::test]
async fn test_project_and_main_clusters_both_imported() {
    let dir = tempfile::tempdir().unwrap();
    let aws = write_script(
        dir.path(),
        "aws",
        r#"
case "$*" in
  *"ecs list-clusters"*)
    echo '["arn:aws:ecs:us-east-1:123:cluster/acme", "arn:aws:ecs:us-east-1:123:cluster/acme-cluster"]' ;;
  *)
    echo 'null' ;;
esac
"#,
    );
    let terraform = write_script(
        dir.path(),
        "terraform",
        r#"
case "$1" in
  state) ;;
  import) echo "$3 $4" >> imports.log ;;
esac
"#,
    );
    let timeout = Duration::from_secs(10);
    let terraform = Arc::new(TerraformCli::new(terraform, dir.path().to_path_buf(), timeout));
    let reconciler = Reconciler::new(
        ResourceRegistry::builtin(),
        Arc::new(AwsCli::new(aws, None, timeout)),
        terraform.clone(),
        terraform,
    );

    let config = RunConfig::new("acme", "us-east-1", "ecs", RunMode::Apply).unwrap();
    let report = reconciler.run(&config).await.unwrap();

    assert_eq!(report.summary.imported, 2);
    assert_eq!(report.summary.already_declared, 0);
    let log = std::fs::read_to_string(dir.path().join("imports.log")).unwrap();
    assert!(log.contains("aws_ecs_cluster.default acme\n"));
    assert!(log.contains("aws_ecs_cluster.main acme-cluster\n"));
}
