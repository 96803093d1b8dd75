//! Registry of supported AWS resource types and their Terraform address rules.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Category of cloud resource the tool knows how to discover and import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    S3,
    IamRole,
    DynamodbTable,
    EcrRepo,
    LambdaFunction,
    CloudwatchLogGroup,
    Secret,
    EcsCluster,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::S3,
        ResourceKind::IamRole,
        ResourceKind::DynamodbTable,
        ResourceKind::EcrRepo,
        ResourceKind::LambdaFunction,
        ResourceKind::CloudwatchLogGroup,
        ResourceKind::Secret,
        ResourceKind::EcsCluster,
    ];

    /// Stable identifier used on the command line and in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::S3 => "s3",
            ResourceKind::IamRole => "iam-role",
            ResourceKind::DynamodbTable => "dynamodb-table",
            ResourceKind::EcrRepo => "ecr-repo",
            ResourceKind::LambdaFunction => "lambda-function",
            ResourceKind::CloudwatchLogGroup => "cloudwatch-log-group",
            ResourceKind::Secret => "secret",
            ResourceKind::EcsCluster => "ecs-cluster",
        }
    }

    /// Terraform resource type this kind is imported as
    pub fn terraform_type(&self) -> &'static str {
        match self {
            ResourceKind::S3 => "aws_s3_bucket",
            ResourceKind::IamRole => "aws_iam_role",
            ResourceKind::DynamodbTable => "aws_dynamodb_table",
            ResourceKind::EcrRepo => "aws_ecr_repository",
            ResourceKind::LambdaFunction => "aws_lambda_function",
            ResourceKind::CloudwatchLogGroup => "aws_cloudwatch_log_group",
            ResourceKind::Secret => "aws_secretsmanager_secret",
            ResourceKind::EcsCluster => "aws_ecs_cluster",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ResourceKind::S3 => "S3 buckets",
            ResourceKind::IamRole => "IAM roles",
            ResourceKind::DynamodbTable => "DynamoDB tables",
            ResourceKind::EcrRepo => "ECR repositories",
            ResourceKind::LambdaFunction => "Lambda functions",
            ResourceKind::CloudwatchLogGroup => "CloudWatch log groups",
            ResourceKind::Secret => "Secrets Manager secrets",
            ResourceKind::EcsCluster => "ECS clusters",
        }
    }

    /// Alternative spellings accepted on input
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::S3 => &["s3-bucket"],
            ResourceKind::IamRole => &["iam"],
            ResourceKind::DynamodbTable => &["dynamodb"],
            ResourceKind::EcrRepo => &["ecr"],
            ResourceKind::LambdaFunction => &["lambda"],
            ResourceKind::CloudwatchLogGroup => &["logs", "log-group"],
            ResourceKind::Secret => &["secrets", "secretsmanager"],
            ResourceKind::EcsCluster => &["ecs"],
        }
    }

    /// Look up a kind by identifier or alias, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        let needle = s.trim().to_lowercase();
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == needle || kind.aliases().contains(&needle.as_str()))
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One naming rule: a glob over the discovered name and the address it maps to.
///
/// `pattern` may contain `*` and `?` wildcards and the `{prefix}` placeholder.
/// `address` may contain `{prefix}`, `{name}`, `{suffix}` and `{slug}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRule {
    pub pattern: String,
    pub address: String,
    pub label: String,
}

impl MatchRule {
    pub fn new(
        pattern: impl Into<String>,
        address: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            address: address.into(),
            label: label.into(),
        }
    }
}

/// How the name and import identifier are derived from one item of listing output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierSource {
    /// Item is a plain name, also used as import id
    Name,
    /// Item is a `[name, import_id]` pair
    NameAndId,
    /// Item is an ARN; the name (and import id) is the part after the marker
    ArnTail(&'static str),
}

/// AWS CLI call used to enumerate resources of one kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub service: &'static str,
    pub operation: &'static str,
    /// JMESPath expression; `{prefix}` is substituted before the call
    pub query: &'static str,
    pub identifier: IdentifierSource,
}

impl ListQuery {
    pub fn render_query(&self, prefix: &str) -> String {
        self.query.replace("{prefix}", prefix)
    }
}

#[derive(Debug, Clone)]
pub struct ResourceTypeSpec {
    pub kind: ResourceKind,
    /// Evaluated top to bottom, first match wins
    pub rules: Vec<MatchRule>,
    pub list: ListQuery,
}

static BUILTIN_SPECS: Lazy<Vec<ResourceTypeSpec>> = Lazy::new(|| {
    vec![
        ResourceTypeSpec {
            kind: ResourceKind::S3,
            rules: vec![
                MatchRule::new(
                    "{prefix}-lambda-deployment*",
                    "aws_s3_bucket.lambda_deployment",
                    "Lambda deployment bucket",
                ),
                MatchRule::new(
                    "{prefix}-terraform-state*",
                    "aws_s3_bucket.terraform_state",
                    "Terraform state bucket",
                ),
                MatchRule::new(
                    "{prefix}-artifacts*",
                    "aws_s3_bucket.artifacts",
                    "Build artifacts bucket",
                ),
                MatchRule::new("{prefix}-logs*", "aws_s3_bucket.logs", "Access logs bucket"),
                MatchRule::new(
                    "{prefix}-frontend*",
                    "aws_s3_bucket.frontend",
                    "Static frontend bucket",
                ),
            ],
            list: ListQuery {
                service: "s3api",
                operation: "list-buckets",
                query: "Buckets[?starts_with(Name, '{prefix}')].Name",
                identifier: IdentifierSource::Name,
            },
        },
        ResourceTypeSpec {
            kind: ResourceKind::IamRole,
            rules: vec![
                MatchRule::new(
                    "{prefix}-lambda-execution*",
                    "aws_iam_role.lambda_execution",
                    "Lambda execution role",
                ),
                MatchRule::new(
                    "{prefix}-ecs-task-execution*",
                    "aws_iam_role.ecs_task_execution",
                    "ECS task execution role",
                ),
                MatchRule::new("{prefix}-ecs-task*", "aws_iam_role.ecs_task", "ECS task role"),
                MatchRule::new(
                    "{prefix}-github-actions*",
                    "aws_iam_role.github_actions",
                    "GitHub Actions deploy role",
                ),
            ],
            list: ListQuery {
                service: "iam",
                operation: "list-roles",
                query: "Roles[?starts_with(RoleName, '{prefix}')].RoleName",
                identifier: IdentifierSource::Name,
            },
        },
        ResourceTypeSpec {
            kind: ResourceKind::DynamodbTable,
            rules: vec![
                MatchRule::new(
                    "{prefix}-terraform-lock*",
                    "aws_dynamodb_table.terraform_locks",
                    "Terraform lock table",
                ),
                MatchRule::new(
                    "{prefix}-*",
                    "aws_dynamodb_table.tables[\"{suffix}\"]",
                    "Application table",
                ),
            ],
            list: ListQuery {
                service: "dynamodb",
                operation: "list-tables",
                query: "TableNames[?starts_with(@, '{prefix}')]",
                identifier: IdentifierSource::Name,
            },
        },
        ResourceTypeSpec {
            kind: ResourceKind::EcrRepo,
            rules: vec![
                MatchRule::new("{prefix}", "aws_ecr_repository.main", "Main image repository"),
                MatchRule::new(
                    "{prefix}-*",
                    "aws_ecr_repository.repositories[\"{suffix}\"]",
                    "Service image repository",
                ),
            ],
            list: ListQuery {
                service: "ecr",
                operation: "describe-repositories",
                query: "repositories[?starts_with(repositoryName, '{prefix}')].repositoryName",
                identifier: IdentifierSource::Name,
            },
        },
        ResourceTypeSpec {
            kind: ResourceKind::LambdaFunction,
            rules: vec![
                MatchRule::new("{prefix}-api*", "aws_lambda_function.api", "API handler"),
                MatchRule::new("{prefix}-worker*", "aws_lambda_function.worker", "Queue worker"),
                MatchRule::new(
                    "{prefix}-*",
                    "aws_lambda_function.functions[\"{suffix}\"]",
                    "Lambda function",
                ),
            ],
            list: ListQuery {
                service: "lambda",
                operation: "list-functions",
                query: "Functions[?starts_with(FunctionName, '{prefix}')].FunctionName",
                identifier: IdentifierSource::Name,
            },
        },
        ResourceTypeSpec {
            kind: ResourceKind::CloudwatchLogGroup,
            rules: vec![
                MatchRule::new(
                    "/aws/lambda/{prefix}-*",
                    "aws_cloudwatch_log_group.lambda[\"{suffix}\"]",
                    "Lambda log group",
                ),
                MatchRule::new("/ecs/{prefix}", "aws_cloudwatch_log_group.ecs", "ECS log group"),
                MatchRule::new(
                    "/ecs/{prefix}-*",
                    "aws_cloudwatch_log_group.ecs_services[\"{suffix}\"]",
                    "ECS service log group",
                ),
                MatchRule::new(
                    "/ecs/{prefix}/*",
                    "aws_cloudwatch_log_group.ecs_services[\"{suffix}\"]",
                    "ECS service log group",
                ),
                MatchRule::new(
                    "/aws/apigateway/{prefix}",
                    "aws_cloudwatch_log_group.api_gateway",
                    "API Gateway access logs",
                ),
                MatchRule::new(
                    "/aws/apigateway/{prefix}-*",
                    "aws_cloudwatch_log_group.api_gateway_stages[\"{suffix}\"]",
                    "API Gateway stage logs",
                ),
            ],
            list: ListQuery {
                service: "logs",
                operation: "describe-log-groups",
                query: "logGroups[?contains(logGroupName, '{prefix}')].logGroupName",
                identifier: IdentifierSource::Name,
            },
        },
        ResourceTypeSpec {
            kind: ResourceKind::Secret,
            rules: vec![
                MatchRule::new(
                    "{prefix}-db-credentials*",
                    "aws_secretsmanager_secret.db_credentials",
                    "Database credentials",
                ),
                MatchRule::new(
                    "{prefix}/db-credentials*",
                    "aws_secretsmanager_secret.db_credentials",
                    "Database credentials",
                ),
                MatchRule::new(
                    "{prefix}-api-keys*",
                    "aws_secretsmanager_secret.api_keys",
                    "API keys",
                ),
                MatchRule::new(
                    "{prefix}/api-keys*",
                    "aws_secretsmanager_secret.api_keys",
                    "API keys",
                ),
                MatchRule::new(
                    "{prefix}-*",
                    "aws_secretsmanager_secret.secrets[\"{suffix}\"]",
                    "Application secret",
                ),
                MatchRule::new(
                    "{prefix}/*",
                    "aws_secretsmanager_secret.secrets[\"{suffix}\"]",
                    "Application secret",
                ),
            ],
            list: ListQuery {
                service: "secretsmanager",
                operation: "list-secrets",
                query: "SecretList[?starts_with(Name, '{prefix}')].[Name, ARN]",
                identifier: IdentifierSource::NameAndId,
            },
        },
        ResourceTypeSpec {
            kind: ResourceKind::EcsCluster,
            rules: vec![
                MatchRule::new("{prefix}-cluster", "aws_ecs_cluster.main", "Main cluster"),
                MatchRule::new("{prefix}", "aws_ecs_cluster.default", "Project cluster"),
                MatchRule::new(
                    "{prefix}-*",
                    "aws_ecs_cluster.clusters[\"{suffix}\"]",
                    "Additional cluster",
                ),
            ],
            list: ListQuery {
                service: "ecs",
                operation: "list-clusters",
                query: "clusterArns[?contains(@, '{prefix}')]",
                identifier: IdentifierSource::ArnTail("cluster/"),
            },
        },
    ]
});

/// Ordered mapping from resource kind to its spec.
///
/// Processing order of a run follows the order specs were registered in.
#[derive(Debug, Clone)]
pub struct ResourceRegistry {
    specs: Vec<ResourceTypeSpec>,
}

impl ResourceRegistry {
    pub fn empty() -> Self {
        Self { specs: Vec::new() }
    }

    /// Registry with all built-in resource types
    pub fn builtin() -> Self {
        Self {
            specs: BUILTIN_SPECS.clone(),
        }
    }

    /// Add a spec, replacing any existing spec of the same kind in place
    pub fn register(&mut self, spec: ResourceTypeSpec) {
        match self.specs.iter_mut().find(|s| s.kind == spec.kind) {
            Some(existing) => *existing = spec,
            None => self.specs.push(spec),
        }
    }

    /// Insert rules ahead of the existing rules of `kind`, keeping their relative order.
    ///
    /// Returns false when the kind is not registered.
    pub fn prepend_rules(&mut self, kind: ResourceKind, rules: Vec<MatchRule>) -> bool {
        match self.specs.iter_mut().find(|s| s.kind == kind) {
            Some(spec) => {
                let mut merged = rules;
                merged.append(&mut spec.rules);
                spec.rules = merged;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&ResourceTypeSpec> {
        self.specs.iter().find(|s| s.kind == kind)
    }

    pub fn specs(&self) -> &[ResourceTypeSpec] {
        &self.specs
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
