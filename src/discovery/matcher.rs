//! Name-to-address matching. Pure functions, no I/O.

use crate::discovery::registry::{MatchRule, ResourceTypeSpec};
use regex::Regex;
use thiserror::Error;

/// Result of a successful rule evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub address: String,
    pub label: String,
}

#[derive(Error, Debug)]
#[error("pattern '{pattern}' does not compile: {source}")]
pub struct PatternError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// Rules of one resource type compiled for a single prefix
#[derive(Debug)]
pub struct RuleSet {
    prefix: String,
    rules: Vec<(Regex, MatchRule)>,
}

impl RuleSet {
    pub fn compile(rules: &[MatchRule], prefix: &str) -> Result<Self, PatternError> {
        let compiled = rules
            .iter()
            .map(|rule| {
                let regex = glob_to_regex(&rule.pattern.replace("{prefix}", prefix))
                    .map_err(|source| PatternError {
                        pattern: rule.pattern.clone(),
                        source,
                    })?;
                Ok((regex, rule.clone()))
            })
            .collect::<Result<Vec<_>, PatternError>>()?;

        Ok(Self {
            prefix: prefix.to_string(),
            rules: compiled,
        })
    }

    pub fn for_spec(spec: &ResourceTypeSpec, prefix: &str) -> Result<Self, PatternError> {
        Self::compile(&spec.rules, prefix)
    }

    /// First rule whose pattern matches `name` wins; later rules are never evaluated
    pub fn resolve(&self, name: &str) -> Option<RuleMatch> {
        self.rules
            .iter()
            .find(|(regex, _)| regex.is_match(name))
            .map(|(_, rule)| RuleMatch {
                address: render_address(&rule.address, &self.prefix, name),
                label: rule.label.clone(),
            })
    }
}

/// Convenience wrapper compiling `rules` and resolving a single name
pub fn match_name(rules: &[MatchRule], prefix: &str, name: &str) -> Option<RuleMatch> {
    RuleSet::compile(rules, prefix).ok()?.resolve(name)
}

/// Translate a glob (`*`, `?`) into an anchored regex. Everything else is literal.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr)
}

/// Fill the placeholders of an address template for a discovered name
pub fn render_address(template: &str, prefix: &str, name: &str) -> String {
    let suffix = suffix_of(name, prefix);
    template
        .replace("{prefix}", prefix)
        .replace("{name}", name)
        .replace("{suffix}", suffix)
        .replace("{slug}", &slugify(suffix))
}

/// Part of `name` after the first occurrence of `prefix`, without leading separators.
///
/// `/aws/lambda/acme-api` with prefix `acme` yields `api`. When the prefix does not
/// occur, or nothing follows it, the whole name is returned.
pub fn suffix_of<'a>(name: &'a str, prefix: &str) -> &'a str {
    if prefix.is_empty() {
        return name;
    }
    match name.find(prefix) {
        Some(pos) => {
            let rest = name[pos + prefix.len()..].trim_start_matches(['-', '_', '/', '.']);
            if rest.is_empty() {
                name
            } else {
                rest
            }
        }
        None => name,
    }
}

/// Terraform-safe identifier: lowercase, non-alphanumerics collapsed to `_`
pub fn slugify(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    let mut last_underscore = false;
    for ch in s.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_underscore = false;
        } else if !last_underscore && !slug.is_empty() {
            slug.push('_');
            last_underscore = true;
        }
    }
    let trimmed = slug.trim_end_matches('_');
    if trimmed.is_empty() {
        return "resource".to_string();
    }
    // Terraform names cannot start with a digit
    if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        format!("r_{}", trimmed)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::registry::{ResourceKind, ResourceRegistry};

    fn builtin_rules(kind: ResourceKind) -> Vec<MatchRule> {
        ResourceRegistry::builtin().get(kind).unwrap().rules.clone()
    }

    #[test]
    fn test_glob_to_regex() {
        let re = glob_to_regex("acme-*-logs").unwrap();
        assert!(re.is_match("acme-prod-logs"));
        assert!(!re.is_match("acme-prod-logs-2"));

        let re = glob_to_regex("acme?db").unwrap();
        assert!(re.is_match("acme/db"));
        assert!(re.is_match("acme-db"));
        assert!(!re.is_match("acmedb"));

        // Regex metacharacters in the pattern are literal
        let re = glob_to_regex("acme.io-*").unwrap();
        assert!(re.is_match("acme.io-x"));
        assert!(!re.is_match("acmexio-x"));
    }

    #[test]
    fn test_lambda_deployment_bucket() {
        let rules = builtin_rules(ResourceKind::S3);
        let m = match_name(&rules, "acme", "acme-lambda-deployment-x7f2").unwrap();
        assert_eq!(m.address, "aws_s3_bucket.lambda_deployment");
        assert_eq!(m.label, "Lambda deployment bucket");
    }

    #[test]
    fn test_unrelated_bucket_is_unmatched() {
        let rules = builtin_rules(ResourceKind::S3);
        assert_eq!(match_name(&rules, "acme", "acme-unrelated-thing"), None);
    }

    #[test]
    fn test_first_match_wins() {
        let rules = builtin_rules(ResourceKind::IamRole);
        // Matches both ecs-task-execution* and ecs-task*
        let m = match_name(&rules, "acme", "acme-ecs-task-execution-role").unwrap();
        assert_eq!(m.address, "aws_iam_role.ecs_task_execution");

        let m = match_name(&rules, "acme", "acme-ecs-task-role").unwrap();
        assert_eq!(m.address, "aws_iam_role.ecs_task");
    }

    #[test]
    fn test_parameterized_addresses() {
        let rules = builtin_rules(ResourceKind::DynamodbTable);
        let m = match_name(&rules, "acme", "acme-orders").unwrap();
        assert_eq!(m.address, "aws_dynamodb_table.tables[\"orders\"]");

        let rules = builtin_rules(ResourceKind::CloudwatchLogGroup);
        let m = match_name(&rules, "acme", "/aws/lambda/acme-api").unwrap();
        assert_eq!(m.address, "aws_cloudwatch_log_group.lambda[\"api\"]");
    }

    #[test]
    fn test_exact_rule_precedes_wildcard() {
        let rules = builtin_rules(ResourceKind::EcrRepo);
        assert_eq!(
            match_name(&rules, "acme", "acme").unwrap().address,
            "aws_ecr_repository.main"
        );
        assert_eq!(
            match_name(&rules, "acme", "acme-web").unwrap().address,
            "aws_ecr_repository.repositories[\"web\"]"
        );
    }

    #[test]
    fn test_secret_separator_wildcard() {
        let rules = builtin_rules(ResourceKind::Secret);
        assert_eq!(
            match_name(&rules, "acme", "acme/db-credentials").unwrap().address,
            "aws_secretsmanager_secret.db_credentials"
        );
        assert_eq!(
            match_name(&rules, "acme", "acme-stripe").unwrap().address,
            "aws_secretsmanager_secret.secrets[\"stripe\"]"
        );
    }

    #[test]
    fn test_render_address_placeholders() {
        let rendered = render_address(
            "{prefix}:{name}:{suffix}:{slug}",
            "acme",
            "acme-My.Service-1",
        );
        assert_eq!(rendered, "acme:acme-My.Service-1:My.Service-1:my_service_1");
    }

    #[test]
    fn test_suffix_of() {
        assert_eq!(suffix_of("acme-orders", "acme"), "orders");
        assert_eq!(suffix_of("/ecs/acme/web", "acme"), "web");
        assert_eq!(suffix_of("acme", "acme"), "acme");
        assert_eq!(suffix_of("other", "acme"), "other");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("lambda-deployment-x7f2"), "lambda_deployment_x7f2");
        assert_eq!(slugify("/aws/lambda/api"), "aws_lambda_api");
        assert_eq!(slugify("2024-archive"), "r_2024_archive");
        assert_eq!(slugify("---"), "resource");
    }

    #[test]
    fn test_other_project_sharing_prefix_is_unmatched() {
        // Listing filters with starts_with, so these reach the matcher
        let secrets = builtin_rules(ResourceKind::Secret);
        assert_eq!(match_name(&secrets, "acme", "acmecorp-stripe"), None);
        assert_eq!(match_name(&secrets, "acme", "acmecorp/db-credentials"), None);
        assert_eq!(match_name(&secrets, "acme", "acme_db-credentials"), None);

        let logs = builtin_rules(ResourceKind::CloudwatchLogGroup);
        assert_eq!(match_name(&logs, "acme", "/ecs/acmecorp-web"), None);
        assert_eq!(match_name(&logs, "acme", "/ecs/acmecorp"), None);
        assert_eq!(match_name(&logs, "acme", "/aws/apigateway/acmecorp"), None);
        assert_eq!(match_name(&logs, "acme", "/aws/lambda/acmecorp-api"), None);

        for kind in ResourceKind::ALL {
            let rules = builtin_rules(kind);
            for name in ["acmecorp", "acmecorp-web", "acmecorp-cluster"] {
                assert_eq!(match_name(&rules, "acme", name), None, "{} matched {}", kind, name);
            }
        }
    }

    #[test]
    fn test_ecs_log_groups() {
        let rules = builtin_rules(ResourceKind::CloudwatchLogGroup);
        assert_eq!(
            match_name(&rules, "acme", "/ecs/acme").unwrap().address,
            "aws_cloudwatch_log_group.ecs"
        );
        assert_eq!(
            match_name(&rules, "acme", "/ecs/acme-web").unwrap().address,
            "aws_cloudwatch_log_group.ecs_services[\"web\"]"
        );
        assert_eq!(
            match_name(&rules, "acme", "/ecs/acme/worker").unwrap().address,
            "aws_cloudwatch_log_group.ecs_services[\"worker\"]"
        );
    }

    #[test]
    fn test_ecs_cluster_rules_use_distinct_addresses() {
        let rules = builtin_rules(ResourceKind::EcsCluster);
        let main = match_name(&rules, "acme", "acme-cluster").unwrap();
        let project = match_name(&rules, "acme", "acme").unwrap();
        assert_ne!(main.address, project.address);
    }
}
