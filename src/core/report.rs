//! Per-resource decisions and the aggregate run report.

use crate::core::run_config::RunMode;
use crate::discovery::registry::ResourceKind;
use crate::terraform::import::ImportErrorCause;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal state of one discovered resource (or of a whole type, for `DiscoveryFailed`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Listed in discover-only mode, no matching attempted
    Discovered,
    Unmatched,
    AlreadyDeclared,
    DryRunSkipped,
    Imported,
    ImportFailed,
    /// State membership unknown; import was not attempted
    StateQueryFailed,
    /// Listing the whole resource type failed
    DiscoveryFailed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Discovered => "discovered",
            Outcome::Unmatched => "unmatched",
            Outcome::AlreadyDeclared => "already-in-state",
            Outcome::DryRunSkipped => "would-import",
            Outcome::Imported => "imported",
            Outcome::ImportFailed => "import-failed",
            Outcome::StateQueryFailed => "state-query-failed",
            Outcome::DiscoveryFailed => "discovery-failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Outcome::ImportFailed | Outcome::StateQueryFailed | Outcome::DiscoveryFailed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationDecision {
    pub kind: ResourceKind,
    /// Discovered name; `None` for type-level failures
    pub name: Option<String>,
    pub import_id: Option<String>,
    pub region: Option<String>,
    pub address: Option<String>,
    pub rule: Option<String>,
    pub outcome: Outcome,
    pub error: Option<String>,
    pub cause: Option<ImportErrorCause>,
    /// Manual-import hint for unmatched resources
    pub suggested_address: Option<String>,
    pub notes: Vec<String>,
}

impl ReconciliationDecision {
    pub fn new(kind: ResourceKind, outcome: Outcome) -> Self {
        Self {
            kind,
            name: None,
            import_id: None,
            region: None,
            address: None,
            rule: None,
            outcome,
            error: None,
            cause: None,
            suggested_address: None,
            notes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub discovered: usize,
    pub imported: usize,
    pub already_declared: usize,
    pub dry_run_skipped: usize,
    pub unmatched: usize,
    pub import_failed: usize,
    pub state_query_failed: usize,
    pub discovery_failed: usize,
}

impl ReportSummary {
    fn record(&mut self, outcome: Outcome) {
        if outcome != Outcome::DiscoveryFailed {
            self.discovered += 1;
        }
        match outcome {
            Outcome::Discovered => {}
            Outcome::Unmatched => self.unmatched += 1,
            Outcome::AlreadyDeclared => self.already_declared += 1,
            Outcome::DryRunSkipped => self.dry_run_skipped += 1,
            Outcome::Imported => self.imported += 1,
            Outcome::ImportFailed => self.import_failed += 1,
            Outcome::StateQueryFailed => self.state_query_failed += 1,
            Outcome::DiscoveryFailed => self.discovery_failed += 1,
        }
    }

    pub fn failures(&self) -> usize {
        self.import_failed + self.state_query_failed + self.discovery_failed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub prefix: String,
    pub region: String,
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Resource types the run attempted, in processing order
    pub attempted_types: Vec<ResourceKind>,
    pub decisions: Vec<ReconciliationDecision>,
    pub summary: ReportSummary,
    pub cancelled: bool,
}

impl RunReport {
    pub fn new(prefix: &str, region: &str, mode: RunMode) -> Self {
        Self {
            prefix: prefix.to_string(),
            region: region.to_string(),
            mode,
            started_at: Utc::now(),
            finished_at: None,
            attempted_types: Vec::new(),
            decisions: Vec::new(),
            summary: ReportSummary::default(),
            cancelled: false,
        }
    }

    /// Append a decision, keeping the summary in step
    pub fn push(&mut self, decision: ReconciliationDecision) {
        self.summary.record(decision.outcome);
        self.decisions.push(decision);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn decisions_with(
        &self,
        outcome: Outcome,
    ) -> impl Iterator<Item = &ReconciliationDecision> {
        self.decisions.iter().filter(move |d| d.outcome == outcome)
    }

    pub fn decisions_for(
        &self,
        kind: ResourceKind,
    ) -> impl Iterator<Item = &ReconciliationDecision> {
        self.decisions.iter().filter(move |d| d.kind == kind)
    }

    /// True when types were attempted and every one of them failed to list
    pub fn all_discovery_failed(&self) -> bool {
        !self.attempted_types.is_empty()
            && self.summary.discovery_failed == self.attempted_types.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_tracks_pushes() {
        let mut report = RunReport::new("acme", "us-east-1", RunMode::Apply);
        report.push(ReconciliationDecision::new(ResourceKind::S3, Outcome::Imported));
        report.push(ReconciliationDecision::new(ResourceKind::S3, Outcome::Unmatched));
        report.push(ReconciliationDecision::new(
            ResourceKind::IamRole,
            Outcome::DiscoveryFailed,
        ));

        assert_eq!(report.summary.discovered, 2);
        assert_eq!(report.summary.imported, 1);
        assert_eq!(report.summary.unmatched, 1);
        assert_eq!(report.summary.discovery_failed, 1);
        assert_eq!(report.summary.failures(), 1);
        assert_eq!(report.decisions_for(ResourceKind::S3).count(), 2);
        assert_eq!(report.decisions_with(Outcome::Imported).count(), 1);
    }

    #[test]
    fn test_all_discovery_failed() {
        let mut report = RunReport::new("acme", "us-east-1", RunMode::DryRun);
        assert!(!report.all_discovery_failed());

        report.attempted_types = vec![ResourceKind::S3, ResourceKind::IamRole];
        report.push(ReconciliationDecision::new(ResourceKind::S3, Outcome::DiscoveryFailed));
        assert!(!report.all_discovery_failed());
        report.push(ReconciliationDecision::new(
            ResourceKind::IamRole,
            Outcome::DiscoveryFailed,
        ));
        assert!(report.all_discovery_failed());
    }

    #[test]
    fn test_outcome_serializes_snake_case() {
        let json = serde_json::to_string(&Outcome::DryRunSkipped).unwrap();
        assert_eq!(json, "\"dry_run_skipped\"");
        assert!(Outcome::StateQueryFailed.is_failure());
        assert!(!Outcome::Unmatched.is_failure());
    }
}
