use crate::core::report::{Outcome, ReconciliationDecision, RunReport};
use crate::core::run_config::RunMode;
use crate::discovery::registry::ResourceRegistry;
use serde_json::{json, Value};
use std::fmt::Write;

/// Renders run reports and the type registry for humans and machines
pub struct OutputFormatter;

impl OutputFormatter {
    /// Structured report with a summary block first
    pub fn format_report_json(report: &RunReport) -> Value {
        json!({
            "summary": {
                "prefix": report.prefix,
                "region": report.region,
                "mode": report.mode,
                "started_at": report.started_at,
                "finished_at": report.finished_at,
                "cancelled": report.cancelled,
                "attempted_types": report.attempted_types,
                "counts": report.summary,
            },
            "decisions": report.decisions.iter().map(|d| {
                json!({
                    "resource_type": d.kind,
                    "name": d.name,
                    "import_id": d.import_id,
                    "region": d.region,
                    "address": d.address,
                    "rule": d.rule,
                    "outcome": d.outcome,
                    "error": d.error,
                    "cause": d.cause,
                    "suggested_address": d.suggested_address,
                    "notes": d.notes,
                })
            }).collect::<Vec<_>>(),
        })
    }

    /// Plain-text report grouped by resource type
    pub fn format_report_text(report: &RunReport) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Import report for prefix '{}' in {} (mode: {})",
            report.prefix, report.region, report.mode
        );
        if report.cancelled {
            let _ = writeln!(out, "Run was cancelled; the report is partial.");
        }

        for kind in &report.attempted_types {
            let _ = writeln!(out);
            let _ = writeln!(out, "{}:", kind.display_name());
            let decisions: Vec<_> = report.decisions_for(*kind).collect();
            if decisions.is_empty() {
                let _ = writeln!(out, "  (none found)");
            }
            for decision in decisions {
                let _ = writeln!(out, "  {}", Self::format_decision_line(decision));
                if let Some(hint) = Self::manual_import_hint(decision) {
                    let _ = writeln!(out, "      {}", hint);
                }
                for note in &decision.notes {
                    let _ = writeln!(out, "      note: {}", note);
                }
            }
        }

        let s = &report.summary;
        let _ = writeln!(out);
        let _ = writeln!(out, "Summary:");
        let _ = writeln!(out, "  discovered:        {}", s.discovered);
        match report.mode {
            RunMode::DiscoverOnly => {}
            RunMode::DryRun => {
                let _ = writeln!(out, "  would import:      {}", s.dry_run_skipped);
            }
            RunMode::Apply => {
                let _ = writeln!(out, "  imported:          {}", s.imported);
                let _ = writeln!(out, "  import failed:     {}", s.import_failed);
            }
        }
        if report.mode != RunMode::DiscoverOnly {
            let _ = writeln!(out, "  already in state:  {}", s.already_declared);
            let _ = writeln!(out, "  unmatched:         {}", s.unmatched);
            let _ = writeln!(out, "  state check error: {}", s.state_query_failed);
        }
        let _ = writeln!(out, "  discovery errors:  {}", s.discovery_failed);

        if s.discovered == 0 && s.discovery_failed == 0 {
            let _ = writeln!(out, "Nothing to do: no resources carry this prefix.");
        } else if report.mode == RunMode::Apply
            && s.imported == 0
            && s.failures() > 0
            && s.already_declared == 0
        {
            let _ = writeln!(out, "Every import attempt failed; check the errors above.");
        }

        out
    }

    fn format_decision_line(decision: &ReconciliationDecision) -> String {
        let name = decision.name.as_deref().unwrap_or("-");
        let mut line = format!("[{}] {}", decision.outcome.as_str(), name);
        if let Some(address) = &decision.address {
            let _ = write!(line, " -> {}", address);
        }
        if let Some(id) = &decision.import_id {
            if Some(id) != decision.name.as_ref() {
                let _ = write!(line, " (id: {})", id);
            }
        }
        if let Some(error) = &decision.error {
            match decision.cause {
                Some(cause) => {
                    let _ = write!(line, ": {} [{}]", error, cause);
                }
                None => {
                    let _ = write!(line, ": {}", error);
                }
            }
        }
        line
    }

    /// Ready-to-run command for resources the operator has to handle by hand
    pub fn manual_import_hint(decision: &ReconciliationDecision) -> Option<String> {
        if decision.outcome != Outcome::Unmatched {
            return None;
        }
        let address = decision.suggested_address.as_ref()?;
        let id = decision.import_id.as_ref()?;
        Some(format!("manual: terraform import '{}' '{}'", address, id))
    }

    /// Supported resource types with their aliases and rules, in processing order
    pub fn format_registry_text(registry: &ResourceRegistry) -> String {
        let mut out = String::new();
        for spec in registry.specs() {
            let _ = writeln!(
                out,
                "{} ({}) -> {}",
                spec.kind.as_str(),
                spec.kind.display_name(),
                spec.kind.terraform_type()
            );
            if !spec.kind.aliases().is_empty() {
                let _ = writeln!(out, "  aliases: {}", spec.kind.aliases().join(", "));
            }
            let _ = writeln!(out, "  listing: aws {} {}", spec.list.service, spec.list.operation);
            for (idx, rule) in spec.rules.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "  {}. {:<32} {} ({})",
                    idx + 1,
                    rule.pattern,
                    rule.address,
                    rule.label
                );
            }
        }
        out
    }
}
