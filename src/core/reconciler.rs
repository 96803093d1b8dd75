//! Discovery-and-import reconciliation.
//!
//! For each selected resource type the reconciler lists candidates, resolves each
//! name to a Terraform address through the type's rules, asks the state store
//! whether the address is already declared, and imports it when it is not.
//! Listing and import failures are recorded in the report; only configuration
//! errors abort a run, and they do so before anything is listed.

use crate::core::report::{Outcome, ReconciliationDecision, RunReport};
use crate::core::run_config::{ConfigurationError, RunConfig, RunMode, TypeFilter};
use crate::discovery::matcher::{slugify, suffix_of, RuleSet};
use crate::discovery::registry::{ResourceRegistry, ResourceTypeSpec};
use crate::discovery::{DiscoveredResource, DiscoveryError, Lister};
use crate::shared::logging;
use crate::terraform::import::{post_import_notes, Importer};
use crate::terraform::state::StateStore;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct Reconciler {
    registry: ResourceRegistry,
    lister: Arc<dyn Lister>,
    state: Arc<dyn StateStore>,
    importer: Arc<dyn Importer>,
    cancelled: Arc<AtomicBool>,
}

impl Reconciler {
    pub fn new(
        registry: ResourceRegistry,
        lister: Arc<dyn Lister>,
        state: Arc<dyn StateStore>,
        importer: Arc<dyn Importer>,
    ) -> Self {
        Self {
            registry,
            lister,
            state,
            importer,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an externally owned stop flag (e.g. set from a Ctrl-C handler)
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = flag;
        self
    }

    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Execute one run. The returned report covers every resource decided before
    /// the run finished or was cancelled.
    pub async fn run(&self, config: &RunConfig) -> Result<RunReport, ConfigurationError> {
        config.validate()?;
        let specs = self.select(config.filter)?;
        let rule_sets = self.compile_rules(&specs, config)?;

        logging::info(&format!(
            "Starting {} run for prefix '{}' in {} ({} resource types)",
            config.mode,
            config.prefix,
            config.region,
            specs.len()
        ));

        let mut report = RunReport::new(&config.prefix, &config.region, config.mode);
        // Address -> resource name, for addresses resolved earlier in this run
        let mut claims: HashMap<String, String> = HashMap::new();

        if config.parallel_discovery {
            // Listing is read-only, so all types are listed concurrently;
            // decisions are still made one type at a time in registry order.
            let listings = if self.is_cancelled() {
                Vec::new()
            } else {
                join_all(
                    specs
                        .iter()
                        .map(|spec| self.lister.list(spec, &config.prefix, &config.region)),
                )
                .await
            };

            for ((spec, rules), listing) in specs.iter().zip(rule_sets.iter()).zip(listings) {
                if self.is_cancelled() {
                    break;
                }
                report.attempted_types.push(spec.kind);
                self.process_type(
                    config,
                    spec,
                    rules.as_ref(),
                    listing,
                    &mut claims,
                    &mut report,
                )
                .await;
            }
        } else {
            for (spec, rules) in specs.iter().zip(rule_sets.iter()) {
                if self.is_cancelled() {
                    break;
                }
                report.attempted_types.push(spec.kind);
                let listing = self
                    .lister
                    .list(spec, &config.prefix, &config.region)
                    .await;
                self.process_type(
                    config,
                    spec,
                    rules.as_ref(),
                    listing,
                    &mut claims,
                    &mut report,
                )
                .await;
            }
        }

        if self.is_cancelled() {
            logging::warn("Run cancelled; returning decisions made so far");
            report.cancelled = true;
        }

        report.finish();
        logging::info(&format!(
            "Done: {} discovered, {} imported, {} in state, {} to import, {} unmatched, {} failed",
            report.summary.discovered,
            report.summary.imported,
            report.summary.already_declared,
            report.summary.dry_run_skipped,
            report.summary.unmatched,
            report.summary.failures()
        ));

        Ok(report)
    }

    fn select(&self, filter: TypeFilter) -> Result<Vec<&ResourceTypeSpec>, ConfigurationError> {
        match filter {
            TypeFilter::All => Ok(self.registry.specs().iter().collect()),
            TypeFilter::Only(kind) => self
                .registry
                .get(kind)
                .map(|spec| vec![spec])
                .ok_or_else(|| ConfigurationError::UnknownResourceType(kind.to_string())),
        }
    }

    /// Compile every selected type's rules up front so a bad pattern fails the run
    /// before any listing. Discover-only runs never evaluate rules.
    fn compile_rules(
        &self,
        specs: &[&ResourceTypeSpec],
        config: &RunConfig,
    ) -> Result<Vec<Option<RuleSet>>, ConfigurationError> {
        specs
            .iter()
            .map(|spec| {
                if config.mode == RunMode::DiscoverOnly {
                    return Ok(None);
                }
                RuleSet::for_spec(spec, &config.prefix)
                    .map(Some)
                    .map_err(|e| ConfigurationError::InvalidRule {
                        kind: spec.kind.to_string(),
                        pattern: e.pattern,
                        reason: e.source.to_string(),
                    })
            })
            .collect()
    }

    async fn process_type(
        &self,
        config: &RunConfig,
        spec: &ResourceTypeSpec,
        rules: Option<&RuleSet>,
        listing: Result<Vec<DiscoveredResource>, DiscoveryError>,
        claims: &mut HashMap<String, String>,
        report: &mut RunReport,
    ) {
        let mut resources = match listing {
            Ok(resources) => resources,
            Err(err) => {
                logging::warn(&format!("{}; continuing with remaining types", err));
                let mut decision = ReconciliationDecision::new(spec.kind, Outcome::DiscoveryFailed);
                decision.region = Some(config.region.clone());
                decision.error = Some(err.cause.to_string());
                report.push(decision);
                return;
            }
        };

        // Stable order for identical discovery results
        resources.sort_by(|a, b| a.name.cmp(&b.name));
        logging::info(&format!(
            "Found {} {} with prefix '{}'",
            resources.len(),
            spec.kind.display_name(),
            config.prefix
        ));

        for resource in resources {
            if self.is_cancelled() {
                return;
            }
            let decision = match rules {
                Some(rules) => self.decide(config, rules, resource, claims).await,
                None => discovered_only(resource),
            };
            report.push(decision);
        }
    }

    async fn decide(
        &self,
        config: &RunConfig,
        rules: &RuleSet,
        resource: DiscoveredResource,
        claims: &mut HashMap<String, String>,
    ) -> ReconciliationDecision {
        let kind = resource.kind;
        let mut decision = ReconciliationDecision::new(kind, Outcome::Unmatched);
        decision.name = Some(resource.name.clone());
        decision.import_id = Some(resource.import_id.clone());
        decision.region = Some(resource.region.clone());

        let suggested = format!(
            "{}.{}",
            kind.terraform_type(),
            slugify(suffix_of(&resource.name, &config.prefix))
        );

        let Some(matched) = rules.resolve(&resource.name) else {
            logging::info(&format!(
                "No rule matches {} '{}'; import manually if needed (e.g. {})",
                kind, resource.name, suggested
            ));
            decision.suggested_address = Some(suggested);
            return decision;
        };

        // One address holds one resource; a second claimant is left for the operator
        if let Some(owner) = claims.get(&matched.address) {
            let detail = format!(
                "address {} already taken by '{}' in this run",
                matched.address, owner
            );
            logging::warn(&format!("{} '{}': {}", kind, resource.name, detail));
            decision.error = Some(detail);
            decision.suggested_address = Some(suggested);
            return decision;
        }
        claims.insert(matched.address.clone(), resource.name.clone());

        decision.address = Some(matched.address.clone());
        decision.rule = Some(matched.label.clone());

        match self.state.is_declared(&matched.address).await {
            Ok(true) => {
                logging::debug(&format!("{} already in state", matched.address));
                decision.outcome = Outcome::AlreadyDeclared;
                return decision;
            }
            Ok(false) => {}
            Err(err) => {
                logging::warn(&format!(
                    "Could not check state for {}: {}; skipping import",
                    matched.address, err
                ));
                decision.outcome = Outcome::StateQueryFailed;
                decision.error = Some(err.to_string());
                return decision;
            }
        }

        if config.mode == RunMode::DryRun {
            logging::info(&format!(
                "Would import {} '{}' as {}",
                kind, resource.import_id, matched.address
            ));
            decision.outcome = Outcome::DryRunSkipped;
            return decision;
        }

        logging::info(&format!(
            "Importing {} '{}' as {}",
            kind, resource.import_id, matched.address
        ));
        match self
            .importer
            .import(&matched.address, &resource.import_id)
            .await
        {
            Ok(()) => {
                decision.outcome = Outcome::Imported;
                decision.notes = post_import_notes(kind);
            }
            Err(err) => {
                logging::error(&format!("{}", err));
                decision.outcome = Outcome::ImportFailed;
                decision.cause = Some(err.cause);
                decision.error = Some(err.detail);
            }
        }
        decision
    }
}

fn discovered_only(resource: DiscoveredResource) -> ReconciliationDecision {
    let mut decision = ReconciliationDecision::new(resource.kind, Outcome::Discovered);
    decision.name = Some(resource.name);
    decision.import_id = Some(resource.import_id);
    decision.region = Some(resource.region);
    decision
}
