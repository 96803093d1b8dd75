// Re-export modules for testing and external use
pub mod discovery;

pub mod formatters {
    pub mod output;

    pub use output::OutputFormatter;
}

pub mod shared {
    pub mod logging;
    pub mod process;
}

pub mod terraform {
    pub mod import;
    pub mod state;

    pub use import::{ImportError, ImportErrorCause, Importer};
    pub use state::{StateQueryError, StateStore, TerraformCli};
}

pub mod core {
    pub mod reconciler;
    pub mod report;
    pub mod run_config;

    pub use reconciler::Reconciler;
    pub use report::{Outcome, ReconciliationDecision, ReportSummary, RunReport};
    pub use run_config::{ConfigurationError, RunConfig, RunMode, TypeFilter};
}

pub mod config;

// Re-export commonly used types for easier testing and external use
pub use crate::core::{ConfigurationError, Reconciler, RunConfig, RunMode, RunReport};
pub use discovery::aws::AwsCli;
pub use discovery::registry::{ResourceKind, ResourceRegistry};
pub use discovery::{DiscoveredResource, DiscoveryError, Lister};
pub use terraform::{Importer, StateStore, TerraformCli};
