use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tfimport::config::{self, Config};
use tfimport::core::{Reconciler, RunConfig, RunMode};
use tfimport::formatters::OutputFormatter;
use tfimport::shared::logging;
use tfimport::{AwsCli, TerraformCli};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_REGION: &str = "us-east-1";

const EXIT_OK: i32 = 0;
const EXIT_CONFIG: i32 = 1;
const EXIT_PROVIDER_UNREACHABLE: i32 = 2;
const EXIT_CANCELLED: i32 = 130;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "tfimport",
    about = "Import existing AWS resources carrying a project prefix into Terraform state.",
    version = APP_VERSION,
    disable_version_flag(true)
)]
pub struct Cli {
    #[arg(
        long,
        short = 'p',
        value_name = "PREFIX",
        required_unless_present_any = ["list_types", "version"],
        help = "Project name prefix shared by the resources to import"
    )]
    pub prefix: Option<String>,

    #[arg(long, short = 'r', value_name = "REGION", help = "AWS region")]
    pub region: Option<String>,

    #[arg(
        long = "resource-type",
        short = 't',
        value_name = "TYPE",
        default_value = "all",
        help = "Only process this resource type (see --list-types)"
    )]
    pub resource_type: String,

    #[arg(
        long,
        conflicts_with = "discover_only",
        help = "Report what would be imported without importing"
    )]
    pub dry_run: bool,

    #[arg(long, help = "Only list matching resources, no matching or import")]
    pub discover_only: bool,

    #[arg(long, short = 'd', value_name = "PATH", help = "Terraform project directory")]
    pub dir: Option<String>,

    #[arg(long, short = 'c', value_name = "PATH", help = "Path to the configuration file")]
    pub config: Option<String>,

    #[arg(long, value_name = "PROFILE", help = "AWS CLI profile")]
    pub profile: Option<String>,

    #[arg(long, help = "List resource types concurrently")]
    pub parallel_discovery: bool,

    #[arg(long, help = "Skip the AWS credentials check")]
    pub skip_preflight: bool,

    #[arg(long, value_name = "PATH", help = "Also write logs and the report to this file")]
    pub log_file: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "text", help = "Report format on stdout")]
    format: ReportFormat,

    #[arg(long, short = 'v', action = ArgAction::Count, help = "Increase log verbosity")]
    pub verbose: u8,

    #[arg(long, help = "Print supported resource types and their rules")]
    pub list_types: bool,

    #[arg(long, short = 'V', help = "Print version")]
    pub version: bool,
}

impl Cli {
    fn mode(&self) -> RunMode {
        if self.discover_only {
            RunMode::DiscoverOnly
        } else if self.dry_run {
            RunMode::DryRun
        } else {
            RunMode::Apply
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.version {
        println!("{}", APP_VERSION);
        std::process::exit(EXIT_OK);
    }

    let env_level = std::env::var("TFIMPORT_LOG_LEVEL").ok();
    let level = logging::resolve_level(cli.verbose, env_level.as_deref());
    if let Err(e) = logging::init(level, cli.log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(EXIT_CONFIG);
    }

    let code = run(cli).await;
    std::process::exit(code);
}

async fn run(cli: Cli) -> i32 {
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            logging::error(&format!("Failed to load configuration: {:#}", e));
            return EXIT_CONFIG;
        }
    };

    let registry = match config.build_registry() {
        Ok(registry) => registry,
        Err(e) => {
            logging::error(&format!("Invalid configuration: {}", e));
            return EXIT_CONFIG;
        }
    };

    if cli.list_types {
        print!("{}", OutputFormatter::format_registry_text(&registry));
        return EXIT_OK;
    }

    let region = cli
        .region
        .clone()
        .or_else(|| config.aws.region.clone())
        .unwrap_or_else(|| DEFAULT_REGION.to_string());
    let prefix = cli.prefix.clone().unwrap_or_default();
    let mode = cli.mode();

    let run_config = match RunConfig::new(prefix, region, &cli.resource_type, mode) {
        Ok(run_config) => run_config
            .with_parallel_discovery(cli.parallel_discovery || config.reconcile.parallel_discovery),
        Err(e) => {
            logging::error(&format!("Invalid configuration: {}", e));
            return EXIT_CONFIG;
        }
    };

    let timeout = config.command_timeout();

    let aws_path = match resolve_binary(config.aws.executable_path.as_deref(), "aws") {
        Ok(path) => path,
        Err(e) => {
            logging::error(&format!("{:#}", e));
            return EXIT_CONFIG;
        }
    };
    // Discover-only runs never touch Terraform
    let configured_terraform = config.terraform.executable_path.as_deref();
    let terraform_path = match resolve_binary(configured_terraform, "terraform") {
        Ok(path) => path,
        Err(_) if mode == RunMode::DiscoverOnly => PathBuf::from("terraform"),
        Err(e) => {
            logging::error(&format!("{:#}", e));
            return EXIT_CONFIG;
        }
    };
    let project_dir = match resolve_project_dir(&cli, &config) {
        Ok(dir) => dir,
        Err(e) => {
            logging::error(&format!("Invalid project directory: {:#}", e));
            return EXIT_CONFIG;
        }
    };
    logging::info(&format!("Using Terraform project directory: {}", project_dir.display()));

    let profile = cli.profile.clone().or_else(|| config.aws.profile.clone());
    let aws = Arc::new(AwsCli::new(aws_path, profile, timeout));

    if !cli.skip_preflight {
        match aws.caller_identity(&run_config.region).await {
            Ok(identity) => logging::info(&format!(
                "Authenticated as {} (account {})",
                identity.arn, identity.account
            )),
            Err(e) => {
                logging::error(&format!("Cannot reach AWS: {}", e));
                return EXIT_PROVIDER_UNREACHABLE;
            }
        }
    }

    let terraform = Arc::new(TerraformCli::new(terraform_path, project_dir, timeout));
    let cancelled = Arc::new(AtomicBool::new(false));
    spawn_interrupt_handler(cancelled.clone());

    let reconciler = Reconciler::new(registry, aws, terraform.clone(), terraform)
        .with_cancellation(cancelled);

    let report = match reconciler.run(&run_config).await {
        Ok(report) => report,
        Err(e) => {
            logging::error(&format!("Invalid configuration: {}", e));
            return EXIT_CONFIG;
        }
    };

    let text = OutputFormatter::format_report_text(&report);
    match cli.format {
        ReportFormat::Text => print!("{}", text),
        ReportFormat::Json => {
            let json = OutputFormatter::format_report_json(&report);
            match serde_json::to_string_pretty(&json) {
                Ok(json) => println!("{}", json),
                Err(e) => logging::error(&format!("Failed to serialize report: {}", e)),
            }
        }
    }
    if let Some(path) = &cli.log_file {
        if let Err(e) = logging::append_report(path, &text) {
            logging::warn(&format!("Failed to write report to {}: {}", path.display(), e));
        }
    }

    if report.cancelled {
        EXIT_CANCELLED
    } else if report.all_discovery_failed() {
        logging::error(
            "Every resource type failed to list; check AWS connectivity and permissions",
        );
        EXIT_PROVIDER_UNREACHABLE
    } else {
        EXIT_OK
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    match &cli.config {
        Some(path) => {
            let abs_path = Config::absolutize(path)?;
            logging::info(&format!("Using config file: {}", abs_path.display()));
            config::init_from_path(&abs_path.to_string_lossy())
        }
        None => {
            logging::debug("No config path provided, using default configuration");
            config::init_default()
        }
    }
}

/// Configured path or bare name (looked up on PATH), else `default_name` on PATH
fn resolve_binary(configured: Option<&str>, default_name: &str) -> anyhow::Result<PathBuf> {
    let path = match configured {
        Some(path) if path.contains(std::path::MAIN_SEPARATOR) => Config::absolutize(path)?,
        Some(name) => which::which(name)
            .map_err(|_| anyhow::anyhow!("'{}' binary not found in PATH", name))?,
        None => which::which(default_name)
            .map_err(|_| anyhow::anyhow!("'{}' binary not found in PATH", default_name))?,
    };
    logging::debug(&format!("Using {} binary: {}", default_name, path.display()));
    Ok(path)
}

/// CLI flag, then TERRAFORM_DIR / config file, then the current directory
fn resolve_project_dir(cli: &Cli, config: &Config) -> anyhow::Result<PathBuf> {
    let dir = match cli
        .dir
        .as_deref()
        .or(config.terraform.project_directory.as_deref())
    {
        Some(dir) => Config::absolutize(dir)?,
        None => std::env::current_dir()?,
    };
    if !dir.is_dir() {
        return Err(anyhow::anyhow!("{} is not a directory", dir.display()));
    }
    Ok(dir)
}

fn spawn_interrupt_handler(flag: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            logging::warn("Interrupt received; stopping after the current operation");
            flag.store(true, Ordering::SeqCst);
        }
    });
}
