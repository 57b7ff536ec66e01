//! preflight: reconcile live AWS resources with the stack before a deploy
//!
//! Run `preflight cleanup` before every deploy, then
//! `preflight import-manifest` and pass the printed path (if any) to the
//! deploy's `--import-existing-resources` option.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use preflight::aws::{AwsContext, FromAwsContext, ProviderClients};
use preflight::config::{DistributionPolicy, PinnedIds, ReconcileConfig};
use preflight::orchestrator::scan_table;
use preflight::{Orchestrator, ScanEntry};
use preflight_common::Naming;
use preflight_common::defaults::{
    DEFAULT_APP_NAME, DEFAULT_MANIFEST_PATH, DEFAULT_REGION, DEFAULT_TEARDOWN_TIMEOUT_SECS,
};
use std::time::Duration;
use tracing::{info, warn};

/// Log filter when `RUST_LOG` is unset; AWS SDK internals only at warn
const DEFAULT_LOG_FILTER: &str = "info,aws_config=warn,aws_sdk=warn,aws_smithy=warn";

#[derive(Parser, Debug)]
#[command(name = "preflight")]
#[command(about = "Pre-deployment cleanup and import planning for the application stack")]
#[command(version)]
struct Args {
    #[command(flatten)]
    target: TargetArgs,

    #[command(subcommand)]
    command: Command,
}

/// Deployment target shared by every command
#[derive(clap::Args, Debug)]
struct TargetArgs {
    /// AWS region of the stack
    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_REGION, global = true)]
    region: String,

    /// Deployment environment (dev, prod, ...)
    #[arg(long, env = "ENVIRONMENT", default_value = "dev", global = true)]
    environment: String,

    /// Domain the site and its subdomains live under
    #[arg(long, env = "BASE_DOMAIN", global = true)]
    base_domain: Option<String>,

    /// Application prefix of every resource name
    #[arg(long, env = "APP_NAME", default_value = DEFAULT_APP_NAME, global = true)]
    app_name: String,

    /// Stack whose inventory decides ownership (default: derived from naming)
    #[arg(long, env = "STACK_NAME", global = true)]
    stack_name: Option<String>,

    /// User pool that must never be cleaned or imported
    #[arg(long, env = "USER_POOL_ID", global = true)]
    user_pool_id: Option<String>,

    /// What to do with a distribution the stack does not own
    #[arg(long, env = "DISTRIBUTION_POLICY", default_value = "delete", global = true)]
    distribution_policy: DistributionPolicy,

    /// AWS profile to use (overrides AWS_PROFILE env var)
    #[arg(long, env = "AWS_PROFILE", global = true)]
    aws_profile: Option<String>,

    /// Overall timeout in seconds for one distribution teardown
    #[arg(long, default_value_t = DEFAULT_TEARDOWN_TIMEOUT_SECS, global = true)]
    teardown_timeout: u64,
}

impl TargetArgs {
    fn into_config(self) -> Result<ReconcileConfig> {
        let base_domain = self
            .base_domain
            .context("BASE_DOMAIN is required (set it or pass --base-domain)")?;
        let naming = Naming::new(
            &self.app_name,
            &self.environment,
            &self.region,
            &base_domain,
        )
        .context("Invalid deployment target")?;

        let mut config = ReconcileConfig::new(naming);
        if let Some(stack_name) = self.stack_name.filter(|s| !s.is_empty()) {
            config.target.stack_name = stack_name;
        }
        config.target.aws_profile = self.aws_profile;
        config.pinned = PinnedIds {
            user_pool_id: self.user_pool_id.filter(|id| !id.is_empty()),
        };
        config.cleanup.distribution_policy = self.distribution_policy;
        config.cleanup.wait.timeout = Duration::from_secs(self.teardown_timeout);
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScanFormat {
    Table,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Delete orphaned resources the stack cannot import (always exits 0)
    Cleanup {
        /// Log what would be deleted without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Write the import manifest and print its path (prints nothing when
    /// there is nothing to import)
    ImportManifest {
        /// Manifest location
        #[arg(long, env = "IMPORT_MANIFEST_PATH", default_value = DEFAULT_MANIFEST_PATH)]
        output: String,
    },

    /// List the resources preflight would consider, with their classification
    Scan {
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: ScanFormat,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

fn init_logging() {
    // stdout carries the manifest path; logs go to stderr
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let Some(mut config) = load_config(args.target, &args.command)? else {
        return Ok(());
    };

    if let Some(profile) = &config.target.aws_profile {
        info!(profile = %profile, "Using AWS profile");
    }
    let aws = AwsContext::with_profile(
        config.naming().region(),
        config.target.aws_profile.as_deref(),
    )
    .await;

    match args.command {
        Command::Cleanup { dry_run } => {
            config.cleanup.dry_run = dry_run;
            let orchestrator = Orchestrator::new(ProviderClients::from_context(&aws), config);
            let report = orchestrator.cleanup().await;
            if report.total_failed() > 0 {
                info!(
                    failed = report.total_failed(),
                    "Some resources were not cleaned; the deploy continues"
                );
            }
        }

        Command::ImportManifest { output } => {
            config.manifest_path = output;
            let orchestrator = Orchestrator::new(ProviderClients::from_context(&aws), config);
            if let Some(path) = orchestrator.import_manifest().await? {
                println!("{}", path.display());
            }
        }

        Command::Scan { format } => {
            let orchestrator = Orchestrator::new(ProviderClients::from_context(&aws), config);
            let entries = orchestrator.scan().await;
            print_scan(&entries, format)?;
        }
    }

    Ok(())
}

/// Resolve the run configuration.
///
/// `cleanup` must never block a deploy, so an invalid target is logged and
/// the run ends successfully with `None`; other commands fail.
fn load_config(target: TargetArgs, command: &Command) -> Result<Option<ReconcileConfig>> {
    match target.into_config() {
        Ok(config) => Ok(Some(config)),
        Err(e) if matches!(command, Command::Cleanup { .. }) => {
            warn!(error = %format!("{e:#}"), "Invalid configuration, skipping cleanup");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn print_scan(entries: &[ScanEntry], format: ScanFormat) -> Result<()> {
    if let ScanFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No resources found for this deployment.");
        return Ok(());
    }

    println!("{}", scan_table(entries));
    println!("\nTotal: {} resources", entries.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(args).expect("arguments parse")
    }

    #[test]
    fn cleanup_with_invalid_target_skips_instead_of_failing() {
        let args = parse(&["preflight", "--base-domain", "", "cleanup"]);
        let config = load_config(args.target, &args.command).expect("cleanup never fails");
        assert!(config.is_none());
    }

    #[test]
    fn import_manifest_with_invalid_target_fails() {
        let args = parse(&["preflight", "--base-domain", "", "import-manifest"]);
        assert!(load_config(args.target, &args.command).is_err());
    }

    #[test]
    fn cleanup_with_valid_target_loads_config() {
        let args = parse(&[
            "preflight",
            "--base-domain",
            "example.com",
            "--environment",
            "dev",
            "--region",
            "us-east-1",
            "cleanup",
        ]);
        let config = load_config(args.target, &args.command)
            .expect("valid")
            .expect("config");
        assert_eq!(config.naming().site_domain(), "dev.example.com");
    }
}
