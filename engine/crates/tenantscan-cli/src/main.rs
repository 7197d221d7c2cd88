//! TenantScan - Cloud tenant configuration audit
//!
//! Runs a checklist of shell, cloud CLI, and directory-graph checks against
//! the signed-in tenant and reports one verdict per entry.

mod console;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tenantscan_audit::ScanScheduler;
use tenantscan_checks::{load_checklist, write_report};
use tenantscan_common::logging::{init_logging, LogConfig, LogFormat};
use tenantscan_common::Config;
use tenantscan_session::Sessions;
use tracing::{debug, error, info, warn};

const DEFAULT_INPUT: &str = "audit_csv/ps.csv";

/// TenantScan audit tool
#[derive(Parser, Debug)]
#[command(name = "tenantscan")]
#[command(version)]
#[command(about = "Cloud tenant and office suite configuration audit", long_about = None)]
struct Args {
    /// Checklist file (semicolon-delimited)
    #[arg(short, long, default_value = DEFAULT_INPUT)]
    input: PathBuf,

    /// Report file (.csv, .xlsx, otherwise JSON); no report when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    debug: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log format (pretty, compact, json)
    #[arg(long)]
    log_format: Option<String>,

    /// Maximum number of concurrent scans
    #[arg(long)]
    jobs: Option<usize>,
}

fn load_config(args: &Args) -> Result<Config> {
    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("cannot load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    Ok(config.merge_env())
}

fn log_config(args: &Args, config: &Config) -> LogConfig {
    let format = args.log_format.as_deref().unwrap_or(&config.logging.format);
    let log_config = LogConfig::new()
        .level(config.logging.level.as_str())
        .format(LogFormat::parse(format));

    if args.debug {
        log_config.debug()
    } else {
        log_config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(&args)?;
    if let Some(jobs) = args.jobs {
        config.engine.max_concurrent_scans = jobs;
    }

    init_logging(&log_config(&args, &config));

    info!("TenantScan v{}", env!("CARGO_PKG_VERSION"));
    info!("Platform: {} ({})", std::env::consts::OS, std::env::consts::ARCH);
    if std::env::consts::ARCH != "x86_64" {
        warn!(
            "Some checks may not work on this architecture: the directory module requires x86_64. \
             They will still run but will likely report the module as missing."
        );
    }

    let specs = load_checklist(&args.input)
        .with_context(|| format!("cannot load checklist {}", args.input.display()))?;

    info!("Connecting to the tenant, this may take some time");
    let sessions = match Sessions::establish(&config).await {
        Ok(sessions) => Arc::new(sessions),
        Err(e) if e.is_fatal() => {
            error!("[{}] {}", e.code(), e);
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("cannot connect to the tenant"),
    };
    info!("All sessions established");

    let scheduler =
        ScanScheduler::new(sessions).with_concurrency(config.engine.max_concurrent_scans);

    let cancel = scheduler.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received interrupt, cancelling remaining scans");
            cancel.cancel();
        }
    });

    let report = scheduler.run(specs).await;
    debug!("Audit finished in {}ms", report.duration().num_milliseconds());

    console::print_results(&report, args.debug);
    console::print_summary(&report.summary, report.duration().num_seconds());

    if let Some(output) = &args.output {
        write_report(output, &report.results())
            .with_context(|| format!("cannot write report {}", output.display()))?;
        info!("Results written to {}", output.display());
    }

    Ok(())
}
