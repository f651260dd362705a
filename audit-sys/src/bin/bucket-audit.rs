// SPDX-License-Identifier: GPL-3.0-only

//! bucket-audit - resumable per-folder inventory of an object-store bucket
//!
//! Interrupt with Ctrl-C at any time: the current position is checkpointed
//! and the next run with the same settings resumes from it.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use audit_contracts::ObjectLister;
use audit_sys::audit::{Scanner, format_bytes, format_duration};
use audit_sys::backends::LocalDirectoryStore;
use audit_sys::logging::{self, LogOptions};
use audit_sys::report::{ReportOptions, write_reports};
use audit_sys::{AuditConfig, CountingMode, ScanConfig};
use audit_types::{ScanReport, ScanStatus};

#[derive(Debug, Parser)]
#[command(name = "bucket-audit")]
#[command(about = "Count objects per folder, year and extension with checkpoint/resume")]
struct Args {
    /// TOML configuration file; environment and flags override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// S3 bucket to scan (requires the `s3` feature).
    #[arg(long)]
    bucket: Option<String>,

    /// Scan a local directory as if it were a bucket.
    #[arg(long, conflicts_with = "bucket")]
    local_dir: Option<PathBuf>,

    /// Root prefix to scan; empty scans the whole bucket.
    #[arg(long)]
    prefix: Option<String>,

    /// Prefix to leave out of the scan.
    #[arg(long)]
    exclude: Option<String>,

    #[arg(long)]
    recent_days: Option<i64>,

    /// Stop after this many page requests; 0 means no ceiling.
    #[arg(long)]
    max_requests: Option<u64>,

    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Pages between periodic checkpoint writes.
    #[arg(long)]
    checkpoint_every: Option<u64>,

    #[arg(long, value_enum)]
    mode: Option<CountingMode>,

    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[arg(long)]
    rows_per_part: Option<usize>,

    #[arg(long)]
    page_size: Option<usize>,

    /// Print the scan report as JSON instead of writing Markdown.
    #[arg(long)]
    json: bool,

    #[arg(long, short)]
    verbose: bool,

    /// Also log to a daily rolling file.
    #[arg(long)]
    log_file: bool,
}

impl Args {
    fn apply(&self, config: &mut AuditConfig) {
        if let Some(bucket) = &self.bucket {
            config.bucket = Some(bucket.clone());
            config.local_root = None;
        }
        if let Some(dir) = &self.local_dir {
            config.local_root = Some(dir.clone());
            config.bucket = None;
        }
        if let Some(prefix) = &self.prefix {
            config.target_folder = prefix.clone();
        }
        if let Some(exclude) = &self.exclude {
            config.ignored_prefix = Some(exclude.clone());
        }
        if let Some(days) = self.recent_days {
            config.recent_days = days;
        }
        if let Some(max_requests) = self.max_requests {
            config.max_requests = max_requests;
        }
        if let Some(path) = &self.checkpoint {
            config.checkpoint_path = path.clone();
        }
        if let Some(every) = self.checkpoint_every {
            config.checkpoint_every_pages = every;
        }
        if let Some(mode) = self.mode {
            config.counting_mode = mode;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(rows) = self.rows_per_part {
            config.rows_per_part = rows;
        }
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    logging::init(LogOptions {
        verbose: args.verbose,
        log_to_disk: args.log_file,
    });

    tracing::info!("Starting bucket-audit v{}", env!("CARGO_PKG_VERSION"));

    let (config, scan_config) = resolve_config(&args)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping at the next object");
            ctrl_c.cancel();
        }
    });

    let (report, source) = if let Some(root) = &config.local_root {
        let store = LocalDirectoryStore::new(root).with_page_size(config.page_size);
        let source = root.display().to_string();
        (run(store, scan_config, cancel).await, source)
    } else if let Some(bucket) = &config.bucket {
        (run_bucket(bucket, &config, scan_config, cancel).await?, bucket.clone())
    } else {
        anyhow::bail!("no bucket or local directory configured (set BUCKET_NAME or pass --bucket / --local-dir)");
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let options = ReportOptions {
            source: &source,
            generated_at: Utc::now(),
            rows_per_part: config.rows_per_part,
            recent_days: config.recent_days,
        };
        let written = write_reports(&config.output_dir, &report, &options)
            .with_context(|| format!("writing reports to {}", config.output_dir.display()))?;
        print_summary(&report, &written);
    }

    Ok(exit_code(&report.status))
}

/// TOML file, then environment, then flags.
fn resolve_config(args: &Args) -> audit_sys::Result<(AuditConfig, ScanConfig)> {
    let mut config = AuditConfig::load(args.config.as_deref())?;
    config.apply_env();
    args.apply(&mut config);
    let scan_config = config.to_scan_config()?;
    Ok((config, scan_config))
}

async fn run<L: ObjectLister>(
    lister: L,
    config: ScanConfig,
    cancel: CancellationToken,
) -> ScanReport {
    Scanner::new(lister, config)
        .with_cancellation(cancel)
        .run()
        .await
}

#[cfg(feature = "s3")]
async fn run_bucket(
    bucket: &str,
    config: &AuditConfig,
    scan_config: ScanConfig,
    cancel: CancellationToken,
) -> audit_sys::Result<ScanReport> {
    let store = audit_sys::backends::S3ObjectStore::from_env(bucket)
        .await
        .with_page_size(config.page_size);
    Ok(run(store, scan_config, cancel).await)
}

#[cfg(not(feature = "s3"))]
async fn run_bucket(
    bucket: &str,
    _config: &AuditConfig,
    _scan_config: ScanConfig,
    _cancel: CancellationToken,
) -> audit_sys::Result<ScanReport> {
    Err(audit_sys::AuditError::BackendUnavailable(format!(
        "bucket {bucket:?} requested but this build lacks the `s3` feature"
    )))
}

fn exit_code(status: &ScanStatus) -> ExitCode {
    match status {
        ScanStatus::Success => ExitCode::SUCCESS,
        ScanStatus::Failed { .. } => ExitCode::from(1),
        ScanStatus::LimitReached { .. } => ExitCode::from(2),
        ScanStatus::Cancelled => ExitCode::from(130),
    }
}

fn print_summary(report: &ScanReport, written: &[PathBuf]) {
    println!("STATUS         {}", report.status);
    println!(
        "OBJECTS        {} ({})",
        report.objects_processed,
        format_bytes(report.aggregates.bytes())
    );
    println!("IGNORED        {}", report.objects_ignored);
    println!("OUTSIDE WINDOW {}", report.objects_outside_window);
    println!("FOLDERS        {}", report.aggregates.known_paths().len());
    println!("RECENT         {}", report.aggregates.recent_total());
    println!(
        "REQUESTS       {} ({} pages)",
        report.requests_made, report.pages_processed
    );
    println!(
        "ELAPSED        {}",
        format_duration(Some(std::time::Duration::from_millis(
            u64::try_from(report.elapsed_ms).unwrap_or(u64::MAX)
        )))
    );

    if let Some(cursor) = &report.checkpoint_cursor {
        println!();
        println!("checkpoint kept at {cursor}; rerun with the same settings to resume");
    }
    if report.checkpoint_failures > 0 {
        println!(
            "warning: {} checkpoint operation(s) failed, see log",
            report.checkpoint_failures
        );
    }

    println!();
    for path in written {
        println!("  {}", path.display());
    }
}
