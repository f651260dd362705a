// SPDX-License-Identifier: GPL-3.0-only

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

pub const DEFAULT_FILTER: &str = "audit_sys=info,bucket_audit=info,warn";
pub const VERBOSE_FILTER: &str = "audit_sys=debug,bucket_audit=debug,info";
const DEFAULT_LOG_PREFIX: &str = "bucket-audit.log";
const APP_DIR: &str = "bucket-audit";
const KEEP_DAYS: u64 = 7;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogOptions {
    pub verbose: bool,
    pub log_to_disk: bool,
}

/// Installs the global subscriber: stderr always, plus a daily rolling file
/// when `log_to_disk` is set and the log directory is writable.
///
/// `RUST_LOG` takes precedence over the built-in filter.
pub fn init(options: LogOptions) {
    let fallback = if options.verbose {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_timer(tracing_subscriber::fmt::time::SystemTime);

    if !options.log_to_disk {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
        return;
    }

    match file_writer() {
        Ok((writer, guard)) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .with_timer(tracing_subscriber::fmt::time::SystemTime)
                .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();

            let _ = LOG_GUARD.set(guard);
        }
        Err(e) => {
            eprintln!("bucket-audit: failed to initialize file logging: {e:#}");
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .init();
        }
    }
}

fn file_writer() -> anyhow::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let (dir, prefix) = resolve_log_location(|name| std::env::var_os(name));

    fs::create_dir_all(&dir).map_err(|e| {
        anyhow::anyhow!("create log directory failed: {} ({})", dir.display(), e)
    })?;

    cleanup_old_logs(&dir, &prefix, KEEP_DAYS);

    let appender = tracing_appender::rolling::daily(&dir, &prefix);
    Ok(tracing_appender::non_blocking(appender))
}

fn resolve_log_location<F>(lookup: F) -> (PathBuf, OsString)
where
    F: Fn(&str) -> Option<OsString>,
{
    if let Some(file) = lookup("BUCKET_AUDIT_LOG_FILE") {
        let path = PathBuf::from(file);
        let dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_log_dir(&lookup));
        let prefix = path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from(DEFAULT_LOG_PREFIX));
        return (dir, prefix);
    }

    if let Some(dir) = lookup("BUCKET_AUDIT_LOG_DIR") {
        return (PathBuf::from(dir), OsString::from(DEFAULT_LOG_PREFIX));
    }

    (default_log_dir(&lookup), OsString::from(DEFAULT_LOG_PREFIX))
}

fn default_log_dir<F>(lookup: &F) -> PathBuf
where
    F: Fn(&str) -> Option<OsString>,
{
    if let Some(xdg_state) = lookup("XDG_STATE_HOME") {
        return PathBuf::from(xdg_state).join(APP_DIR).join("logs");
    }

    if let Some(home) = lookup("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("state")
            .join(APP_DIR)
            .join("logs");
    }

    std::env::temp_dir().join(APP_DIR).join("logs")
}

fn cleanup_old_logs(dir: &Path, prefix: &OsString, keep_days: u64) {
    let cutoff = SystemTime::now().checked_sub(Duration::from_secs(keep_days * 24 * 60 * 60));
    let Some(cutoff) = cutoff else { return };

    let prefix = prefix.to_string_lossy();

    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }

        // Rolling appender output only.
        if !entry.file_name().to_string_lossy().starts_with(prefix.as_ref()) {
            continue;
        }

        let Ok(modified) = entry.metadata().and_then(|metadata| metadata.modified()) else {
            continue;
        };
        if modified < cutoff {
            let _ = fs::remove_file(entry.path());
        }
    }
}
