// SPDX-License-Identifier: GPL-3.0-only

//! Layered run configuration: TOML file, then environment, then CLI flags.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::types::{
    DEFAULT_CHECKPOINT_EVERY_PAGES, DEFAULT_CHECKPOINT_PATH, DEFAULT_PROGRESS_EVERY_PAGES,
    DEFAULT_RECENT_DAYS,
};
use crate::audit::{CountingMode, ScanConfig};

pub const DEFAULT_ROWS_PER_PART: usize = 20_000;
pub const DEFAULT_PAGE_SIZE: usize = 1_000;
pub const DEFAULT_OUTPUT_DIR: &str = ".";
/// Upper bound on the recency window, about a century.
pub const MAX_RECENT_DAYS: i64 = 36_500;

pub const ENV_BUCKET: &str = "BUCKET_NAME";
pub const ENV_TARGET_FOLDER: &str = "TARGET_FOLDER";
pub const ENV_IGNORED_PREFIX: &str = "IGNORED_PREFIX";
pub const ENV_MAX_REQUESTS: &str = "MAX_REQUESTS_SAFETY";
pub const ENV_RECENT_DAYS: &str = "RECENT_DAYS";
pub const ENV_CHECKPOINT_EVERY: &str = "CHECKPOINT_EVERY_PAGES";
pub const ENV_CHECKPOINT_PATH: &str = "BUCKET_AUDIT_CHECKPOINT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// S3 bucket to list. Mutually exclusive with `local_root`.
    pub bucket: Option<String>,
    /// Local directory treated as a bucket.
    pub local_root: Option<PathBuf>,
    pub target_folder: String,
    pub ignored_prefix: Option<String>,
    pub recent_days: i64,
    pub max_requests: u64,
    pub checkpoint_every_pages: u64,
    pub checkpoint_path: PathBuf,
    pub counting_mode: CountingMode,
    pub reference_time: Option<DateTime<Utc>>,
    pub progress_every_pages: u64,
    pub rows_per_part: usize,
    pub output_dir: PathBuf,
    pub page_size: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            local_root: None,
            target_folder: String::new(),
            ignored_prefix: None,
            recent_days: DEFAULT_RECENT_DAYS,
            max_requests: 0,
            checkpoint_every_pages: DEFAULT_CHECKPOINT_EVERY_PAGES,
            checkpoint_path: PathBuf::from(DEFAULT_CHECKPOINT_PATH),
            counting_mode: CountingMode::All,
            reference_time: None,
            progress_every_pages: DEFAULT_PROGRESS_EVERY_PAGES,
            rows_per_part: DEFAULT_ROWS_PER_PART,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl AuditConfig {
    /// Reads a TOML file, or returns defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    /// Applies overrides from an arbitrary lookup. Unparseable numbers keep
    /// the current value and log a warning.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(bucket) = lookup(ENV_BUCKET) {
            self.bucket = Some(bucket.trim().to_string());
        }
        if let Some(folder) = lookup(ENV_TARGET_FOLDER) {
            self.target_folder = folder;
        }
        if let Some(prefix) = lookup(ENV_IGNORED_PREFIX) {
            self.ignored_prefix = Some(prefix);
        }
        if let Some(path) = lookup(ENV_CHECKPOINT_PATH) {
            self.checkpoint_path = PathBuf::from(path);
        }

        parse_env(&lookup, ENV_MAX_REQUESTS, &mut self.max_requests);
        parse_env(&lookup, ENV_RECENT_DAYS, &mut self.recent_days);
        parse_env(&lookup, ENV_CHECKPOINT_EVERY, &mut self.checkpoint_every_pages);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.is_some() && self.local_root.is_some() {
            return Err(invalid(
                "source",
                "set either a bucket or a local directory, not both",
            ));
        }

        if self.recent_days < 0 {
            return Err(invalid("recent_days", "must not be negative"));
        }

        if self.recent_days > MAX_RECENT_DAYS {
            return Err(invalid(
                "recent_days",
                format!("must not exceed {MAX_RECENT_DAYS}"),
            ));
        }

        if self.checkpoint_every_pages == 0 {
            return Err(invalid("checkpoint_every_pages", "must be at least 1"));
        }

        if self.rows_per_part == 0 {
            return Err(invalid("rows_per_part", "must be at least 1"));
        }

        if self.page_size == 0 {
            return Err(invalid("page_size", "must be at least 1"));
        }

        if self.checkpoint_path.as_os_str().is_empty() {
            return Err(invalid("checkpoint_path", "must not be empty"));
        }

        let root = normalize_prefix(&self.target_folder);
        if let Some(excluded) = self.ignored_prefix.as_deref().map(normalize_prefix)
            && (excluded.is_empty() || excluded == root)
        {
            return Err(invalid(
                "ignored_prefix",
                "must name a folder below the target folder",
            ));
        }

        Ok(())
    }

    /// Validates and produces the engine configuration with normalized prefixes.
    pub fn to_scan_config(&self) -> Result<ScanConfig, ConfigError> {
        self.validate()?;

        let root_prefix = normalize_prefix(&self.target_folder);
        let excluded_prefix = self
            .ignored_prefix
            .as_deref()
            .map(normalize_prefix)
            .filter(|excluded| !excluded.is_empty());
        let recent_window = TimeDelta::try_days(self.recent_days)
            .ok_or_else(|| invalid("recent_days", "out of range"))?;

        if let Some(excluded) = excluded_prefix.as_deref()
            && !excluded.starts_with(&root_prefix)
        {
            tracing::warn!(
                excluded,
                root = %root_prefix,
                "ignored prefix lies outside the target folder and has no effect"
            );
        }

        Ok(ScanConfig {
            root_prefix,
            excluded_prefix,
            recent_window,
            max_requests: self.max_requests,
            checkpoint_every_pages: self.checkpoint_every_pages,
            counting_mode: self.counting_mode,
            checkpoint_path: self.checkpoint_path.clone(),
            reference_time: self.reference_time,
            progress_every_pages: self.progress_every_pages,
        })
    }
}

fn parse_env<F, T>(lookup: &F, name: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + std::fmt::Display,
{
    let Some(raw) = lookup(name) else {
        return;
    };

    match raw.trim().parse::<T>() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!(
            variable = name,
            value = %raw,
            fallback = %target,
            "ignoring unparseable environment value"
        ),
    }
}

/// Strips surrounding whitespace and leading slashes and guarantees a trailing
/// '/' on any non-empty prefix.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_start_matches('/');
    if trimmed.is_empty() || trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}
