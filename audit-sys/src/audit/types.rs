// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_RECENT_DAYS: i64 = 90;
pub const DEFAULT_CHECKPOINT_EVERY_PAGES: u64 = 500;
pub const DEFAULT_PROGRESS_EVERY_PAGES: u64 = 100;
pub const DEFAULT_CHECKPOINT_PATH: &str = "bucket-audit.checkpoint.json";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum CountingMode {
    /// Every object feeds the year and extension counters.
    #[default]
    All,
    /// Objects older than the recency window are skipped.
    RecentOnly,
}

impl CountingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CountingMode::All => "all",
            CountingMode::RecentOnly => "recent-only",
        }
    }
}

/// Everything one scan run needs to know, fixed at construction.
///
/// `root_prefix` and `excluded_prefix` are expected in normalized form: empty
/// or '/'-terminated. [`crate::AuditConfig::to_scan_config`] takes care of that.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub root_prefix: String,
    pub excluded_prefix: Option<String>,
    pub recent_window: TimeDelta,
    /// Ceiling on page requests per process run; 0 disables it.
    pub max_requests: u64,
    pub checkpoint_every_pages: u64,
    pub counting_mode: CountingMode,
    pub checkpoint_path: PathBuf,
    /// Anchor of the recency window. `None` means "now" at scan start.
    pub reference_time: Option<DateTime<Utc>>,
    pub progress_every_pages: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root_prefix: String::new(),
            excluded_prefix: None,
            recent_window: TimeDelta::days(DEFAULT_RECENT_DAYS),
            max_requests: 0,
            checkpoint_every_pages: DEFAULT_CHECKPOINT_EVERY_PAGES,
            counting_mode: CountingMode::All,
            checkpoint_path: PathBuf::from(DEFAULT_CHECKPOINT_PATH),
            reference_time: None,
            progress_every_pages: DEFAULT_PROGRESS_EVERY_PAGES,
        }
    }
}

impl ScanConfig {
    pub fn limit_reached(&self, requests_made: u64) -> bool {
        self.max_requests > 0 && requests_made >= self.max_requests
    }

    pub fn is_excluded(&self, key: &str) -> bool {
        self.excluded_prefix
            .as_deref()
            .is_some_and(|excluded| key.starts_with(excluded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ceiling_means_unlimited() {
        let config = ScanConfig::default();
        assert!(!config.limit_reached(1_000_000));

        let limited = ScanConfig {
            max_requests: 2,
            ..ScanConfig::default()
        };
        assert!(!limited.limit_reached(1));
        assert!(limited.limit_reached(2));
    }

    #[test]
    fn exclusion_matches_by_prefix() {
        let config = ScanConfig {
            excluded_prefix: Some("A/B/".to_string()),
            ..ScanConfig::default()
        };
        assert!(config.is_excluded("A/B/x.txt"));
        assert!(!config.is_excluded("A/C/y.txt"));
        assert!(!config.is_excluded("A/Bx/y.txt"));
    }
}
