// SPDX-License-Identifier: GPL-3.0-only

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AggregateStore, Partition, ScanCursor, ScanStatus};

/// Everything a report renderer needs from a finished (or aborted) run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub run_id: Uuid,
    pub status: ScanStatus,
    pub root_prefix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_prefix: Option<String>,
    pub reference_time: DateTime<Utc>,
    pub aggregates: AggregateStore,
    pub objects_processed: u64,
    pub objects_ignored: u64,
    pub objects_outside_window: u64,
    pub requests_made: u64,
    pub pages_processed: u64,
    pub checkpoint_failures: u64,
    pub partitions: Vec<Partition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resumed_from: Option<ScanCursor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_cursor: Option<ScanCursor>,
    pub elapsed_ms: u128,
}

impl ScanReport {
    pub fn was_resumed(&self) -> bool {
        self.resumed_from.is_some()
    }
}
