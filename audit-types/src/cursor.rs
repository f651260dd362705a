// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// Resume position: which partition to scan next, and where inside it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCursor {
    pub partition_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

impl ScanCursor {
    pub fn start_of(partition_index: usize) -> Self {
        Self {
            partition_index,
            continuation_token: None,
        }
    }

    pub fn within(partition_index: usize, continuation_token: Option<String>) -> Self {
        Self {
            partition_index,
            continuation_token,
        }
    }
}

impl std::fmt::Display for ScanCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.continuation_token {
            Some(_) => write!(f, "partition #{} (mid-listing)", self.partition_index),
            None => write!(f, "partition #{}", self.partition_index),
        }
    }
}
