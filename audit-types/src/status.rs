// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// How a scan run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanStatus {
    Success,
    #[serde(rename = "user-cancelled")]
    Cancelled,
    #[serde(rename = "safety-limit-reached")]
    LimitReached { limit: u64 },
    #[serde(rename = "error")]
    Failed { message: String },
}

impl ScanStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ScanStatus::Success)
    }

    /// Whether the checkpoint must survive this run.
    pub fn retains_checkpoint(&self) -> bool {
        !self.is_success()
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScanStatus::Success => "success",
            ScanStatus::Cancelled => "user-cancelled",
            ScanStatus::LimitReached { .. } => "safety-limit-reached",
            ScanStatus::Failed { .. } => "error",
        }
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStatus::LimitReached { limit } => {
                write!(f, "safety-limit-reached (limit: {limit} requests)")
            }
            ScanStatus::Failed { message } => write!(f, "error: {message}"),
            other => write!(f, "{}", other.label()),
        }
    }
}
