// SPDX-License-Identifier: GPL-3.0-only

//! Resumable inventory of object-store namespaces
//!
//! This crate hosts the scan engine and its immediate collaborators:
//! - Partition planning over one-level prefix listings
//! - The paginated scan loop with checkpoint/resume
//! - Listing backends (local directory, S3 behind the `s3` feature)
//! - Markdown report rendering and logging setup for the CLI

pub mod audit;
pub mod backends;
pub mod config;
pub mod error;
pub mod logging;
pub mod report;

pub use audit::{CheckpointFile, CountingMode, ScanConfig, Scanner};
pub use config::AuditConfig;
pub use error::{AuditError, Result};
