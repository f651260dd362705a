// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

use crate::config::ConfigError;

/// Error types for audit runs outside the scan loop itself
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// Result type alias for audit operations
pub type Result<T> = std::result::Result<T, AuditError>;
