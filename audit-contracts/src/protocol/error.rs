// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingErrorKind {
    InvalidInput,
    NotFound,
    PermissionDenied,
    Throttled,
    Timeout,
    Unavailable,
    Internal,
}

/// Transport-level failure of a listing call.
///
/// The scanner never retries these; it checkpoints and stops.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct ListingError {
    pub kind: ListingErrorKind,
    pub message: String,
}

impl ListingError {
    pub fn new(kind: ListingErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ListingErrorKind::Unavailable, message)
    }
}

impl From<std::io::Error> for ListingError {
    fn from(error: std::io::Error) -> Self {
        let kind = match error.kind() {
            std::io::ErrorKind::NotFound => ListingErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => ListingErrorKind::PermissionDenied,
            std::io::ErrorKind::TimedOut => ListingErrorKind::Timeout,
            std::io::ErrorKind::InvalidInput => ListingErrorKind::InvalidInput,
            _ => ListingErrorKind::Internal,
        };
        Self::new(kind, error.to_string())
    }
}
