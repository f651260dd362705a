// SPDX-License-Identifier: GPL-3.0-only

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O error for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("checkpoint encoding failed for {path:?}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("checkpoint at {path:?} is unreadable: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Metadata problems that disqualify a single listed object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectError {
    #[error("object with empty key")]
    EmptyKey,

    #[error("object {key:?} has no usable last-modified timestamp")]
    MissingTimestamp { key: String },
}
