// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionScope {
    /// Only objects immediately under the prefix.
    Direct,
    /// Every object below the prefix.
    #[default]
    Recursive,
}

/// An independently scannable slice of the key namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Partition {
    pub prefix: String,
    #[serde(default)]
    pub scope: PartitionScope,
}

impl Partition {
    pub fn recursive(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            scope: PartitionScope::Recursive,
        }
    }

    pub fn direct(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            scope: PartitionScope::Direct,
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = if self.prefix.is_empty() {
            "(root)"
        } else {
            self.prefix.as_str()
        };
        match self.scope {
            PartitionScope::Recursive => write!(f, "{prefix}"),
            PartitionScope::Direct => write!(f, "{prefix} (direct)"),
        }
    }
}
