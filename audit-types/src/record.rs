// SPDX-License-Identifier: GPL-3.0-only

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of a listing page.
///
/// `last_modified` is `None` when the store returned no timestamp or one that
/// could not be parsed; the scanner treats that as a per-object error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub key: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: u64,
}

impl ObjectRecord {
    pub fn new(key: impl Into<String>, last_modified: DateTime<Utc>, size: u64) -> Self {
        Self {
            key: key.into(),
            last_modified: Some(last_modified),
            size,
        }
    }

    pub fn without_timestamp(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            last_modified: None,
            size,
        }
    }

    pub fn is_marker(&self) -> bool {
        self.key.ends_with('/')
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectPage {
    pub objects: Vec<ObjectRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_continuation_token: Option<String>,
}

impl ObjectPage {
    pub fn new(objects: Vec<ObjectRecord>, next_continuation_token: Option<String>) -> Self {
        Self {
            objects,
            next_continuation_token,
        }
    }

    pub fn is_last(&self) -> bool {
        self.next_continuation_token.is_none()
    }
}

/// Arguments of a single paginated listing call.
///
/// With `delimited` set, only objects sitting directly under `prefix` are
/// returned; deeper keys are folded away by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest<'a> {
    pub prefix: &'a str,
    pub delimited: bool,
    pub continuation_token: Option<&'a str>,
}

impl<'a> PageRequest<'a> {
    pub fn recursive(prefix: &'a str) -> Self {
        Self {
            prefix,
            delimited: false,
            continuation_token: None,
        }
    }

    pub fn direct(prefix: &'a str) -> Self {
        Self {
            prefix,
            delimited: true,
            continuation_token: None,
        }
    }

    pub fn resume_from(mut self, token: Option<&'a str>) -> Self {
        self.continuation_token = token;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_keys_end_with_separator() {
        assert!(ObjectRecord::without_timestamp("reports/", 0).is_marker());
        assert!(!ObjectRecord::without_timestamp("reports/a.pdf", 10).is_marker());
    }

    #[test]
    fn page_request_builders_set_scope_and_token() {
        let request = PageRequest::direct("a/").resume_from(Some("tok"));
        assert!(request.delimited);
        assert_eq!(request.prefix, "a/");
        assert_eq!(request.continuation_token, Some("tok"));
        assert!(!PageRequest::recursive("a/").delimited);
    }
}
