// SPDX-License-Identifier: GPL-3.0-only

use chrono::{DateTime, Utc};

use audit_types::ROOT_FOLDER;

use super::error::ObjectError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// Zero-byte placeholder whose key ends in '/'.
    Marker,
    File { modified: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified<'a> {
    pub folder: &'a str,
    pub kind: ObjectKind,
}

impl<'a> Classified<'a> {
    pub fn is_marker(&self) -> bool {
        self.kind == ObjectKind::Marker
    }

    pub fn ancestors(&self) -> impl Iterator<Item = &'a str> + use<'a> {
        ancestor_chain(self.folder)
    }
}

/// Splits a key into its logical folder and kind.
///
/// Markers need no timestamp since they only contribute structure.
pub fn classify(
    key: &str,
    last_modified: Option<DateTime<Utc>>,
) -> Result<Classified<'_>, ObjectError> {
    if key.is_empty() {
        return Err(ObjectError::EmptyKey);
    }

    if key.ends_with('/') {
        return Ok(Classified {
            folder: key,
            kind: ObjectKind::Marker,
        });
    }

    let Some(modified) = last_modified else {
        return Err(ObjectError::MissingTimestamp {
            key: key.to_string(),
        });
    };

    Ok(Classified {
        folder: logical_folder(key),
        kind: ObjectKind::File { modified },
    })
}

/// Everything up to and including the last '/', or the root sentinel.
pub fn logical_folder(key: &str) -> &str {
    match key.rfind('/') {
        Some(index) => &key[..=index],
        None => ROOT_FOLDER,
    }
}

/// Every '/'-terminated prefix of `folder`, shortest first.
///
/// `a/b/` yields `a/` then `a/b/`; the root sentinel yields itself.
pub fn ancestor_chain(folder: &str) -> impl Iterator<Item = &str> {
    let root = folder.is_empty().then_some(ROOT_FOLDER);
    root.into_iter().chain(
        folder
            .match_indices('/')
            .map(move |(index, _)| &folder[..=index]),
    )
}

/// Lowercased extension of the last path segment, leading dot included.
///
/// Leading dots belong to the stem, so dot-files such as `.env` have no
/// extension. A name ending in a dot has the bare `.` as its extension.
pub fn extension_of(key: &str) -> Option<String> {
    let name = key.rsplit('/').next().unwrap_or(key);
    let stem_start = name.len() - name.trim_start_matches('.').len();
    let dot = name[stem_start..].rfind('.')? + stem_start;

    Some(name[dot..].to_ascii_lowercase())
}
