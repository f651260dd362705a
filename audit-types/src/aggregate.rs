// SPDX-License-Identifier: GPL-3.0-only

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Folder key of objects stored at the top of the namespace.
pub const ROOT_FOLDER: &str = "";
/// Human-readable name of [`ROOT_FOLDER`].
pub const ROOT_LABEL: &str = "(root)";
/// Extension bucket for objects whose name carries no extension.
pub const NO_EXTENSION: &str = "(none)";

/// Strips the trailing separator for display and names the root sentinel.
pub fn display_folder(folder: &str) -> &str {
    if folder == ROOT_FOLDER {
        return ROOT_LABEL;
    }

    match folder.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => folder,
    }
}

/// Two-level counter: folder → key → count.
///
/// Absent entries read as zero; nothing is created by a read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NestedCounter<K: Ord> {
    folders: BTreeMap<String, BTreeMap<K, u64>>,
}

impl<K: Ord> Default for NestedCounter<K> {
    fn default() -> Self {
        Self {
            folders: BTreeMap::new(),
        }
    }
}

impl<K: Ord> NestedCounter<K> {
    pub fn increment(&mut self, folder: &str, key: K) {
        self.add(folder, key, 1);
    }

    pub fn add(&mut self, folder: &str, key: K, amount: u64) {
        *self
            .folders
            .entry(folder.to_string())
            .or_default()
            .entry(key)
            .or_insert(0) += amount;
    }

    pub fn get(&self, folder: &str, key: &K) -> u64 {
        self.folders
            .get(folder)
            .and_then(|counts| counts.get(key))
            .copied()
            .unwrap_or(0)
    }

    pub fn folder(&self, folder: &str) -> Option<&BTreeMap<K, u64>> {
        self.folders.get(folder)
    }

    pub fn folder_total(&self, folder: &str) -> u64 {
        self.folders
            .get(folder)
            .map(|counts| counts.values().sum())
            .unwrap_or(0)
    }

    pub fn folders(&self) -> impl Iterator<Item = &str> {
        self.folders.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeMap<K, u64>)> {
        self.folders
            .iter()
            .map(|(folder, counts)| (folder.as_str(), counts))
    }

    pub fn contains_folder(&self, folder: &str) -> bool {
        self.folders.contains_key(folder)
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    pub fn absorb(&mut self, other: NestedCounter<K>) {
        for (folder, counts) in other.folders {
            let target = self.folders.entry(folder).or_default();
            for (key, amount) in counts {
                *target.entry(key).or_insert(0) += amount;
            }
        }
    }
}

/// In-memory tallies of one scan.
///
/// Every mutation is an increment or a set union, so no operation can fail.
/// Marking a folder as holding files also marks it as known, which keeps
/// `folders_with_files ⊆ known_paths` after every call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateStore {
    years: NestedCounter<i32>,
    recent: BTreeMap<String, u64>,
    extensions: NestedCounter<String>,
    known_paths: BTreeSet<String>,
    folders_with_files: BTreeSet<String>,
    objects: u64,
    markers: u64,
    bytes: u64,
}

impl AggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_year(&mut self, folder: &str, year: i32) {
        self.years.increment(folder, year);
    }

    pub fn record_recent(&mut self, folder: &str) {
        *self.recent.entry(folder.to_string()).or_insert(0) += 1;
    }

    pub fn record_extension(&mut self, folder: &str, extension: &str) {
        self.extensions.increment(folder, extension.to_string());
    }

    pub fn mark_known_path(&mut self, path: &str) {
        self.known_paths.insert(path.to_string());
    }

    pub fn mark_folder_has_files(&mut self, folder: &str) {
        self.mark_known_path(folder);
        self.folders_with_files.insert(folder.to_string());
    }

    pub fn record_object(&mut self, size: u64) {
        self.objects += 1;
        self.bytes = self.bytes.saturating_add(size);
    }

    pub fn record_marker(&mut self) {
        self.markers += 1;
    }

    /// Folds a page-local tally into this store.
    pub fn absorb(&mut self, other: AggregateStore) {
        self.years.absorb(other.years);
        self.extensions.absorb(other.extensions);
        for (folder, count) in other.recent {
            *self.recent.entry(folder).or_insert(0) += count;
        }
        self.known_paths.extend(other.known_paths);
        self.folders_with_files.extend(other.folders_with_files);
        self.objects += other.objects;
        self.markers += other.markers;
        self.bytes = self.bytes.saturating_add(other.bytes);
    }

    pub fn year_count(&self, folder: &str, year: i32) -> u64 {
        self.years.get(folder, &year)
    }

    pub fn folder_total(&self, folder: &str) -> u64 {
        self.years.folder_total(folder)
    }

    pub fn recent_count(&self, folder: &str) -> u64 {
        self.recent.get(folder).copied().unwrap_or(0)
    }

    pub fn recent_total(&self) -> u64 {
        self.recent.values().sum()
    }

    pub fn extension_count(&self, folder: &str, extension: &str) -> u64 {
        self.extensions
            .folder(folder)
            .and_then(|counts| counts.get(extension))
            .copied()
            .unwrap_or(0)
    }

    pub fn years(&self) -> &NestedCounter<i32> {
        &self.years
    }

    pub fn recent(&self) -> &BTreeMap<String, u64> {
        &self.recent
    }

    pub fn extensions(&self) -> &NestedCounter<String> {
        &self.extensions
    }

    pub fn known_paths(&self) -> &BTreeSet<String> {
        &self.known_paths
    }

    pub fn folders_with_files(&self) -> &BTreeSet<String> {
        &self.folders_with_files
    }

    pub fn objects(&self) -> u64 {
        self.objects
    }

    pub fn markers(&self) -> u64 {
        self.markers
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.objects == 0 && self.markers == 0 && self.known_paths.is_empty()
    }

    /// Known folders without direct files, i.e. purely structural or empty.
    pub fn folders_without_files(&self) -> impl Iterator<Item = &str> {
        self.known_paths
            .iter()
            .filter(|path| !self.folders_with_files.contains(*path))
            .map(String::as_str)
    }
}
