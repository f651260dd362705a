// SPDX-License-Identifier: GPL-3.0-only

//! Durable scan state.
//!
//! One JSON record per checkpoint location holds the aggregate snapshot and
//! the resume cursor. Writes go to a sibling temporary file that is synced and
//! renamed over the previous record, so a crash leaves either the old or the
//! new record readable.
//!
//! Every field except the cursor defaults when absent: records written before
//! an aggregate existed still load, with that aggregate empty. Unknown fields
//! are ignored. A record that cannot be parsed is reported as absent.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use audit_types::{AggregateStore, Partition, ScanCursor};

use super::error::CheckpointError;
use super::types::{CountingMode, ScanConfig};

pub const CHECKPOINT_VERSION: u32 = 1;

fn default_version() -> u32 {
    CHECKPOINT_VERSION
}

/// Owned form of a checkpoint, as read back from disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub run_id: Uuid,
    #[serde(default)]
    pub root_prefix: String,
    #[serde(default)]
    pub excluded_prefix: Option<String>,
    #[serde(default)]
    pub reference_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub counting_mode: CountingMode,
    /// Recency window in seconds; absent in records that predate it.
    #[serde(default)]
    pub recent_window_secs: Option<i64>,
    #[serde(default)]
    pub partitions: Vec<Partition>,
    pub cursor: ScanCursor,
    #[serde(default)]
    pub aggregates: AggregateStore,
    #[serde(default)]
    pub objects_ignored: u64,
    #[serde(default)]
    pub objects_outside_window: u64,
    #[serde(default)]
    pub pages_processed: u64,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl CheckpointRecord {
    /// Whether this record was written for the same namespace slice and the
    /// same counting rules, so that resuming it equals an uninterrupted run.
    pub fn matches(&self, config: &ScanConfig) -> bool {
        self.root_prefix == config.root_prefix
            && self.excluded_prefix == config.excluded_prefix
            && self.counting_mode == config.counting_mode
            && self
                .recent_window_secs
                .is_none_or(|secs| secs == config.recent_window.num_seconds())
    }
}

/// Borrowed form of a checkpoint, used for writing without cloning the
/// aggregates. Field names mirror [`CheckpointRecord`].
#[derive(Debug, Serialize)]
pub struct CheckpointSnapshot<'a> {
    pub version: u32,
    pub run_id: Uuid,
    pub root_prefix: &'a str,
    pub excluded_prefix: Option<&'a str>,
    pub reference_time: Option<DateTime<Utc>>,
    pub counting_mode: CountingMode,
    pub recent_window_secs: Option<i64>,
    pub partitions: &'a [Partition],
    pub cursor: &'a ScanCursor,
    pub aggregates: &'a AggregateStore,
    pub objects_ignored: u64,
    pub objects_outside_window: u64,
    pub pages_processed: u64,
    pub saved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CheckpointFile {
    path: PathBuf,
}

impl CheckpointFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Reads the record, treating a corrupt one as absent.
    pub fn load(&self) -> Option<CheckpointRecord> {
        match self.try_load() {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!(%error, "ignoring unreadable checkpoint, starting fresh");
                None
            }
        }
    }

    pub fn try_load(&self) -> Result<Option<CheckpointRecord>, CheckpointError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CheckpointError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let record: CheckpointRecord =
            serde_json::from_slice(&raw).map_err(|source| CheckpointError::Decode {
                path: self.path.clone(),
                source,
            })?;

        if record.version > CHECKPOINT_VERSION {
            tracing::warn!(
                version = record.version,
                supported = CHECKPOINT_VERSION,
                "checkpoint written by a newer schema, loading known fields only"
            );
        }

        Ok(Some(record))
    }

    pub fn save(&self, snapshot: &CheckpointSnapshot<'_>) -> Result<(), CheckpointError> {
        let io_error = |source| CheckpointError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let temp_path = self.temp_path();
        let file = File::create(&temp_path).map_err(io_error)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, snapshot).map_err(|source| {
            CheckpointError::Encode {
                path: self.path.clone(),
                source,
            }
        })?;
        writer.flush().map_err(io_error)?;

        let file = writer
            .into_inner()
            .map_err(|error| io_error(error.into_error()))?;
        file.sync_all().map_err(io_error)?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(io_error)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), CheckpointError> {
        for path in [self.path.clone(), self.temp_path()] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(CheckpointError::Io { path, source }),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn snapshot<'a>(
        aggregates: &'a AggregateStore,
        cursor: &'a ScanCursor,
        partitions: &'a [Partition],
    ) -> CheckpointSnapshot<'a> {
        CheckpointSnapshot {
            version: CHECKPOINT_VERSION,
            run_id: Uuid::nil(),
            root_prefix: "data/",
            excluded_prefix: Some("data/tmp/"),
            reference_time: None,
            counting_mode: CountingMode::RecentOnly,
            recent_window_secs: Some(TimeDelta::days(30).num_seconds()),
            partitions,
            cursor,
            aggregates,
            objects_ignored: 2,
            objects_outside_window: 0,
            pages_processed: 7,
            saved_at: None,
        }
    }

    #[test]
    fn saves_and_loads_state() {
        let dir = tempfile::tempdir().expect("temp dir");
        let file = CheckpointFile::new(dir.path().join("state/checkpoint.json"));

        let mut aggregates = AggregateStore::new();
        aggregates.record_year("data/a/", 2021);
        aggregates.record_extension("data/a/", ".pdf");
        aggregates.mark_folder_has_files("data/a/");
        let cursor = ScanCursor::within(3, Some("token-9".to_string()));
        let partitions = vec![Partition::recursive("data/a/")];

        file.save(&snapshot(&aggregates, &cursor, &partitions))
            .expect("save checkpoint");
        let loaded = file.load().expect("checkpoint present");

        assert_eq!(loaded.cursor, cursor);
        assert_eq!(loaded.aggregates, aggregates);
        assert_eq!(loaded.partitions, partitions);
        assert_eq!(loaded.objects_ignored, 2);
        assert_eq!(loaded.counting_mode, CountingMode::RecentOnly);

        let same = ScanConfig {
            root_prefix: "data/".to_string(),
            excluded_prefix: Some("data/tmp/".to_string()),
            counting_mode: CountingMode::RecentOnly,
            recent_window: TimeDelta::days(30),
            ..ScanConfig::default()
        };
        assert!(loaded.matches(&same));
        assert!(!loaded.matches(&ScanConfig {
            excluded_prefix: None,
            ..same.clone()
        }));
        assert!(!loaded.matches(&ScanConfig {
            counting_mode: CountingMode::All,
            ..same.clone()
        }));
        assert!(!loaded.matches(&ScanConfig {
            recent_window: TimeDelta::days(31),
            ..same
        }));
        assert!(!file.temp_path().exists());
    }

    #[test]
    fn overwrites_previous_record() {
        let dir = tempfile::tempdir().expect("temp dir");
        let file = CheckpointFile::new(dir.path().join("checkpoint.json"));
        let aggregates = AggregateStore::new();
        let partitions = Vec::new();

        let first = ScanCursor::start_of(1);
        file.save(&snapshot(&aggregates, &first, &partitions))
            .expect("first save");
        let second = ScanCursor::start_of(2);
        file.save(&snapshot(&aggregates, &second, &partitions))
            .expect("second save");

        assert_eq!(file.load().expect("present").cursor, second);
    }

    #[test]
    fn missing_and_corrupt_records_load_as_none() {
        let dir = tempfile::tempdir().expect("temp dir");
        let file = CheckpointFile::new(dir.path().join("checkpoint.json"));
        assert!(file.load().is_none());

        fs::write(file.path(), b"{not json").expect("write garbage");
        assert!(file.load().is_none());
        assert!(matches!(
            file.try_load(),
            Err(CheckpointError::Decode { .. })
        ));
    }

    #[test]
    fn older_records_without_new_aggregates_still_load() {
        let dir = tempfile::tempdir().expect("temp dir");
        let file = CheckpointFile::new(dir.path().join("checkpoint.json"));
        fs::write(
            file.path(),
            br#"{
                "cursor": {"partition_index": 4, "continuation_token": "abc"},
                "aggregates": {"years": {"a/": {"2019": 3}}, "known_paths": ["a/"]},
                "some_future_field": true
            }"#,
        )
        .expect("write legacy record");

        let loaded = file.load().expect("legacy record loads");
        assert_eq!(loaded.version, CHECKPOINT_VERSION);
        assert_eq!(loaded.cursor, ScanCursor::within(4, Some("abc".to_string())));
        assert_eq!(loaded.aggregates.year_count("a/", 2019), 3);
        assert!(loaded.aggregates.extensions().is_empty());
        assert!(loaded.aggregates.recent().is_empty());
        assert!(loaded.partitions.is_empty());
        assert_eq!(loaded.counting_mode, CountingMode::All);
        assert_eq!(loaded.recent_window_secs, None);
        assert!(loaded.matches(&ScanConfig::default()));
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::tempdir().expect("temp dir");
        let file = CheckpointFile::new(dir.path().join("checkpoint.json"));
        let aggregates = AggregateStore::new();
        let cursor = ScanCursor::default();
        file.save(&snapshot(&aggregates, &cursor, &[]))
            .expect("save");

        file.clear().expect("first clear");
        file.clear().expect("second clear");
        assert!(!file.exists());
    }
}
