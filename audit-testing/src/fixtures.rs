// SPDX-License-Identifier: GPL-3.0-only

use std::path::Path;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use audit_sys::ScanConfig;
use audit_types::ObjectRecord;

/// Fixed "now" used by every scenario so recency is deterministic.
pub fn reference_time() -> DateTime<Utc> {
    at(2024, 6, 1)
}

pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// A real object modified mid-year.
pub fn file(key: &str, year: i32) -> ObjectRecord {
    ObjectRecord::new(key, at(year, 6, 15), 100)
}

/// A real object modified `days` before the reference time.
pub fn file_days_old(key: &str, days: i64) -> ObjectRecord {
    ObjectRecord::new(key, reference_time() - TimeDelta::days(days), 100)
}

pub fn marker(key: &str) -> ObjectRecord {
    ObjectRecord::without_timestamp(key, 0)
}

/// Scan settings with the checkpoint inside `dir` and a pinned reference time.
pub fn scan_config(dir: &Path) -> ScanConfig {
    ScanConfig {
        checkpoint_path: dir.join("checkpoint.json"),
        reference_time: Some(reference_time()),
        ..ScanConfig::default()
    }
}

/// Many small folders at several depths, with a few objects per folder.
pub fn sample_tree() -> Vec<ObjectRecord> {
    let mut objects = vec![
        file("readme.md", 2019),
        marker("archive/"),
        marker("empty/"),
        file_days_old("inbox/today.eml", 1),
        file_days_old("inbox/last-week.eml", 7),
    ];

    for client in ["acme", "globex", "initech"] {
        for (year, count) in [(2020, 2), (2021, 3), (2022, 1)] {
            for index in 0..count {
                objects.push(file(
                    &format!("clients/{client}/{year}/doc-{index}.pdf"),
                    year,
                ));
            }
        }
        objects.push(file(&format!("clients/{client}/notes.TXT"), 2023));
        objects.push(marker(&format!("clients/{client}/drafts/")));
    }

    objects.push(file("clients/index.csv", 2023));
    objects.push(file("tmp/scratch/a.bin", 2024));
    objects.push(file("tmp/b.bin", 2024));
    objects
}
