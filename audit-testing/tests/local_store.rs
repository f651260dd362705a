use std::fs::{self, File};
use std::path::Path;
use std::time::SystemTime;

use chrono::Utc;

use audit_sys::Scanner;
use audit_sys::backends::LocalDirectoryStore;
use audit_sys::report::{ReportOptions, write_reports};
use audit_testing::fixtures::{at, scan_config};
use audit_types::Partition;

fn write_file(root: &Path, key: &str, modified: SystemTime) {
    let path = root.join(key);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, key.as_bytes()).unwrap();
    File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(modified)
        .unwrap();
}

fn bucket_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let old = SystemTime::from(at(2021, 3, 1));
    let recent = SystemTime::from(at(2024, 5, 30));

    write_file(dir.path(), "a.txt", old);
    write_file(dir.path(), "docs/x.pdf", old);
    write_file(dir.path(), "docs/y.pdf", recent);
    write_file(dir.path(), "docs/private/secret.txt", old);
    write_file(dir.path(), "media/2024/clip.mp4", recent);
    fs::create_dir_all(dir.path().join("empty")).unwrap();
    dir
}

#[tokio::test]
async fn scans_a_directory_tree_and_writes_reports() {
    let bucket = bucket_dir();
    let state = tempfile::tempdir().unwrap();
    let config = audit_sys::ScanConfig {
        excluded_prefix: Some("docs/private/".to_string()),
        ..scan_config(state.path())
    };
    let store = LocalDirectoryStore::new(bucket.path()).with_page_size(2);

    let report = Scanner::new(store, config).run().await;
    let aggregates = &report.aggregates;

    assert!(report.status.is_success());
    assert_eq!(
        report.partitions,
        vec![
            Partition::direct(""),
            Partition::direct("docs/"),
            Partition::recursive("empty/"),
            Partition::recursive("media/"),
        ]
    );
    assert_eq!(report.objects_processed, 4);
    assert_eq!(aggregates.markers(), 1);
    assert_eq!(aggregates.year_count("", 2021), 1);
    assert_eq!(aggregates.year_count("docs/", 2021), 1);
    assert_eq!(aggregates.year_count("docs/", 2024), 1);
    assert_eq!(aggregates.recent_count("docs/"), 1);
    assert_eq!(aggregates.recent_count("media/2024/"), 1);
    assert_eq!(aggregates.extension_count("docs/", ".pdf"), 2);
    assert!(aggregates.known_paths().contains("empty/"));
    assert!(aggregates.known_paths().contains("media/"));
    assert!(!aggregates.known_paths().contains("docs/private/"));

    let output = state.path().join("reports");
    let options = ReportOptions {
        source: "local test tree",
        generated_at: Utc::now(),
        rows_per_part: 100,
        recent_days: 30,
    };
    let written = write_reports(&output, &report, &options).unwrap();

    assert_eq!(written.len(), 2);
    let years = fs::read_to_string(output.join("bucket-audit-years.md")).unwrap();
    assert!(years.contains("docs/"));
    assert!(years.contains("Empty folder."));
    assert!(!years.contains("secret"));
    let recent = fs::read_to_string(output.join("bucket-audit-recent.md")).unwrap();
    assert!(recent.contains(".mp4"));
}
