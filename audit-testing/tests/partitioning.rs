use audit_sys::Scanner;
use audit_sys::audit::plan_partitions;
use audit_testing::MemoryObjectStore;
use audit_testing::fixtures::{file, scan_config};
use audit_types::{Partition, ScanStatus};

fn nested_store() -> MemoryObjectStore {
    MemoryObjectStore::new([
        file("root.txt", 2020),
        file("A/direct.txt", 2020),
        file("A/B/skip.txt", 2021),
        file("A/B/deep/skip.txt", 2021),
        file("A/D/keep.txt", 2022),
        file("A/Bz/keep.txt", 2022),
        file("C/keep.txt", 2023),
    ])
}

#[tokio::test]
async fn nested_exclusion_costs_one_drill_down() {
    let store = nested_store();

    let plan = plan_partitions(&store, "", Some("A/B/")).await.unwrap();

    assert_eq!(plan.drill_downs, 1);
    assert_eq!(plan.listing_calls, 2);
    assert_eq!(store.prefix_calls(), vec!["", "A/"]);
    assert_eq!(
        plan.partitions,
        vec![
            Partition::direct(""),
            Partition::direct("A/"),
            Partition::recursive("A/Bz/"),
            Partition::recursive("A/D/"),
            Partition::recursive("C/"),
        ]
    );
}

#[tokio::test]
async fn only_the_excluded_leaf_is_omitted() {
    let dir = tempfile::tempdir().unwrap();
    let config = audit_sys::ScanConfig {
        excluded_prefix: Some("A/B/".to_string()),
        ..scan_config(dir.path())
    };

    let report = Scanner::new(nested_store(), config).run().await;
    let aggregates = &report.aggregates;

    assert!(report.status.is_success());
    assert_eq!(report.objects_processed, 5);
    for folder in ["", "A/", "A/D/", "A/Bz/", "C/"] {
        assert_eq!(aggregates.folder_total(folder), 1, "folder {folder:?}");
    }
    assert!(aggregates.known_paths().iter().all(|path| !path.starts_with("A/B/")));
}

#[tokio::test]
async fn scoped_root_drills_as_deep_as_needed() {
    let store = MemoryObjectStore::new([
        file("data/x/y/z/skip.bin", 2020),
        file("data/x/y/keep.bin", 2020),
        file("data/x/w/keep.bin", 2020),
        file("data/v/keep.bin", 2020),
    ]);

    let plan = plan_partitions(&store, "data/", Some("data/x/y/z/"))
        .await
        .unwrap();

    assert_eq!(plan.drill_downs, 2);
    assert_eq!(
        plan.partitions,
        vec![
            Partition::direct("data/"),
            Partition::recursive("data/v/"),
            Partition::direct("data/x/"),
            Partition::recursive("data/x/w/"),
            Partition::direct("data/x/y/"),
        ]
    );
}

#[tokio::test]
async fn flat_root_is_one_partition() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryObjectStore::new([file("a.txt", 2020), file("b.txt", 2021)]);

    let report = Scanner::new(store, scan_config(dir.path())).run().await;

    assert_eq!(report.partitions, vec![Partition::recursive("")]);
    assert_eq!(report.objects_processed, 2);
}

#[tokio::test]
async fn resumed_run_keeps_the_stored_partition_list() {
    let dir = tempfile::tempdir().unwrap();
    let limited = audit_sys::ScanConfig {
        max_requests: 1,
        ..scan_config(dir.path())
    };
    let first = Scanner::new(nested_store(), limited).run().await;
    assert!(matches!(first.status, ScanStatus::LimitReached { .. }));

    let mut grown = nested_store();
    grown.extend([file("E/new.txt", 2024)]);
    let second = Scanner::new(grown, scan_config(dir.path())).run().await;

    assert!(second.status.is_success());
    assert_eq!(second.partitions, first.partitions);
    assert!(!second.aggregates.known_paths().contains("E/"));
}
