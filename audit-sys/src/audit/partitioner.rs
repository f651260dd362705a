// SPDX-License-Identifier: GPL-3.0-only

use audit_contracts::{ListingError, ObjectLister};
use audit_types::Partition;

/// Ordered scan targets plus the listing work it took to find them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    pub partitions: Vec<Partition>,
    pub listing_calls: usize,
    pub drill_downs: usize,
}

/// Splits `root` into independently scannable partitions.
///
/// Each immediate child prefix becomes a recursive partition unless it is the
/// excluded prefix (dropped) or an ancestor of it. Ancestors are drilled into:
/// their children go through the same rules, and a direct partition keeps the
/// objects that sit immediately inside the ancestor. Drilling continues as
/// deep as the excluded prefix goes, one listing call per level.
///
/// A root without child prefixes is scanned as a single recursive partition.
/// Otherwise a direct partition for the root covers top-level objects.
pub async fn plan_partitions<L: ObjectLister + ?Sized>(
    lister: &L,
    root: &str,
    excluded: Option<&str>,
) -> Result<PartitionPlan, ListingError> {
    let mut listing_calls = 1;
    let mut drill_downs = 0;
    let children = lister.list_child_prefixes(root).await?;

    if children.is_empty() {
        tracing::info!(root, "no child prefixes, scanning root as one partition");
        return Ok(PartitionPlan {
            partitions: vec![Partition::recursive(root)],
            listing_calls,
            drill_downs,
        });
    }

    let mut partitions = vec![Partition::direct(root)];
    let mut pending = children;

    while let Some(child) = pending.pop() {
        match excluded {
            Some(excluded) if child == excluded => {
                tracing::info!(prefix = %child, "skipping excluded prefix");
            }
            Some(excluded) if child.starts_with(excluded) => {
                tracing::info!(prefix = %child, "skipping prefix below excluded prefix");
            }
            Some(excluded) if excluded.starts_with(child.as_str()) => {
                tracing::info!(prefix = %child, excluded, "prefix contains excluded target, drilling down");
                let grandchildren = lister.list_child_prefixes(&child).await?;
                listing_calls += 1;
                drill_downs += 1;
                pending.extend(grandchildren);
                partitions.push(Partition::direct(child));
            }
            _ => partitions.push(Partition::recursive(child)),
        }
    }

    partitions.sort();
    partitions.dedup();

    tracing::info!(
        partitions = partitions.len(),
        listing_calls,
        drill_downs,
        "partition plan ready"
    );

    Ok(PartitionPlan {
        partitions,
        listing_calls,
        drill_downs,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use audit_types::{ObjectPage, PageRequest};

    use super::*;

    #[derive(Default)]
    struct PrefixTree {
        children: BTreeMap<String, Vec<String>>,
        calls: Mutex<Vec<String>>,
    }

    impl PrefixTree {
        fn with(mut self, prefix: &str, children: &[&str]) -> Self {
            self.children.insert(
                prefix.to_string(),
                children.iter().map(|child| child.to_string()).collect(),
            );
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl ObjectLister for PrefixTree {
        async fn list_child_prefixes(&self, prefix: &str) -> Result<Vec<String>, ListingError> {
            self.calls.lock().expect("calls lock").push(prefix.to_string());
            Ok(self.children.get(prefix).cloned().unwrap_or_default())
        }

        async fn list_objects_page(
            &self,
            _request: PageRequest<'_>,
        ) -> Result<ObjectPage, ListingError> {
            Ok(ObjectPage::default())
        }
    }

    #[tokio::test]
    async fn flat_namespace_degenerates_to_root() {
        let tree = PrefixTree::default();
        let plan = plan_partitions(&tree, "logs/", None).await.expect("plan");
        assert_eq!(plan.partitions, vec![Partition::recursive("logs/")]);
        assert_eq!(plan.listing_calls, 1);
    }

    #[tokio::test]
    async fn exact_match_is_dropped_without_drilling() {
        let tree = PrefixTree::default().with("", &["a/", "b/", "c/"]);
        let plan = plan_partitions(&tree, "", Some("b/")).await.expect("plan");
        assert_eq!(
            plan.partitions,
            vec![
                Partition::direct(""),
                Partition::recursive("a/"),
                Partition::recursive("c/"),
            ]
        );
        assert_eq!(plan.drill_downs, 0);
        assert_eq!(tree.calls(), vec!["".to_string()]);
    }

    #[tokio::test]
    async fn nested_exclusion_drills_once_and_keeps_siblings() {
        let tree = PrefixTree::default()
            .with("", &["A/", "C/"])
            .with("A/", &["A/B/", "A/D/"]);
        let plan = plan_partitions(&tree, "", Some("A/B/")).await.expect("plan");

        assert_eq!(plan.drill_downs, 1);
        assert_eq!(tree.calls(), vec!["".to_string(), "A/".to_string()]);
        assert_eq!(
            plan.partitions,
            vec![
                Partition::direct(""),
                Partition::direct("A/"),
                Partition::recursive("A/D/"),
                Partition::recursive("C/"),
            ]
        );
    }

    #[tokio::test]
    async fn deeper_exclusion_keeps_drilling() {
        let tree = PrefixTree::default()
            .with("", &["A/"])
            .with("A/", &["A/B/", "A/E/"])
            .with("A/B/", &["A/B/C/", "A/B/F/"]);
        let plan = plan_partitions(&tree, "", Some("A/B/C/")).await.expect("plan");

        assert_eq!(plan.drill_downs, 2);
        assert_eq!(
            plan.partitions,
            vec![
                Partition::direct(""),
                Partition::direct("A/"),
                Partition::direct("A/B/"),
                Partition::recursive("A/B/F/"),
                Partition::recursive("A/E/"),
            ]
        );
    }
}
