// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use audit_contracts::{ListingError, ListingErrorKind, ObjectLister};
use audit_types::{ObjectPage, ObjectRecord, PageRequest};

pub const DEFAULT_LOCAL_PAGE_SIZE: usize = 1_000;

/// A local directory listed as if it were a bucket.
///
/// Keys are '/'-joined paths relative to the root. Empty directories show up
/// as marker keys ending in '/'. Pages are cut from the sorted key list and
/// the continuation token is the last key of the previous page, so listing
/// resumes correctly even if files were added in between.
///
/// Every page walks the requested prefix again; this backend is meant for
/// rehearsals and modest trees, not for millions of files.
#[derive(Debug, Clone)]
pub struct LocalDirectoryStore {
    root: PathBuf,
    page_size: usize,
}

impl LocalDirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: DEFAULT_LOCAL_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn dir_for(&self, prefix: &str) -> PathBuf {
        let mut dir = self.root.clone();
        dir.extend(prefix.split('/').filter(|part| !part.is_empty()));
        dir
    }
}

fn timestamp(metadata: &fs::Metadata) -> Option<DateTime<Utc>> {
    metadata.modified().ok().map(DateTime::<Utc>::from)
}

fn child_dirs(dir: &Path, prefix: &str) -> io::Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(error),
    };

    let mut children = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            children.push(format!("{prefix}{}/", entry.file_name().to_string_lossy()));
        }
    }
    children.sort();
    Ok(children)
}

/// Collects every object under `dir`, depth-first. When `delimited` is set
/// only regular files directly inside `dir` are returned. An empty directory
/// shows up as its own marker key, including the listed prefix itself.
fn collect_objects(dir: &Path, prefix: &str, delimited: bool) -> io::Result<Vec<ObjectRecord>> {
    let mut objects = Vec::new();
    let mut stack = vec![(dir.to_path_buf(), prefix.to_string())];

    while let Some((directory, key_prefix)) = stack.pop() {
        let entries = match fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => continue,
            Err(error) => return Err(error),
        };

        let mut empty = true;
        for entry in entries {
            let entry = entry?;
            empty = false;
            let name = entry.file_name().to_string_lossy().into_owned();
            let metadata = entry.metadata()?;

            if metadata.is_dir() {
                if !delimited {
                    stack.push((entry.path(), format!("{key_prefix}{name}/")));
                }
                continue;
            }

            if metadata.is_file() {
                objects.push(ObjectRecord {
                    key: format!("{key_prefix}{name}"),
                    last_modified: timestamp(&metadata),
                    size: metadata.len(),
                });
            }
        }

        if empty && !key_prefix.is_empty() {
            objects.push(ObjectRecord::without_timestamp(key_prefix, 0));
        }
    }

    objects.sort_by(|left, right| left.key.cmp(&right.key));
    Ok(objects)
}

fn cut_page(objects: Vec<ObjectRecord>, after: Option<&str>, page_size: usize) -> ObjectPage {
    let start = match after {
        Some(after) => objects.partition_point(|object| object.key.as_str() <= after),
        None => 0,
    };
    let end = (start + page_size).min(objects.len());
    let more = end < objects.len();

    let page: Vec<ObjectRecord> = objects.into_iter().skip(start).take(end - start).collect();
    let next_continuation_token = if more {
        page.last().map(|object| object.key.clone())
    } else {
        None
    };

    ObjectPage::new(page, next_continuation_token)
}

fn join_error(error: tokio::task::JoinError) -> ListingError {
    ListingError::new(
        ListingErrorKind::Internal,
        format!("listing task failed: {error}"),
    )
}

#[async_trait]
impl ObjectLister for LocalDirectoryStore {
    async fn list_child_prefixes(&self, prefix: &str) -> Result<Vec<String>, ListingError> {
        let dir = self.dir_for(prefix);
        let prefix = prefix.to_string();
        let children = tokio::task::spawn_blocking(move || child_dirs(&dir, &prefix))
            .await
            .map_err(join_error)??;
        tracing::debug!(count = children.len(), "listed local child prefixes");
        Ok(children)
    }

    async fn list_objects_page(
        &self,
        request: PageRequest<'_>,
    ) -> Result<ObjectPage, ListingError> {
        let dir = self.dir_for(request.prefix);
        let prefix = request.prefix.to_string();
        let after = request.continuation_token.map(str::to_string);
        let delimited = request.delimited;
        let page_size = self.page_size;

        tokio::task::spawn_blocking(move || {
            let objects = collect_objects(&dir, &prefix, delimited)?;
            Ok::<_, ListingError>(cut_page(objects, after.as_deref(), page_size))
        })
        .await
        .map_err(join_error)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = dir.path();
        fs::create_dir_all(root.join("a/deep")).expect("mkdir a/deep");
        fs::create_dir_all(root.join("b")).expect("mkdir b");
        fs::create_dir_all(root.join("empty")).expect("mkdir empty");
        fs::write(root.join("top.txt"), b"top").expect("write top");
        fs::write(root.join("a/one.pdf"), b"1").expect("write one");
        fs::write(root.join("a/deep/two.csv"), b"22").expect("write two");
        fs::write(root.join("b/three.txt"), b"333").expect("write three");
        dir
    }

    fn keys(page: &ObjectPage) -> Vec<&str> {
        page.objects.iter().map(|object| object.key.as_str()).collect()
    }

    #[tokio::test]
    async fn lists_child_prefixes_one_level() {
        let dir = tree();
        let store = LocalDirectoryStore::new(dir.path());

        let root = store.list_child_prefixes("").await.expect("root children");
        assert_eq!(root, vec!["a/", "b/", "empty/"]);

        let nested = store.list_child_prefixes("a/").await.expect("nested children");
        assert_eq!(nested, vec!["a/deep/"]);

        let missing = store.list_child_prefixes("nope/").await.expect("missing");
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn recursive_listing_includes_markers_for_empty_dirs() {
        let dir = tree();
        let store = LocalDirectoryStore::new(dir.path());

        let page = store
            .list_objects_page(PageRequest::recursive(""))
            .await
            .expect("page");

        assert_eq!(
            keys(&page),
            vec!["a/deep/two.csv", "a/one.pdf", "b/three.txt", "empty/", "top.txt"]
        );
        assert!(page.is_last());
        assert!(page.objects[0].last_modified.is_some());
        assert_eq!(page.objects[0].size, 2);
    }

    #[tokio::test]
    async fn empty_prefix_lists_its_own_marker() {
        let dir = tree();
        let store = LocalDirectoryStore::new(dir.path());

        let page = store
            .list_objects_page(PageRequest::recursive("empty/"))
            .await
            .expect("page");

        assert_eq!(keys(&page), vec!["empty/"]);
        assert!(page.objects[0].last_modified.is_none());
    }

    #[tokio::test]
    async fn direct_listing_skips_subfolders() {
        let dir = tree();
        let store = LocalDirectoryStore::new(dir.path());

        let root = store
            .list_objects_page(PageRequest::direct(""))
            .await
            .expect("root page");
        assert_eq!(keys(&root), vec!["top.txt"]);

        let nested = store
            .list_objects_page(PageRequest::direct("a/"))
            .await
            .expect("nested page");
        assert_eq!(keys(&nested), vec!["a/one.pdf"]);
    }

    #[tokio::test]
    async fn paginates_with_last_key_tokens() {
        let dir = tree();
        let store = LocalDirectoryStore::new(dir.path()).with_page_size(2);

        let first = store
            .list_objects_page(PageRequest::recursive(""))
            .await
            .expect("first page");
        assert_eq!(keys(&first), vec!["a/deep/two.csv", "a/one.pdf"]);
        let token = first.next_continuation_token.clone().expect("more pages");

        let second = store
            .list_objects_page(PageRequest::recursive("").resume_from(Some(&token)))
            .await
            .expect("second page");
        assert_eq!(keys(&second), vec!["b/three.txt", "empty/"]);

        let token = second.next_continuation_token.clone().expect("more pages");
        let third = store
            .list_objects_page(PageRequest::recursive("").resume_from(Some(&token)))
            .await
            .expect("third page");
        assert_eq!(keys(&third), vec!["top.txt"]);
        assert!(third.is_last());
    }
}
