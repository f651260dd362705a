// SPDX-License-Identifier: GPL-3.0-only

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use audit_contracts::{ListingError, ListingErrorKind, ObjectLister};
use audit_types::{ObjectPage, ObjectRecord, PageRequest};

const TOKEN_PREFIX: &str = "after:";

/// A logged `list_objects_page` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCall {
    pub prefix: String,
    pub delimited: bool,
    pub continuation_token: Option<String>,
}

#[derive(Debug, Default)]
struct Script {
    /// 1-based page request numbers that fail once.
    failing_pages: BTreeSet<u64>,
    fail_prefix_listings: bool,
    cancel_on_page: Option<(u64, CancellationToken)>,
}

#[derive(Debug, Default)]
struct Calls {
    pages: Vec<PageCall>,
    prefixes: Vec<String>,
}

/// Object store held in a sorted map, with S3-like listing semantics.
///
/// Continuation tokens are opaque to callers but stateless here (`after:<key>`),
/// so a fresh store with the same contents resumes a token issued by another
/// instance, the way a real bucket would across process restarts.
#[derive(Debug)]
pub struct MemoryObjectStore {
    objects: BTreeMap<String, ObjectRecord>,
    page_size: usize,
    script: Mutex<Script>,
    calls: Mutex<Calls>,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self {
            objects: BTreeMap::new(),
            page_size: 1_000,
            script: Mutex::default(),
            calls: Mutex::default(),
        }
    }
}

impl MemoryObjectStore {
    pub fn new<I>(objects: I) -> Self
    where
        I: IntoIterator<Item = ObjectRecord>,
    {
        let mut store = Self::default();
        store.extend(objects);
        store
    }

    pub fn extend<I>(&mut self, objects: I)
    where
        I: IntoIterator<Item = ObjectRecord>,
    {
        for object in objects {
            self.objects.insert(object.key.clone(), object);
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Makes the `nth` page request (1-based, counted across partitions) fail
    /// with a transport error. The request is still logged.
    pub fn fail_page_request(self, nth: u64) -> Self {
        self.script_mut().failing_pages.insert(nth);
        self
    }

    pub fn fail_prefix_listings(self) -> Self {
        self.script_mut().fail_prefix_listings = true;
        self
    }

    /// Cancels `token` while serving the `nth` page request, so the scanner
    /// sees the cancellation in the middle of that page.
    pub fn cancel_during_page(self, nth: u64, token: CancellationToken) -> Self {
        self.script_mut().cancel_on_page = Some((nth, token));
        self
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn page_calls(&self) -> Vec<PageCall> {
        self.calls_mut().pages.clone()
    }

    pub fn prefix_calls(&self) -> Vec<String> {
        self.calls_mut().prefixes.clone()
    }

    fn script_mut(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn calls_mut(&self) -> std::sync::MutexGuard<'_, Calls> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn keys_under<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a ObjectRecord> + 'a {
        self.objects
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .take_while(move |(key, _)| key.starts_with(prefix))
            .map(|(_, object)| object)
    }
}

fn decode_token(token: &str) -> Result<&str, ListingError> {
    token.strip_prefix(TOKEN_PREFIX).ok_or_else(|| {
        ListingError::new(
            ListingErrorKind::InvalidInput,
            format!("malformed continuation token {token:?}"),
        )
    })
}

#[async_trait]
impl ObjectLister for MemoryObjectStore {
    async fn list_child_prefixes(&self, prefix: &str) -> Result<Vec<String>, ListingError> {
        self.calls_mut().prefixes.push(prefix.to_string());

        if self.script_mut().fail_prefix_listings {
            return Err(ListingError::unavailable("prefix listing refused"));
        }

        let children: BTreeSet<String> = self
            .keys_under(prefix)
            .filter_map(|object| {
                let rest = &object.key[prefix.len()..];
                rest.find('/')
                    .map(|slash| format!("{prefix}{}", &rest[..=slash]))
            })
            .collect();

        Ok(children.into_iter().collect())
    }

    async fn list_objects_page(
        &self,
        request: PageRequest<'_>,
    ) -> Result<ObjectPage, ListingError> {
        let request_number = {
            let mut calls = self.calls_mut();
            calls.pages.push(PageCall {
                prefix: request.prefix.to_string(),
                delimited: request.delimited,
                continuation_token: request.continuation_token.map(str::to_string),
            });
            calls.pages.len() as u64
        };

        {
            let mut script = self.script_mut();
            if script.failing_pages.remove(&request_number) {
                tracing::debug!(request_number, "scripted page failure");
                return Err(ListingError::unavailable(format!(
                    "scripted failure on page request {request_number}"
                )));
            }
            if let Some((nth, token)) = &script.cancel_on_page
                && *nth == request_number
            {
                token.cancel();
            }
        }

        let after = request.continuation_token.map(decode_token).transpose()?;

        let mut matching = self
            .keys_under(request.prefix)
            .filter(|object| after.is_none_or(|after| object.key.as_str() > after))
            .filter(|object| {
                !request.delimited || !object.key[request.prefix.len()..].contains('/')
            });

        let page: Vec<ObjectRecord> = matching.by_ref().take(self.page_size).cloned().collect();
        let next_continuation_token = match (matching.next(), page.last()) {
            (Some(_), Some(last)) => Some(format!("{TOKEN_PREFIX}{}", last.key)),
            _ => None,
        };

        Ok(ObjectPage::new(page, next_continuation_token))
    }
}
