// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use async_trait::async_trait;

use audit_types::{ObjectPage, PageRequest};

use crate::ListingError;

/// Read-only view of an object store, as the scanner consumes it.
#[async_trait]
pub trait ObjectLister: Send + Sync {
    /// Immediate child prefixes of `prefix` ('/'-terminated, sorted).
    ///
    /// This is a one-level listing: its cost does not depend on subtree size.
    async fn list_child_prefixes(&self, prefix: &str) -> Result<Vec<String>, ListingError>;

    /// One page of objects under `request.prefix`, in key order.
    async fn list_objects_page(
        &self,
        request: PageRequest<'_>,
    ) -> Result<ObjectPage, ListingError>;
}

#[async_trait]
impl<T: ObjectLister + ?Sized> ObjectLister for Arc<T> {
    async fn list_child_prefixes(&self, prefix: &str) -> Result<Vec<String>, ListingError> {
        (**self).list_child_prefixes(prefix).await
    }

    async fn list_objects_page(
        &self,
        request: PageRequest<'_>,
    ) -> Result<ObjectPage, ListingError> {
        (**self).list_objects_page(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit_types::ObjectRecord;

    struct SinglePage;

    #[async_trait]
    impl ObjectLister for SinglePage {
        async fn list_child_prefixes(&self, _prefix: &str) -> Result<Vec<String>, ListingError> {
            Ok(vec!["a/".to_string()])
        }

        async fn list_objects_page(
            &self,
            request: PageRequest<'_>,
        ) -> Result<ObjectPage, ListingError> {
            Ok(ObjectPage::new(
                vec![ObjectRecord::without_timestamp(
                    format!("{}x", request.prefix),
                    1,
                )],
                None,
            ))
        }
    }

    #[tokio::test]
    async fn shared_listers_forward_calls() {
        let lister: Arc<dyn ObjectLister> = Arc::new(SinglePage);
        let prefixes = lister.list_child_prefixes("").await.expect("prefixes");
        assert_eq!(prefixes, vec!["a/".to_string()]);

        let page = lister
            .list_objects_page(PageRequest::recursive("a/"))
            .await
            .expect("page");
        assert_eq!(page.objects[0].key, "a/x");
        assert!(page.is_last());
    }
}
