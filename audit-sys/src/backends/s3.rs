// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Error;
use chrono::{DateTime, Utc};

use audit_contracts::{ListingError, ListingErrorKind, ObjectLister};
use audit_types::{ObjectPage, ObjectRecord, PageRequest};

/// S3 caps a single listing at this many keys.
pub const S3_MAX_KEYS: i32 = 1_000;

/// `list_objects_v2` over one bucket. Credentials and region come from the
/// default provider chain.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    page_size: i32,
}

impl S3ObjectStore {
    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::with_client(Client::new(&config), bucket)
    }

    pub fn with_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            page_size: S3_MAX_KEYS,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = i32::try_from(page_size).unwrap_or(S3_MAX_KEYS).clamp(1, S3_MAX_KEYS);
        self
    }
}

fn listing_error(error: SdkError<ListObjectsV2Error, HttpResponse>) -> ListingError {
    let status = error.raw_response().map(|response| response.status().as_u16());
    let kind = match (&error, status) {
        (SdkError::TimeoutError(_), _) => ListingErrorKind::Timeout,
        (SdkError::DispatchFailure(_), _) => ListingErrorKind::Unavailable,
        (SdkError::ServiceError(service), _) if service.err().is_no_such_bucket() => {
            ListingErrorKind::NotFound
        }
        (_, Some(401 | 403)) => ListingErrorKind::PermissionDenied,
        (_, Some(404)) => ListingErrorKind::NotFound,
        (_, Some(429 | 503)) => ListingErrorKind::Throttled,
        (_, Some(500..=599)) => ListingErrorKind::Unavailable,
        _ => ListingErrorKind::Internal,
    };

    ListingError::new(kind, format!("list_objects_v2 failed: {}", DisplayErrorContext(&error)))
}

fn to_utc(timestamp: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}

#[async_trait]
impl ObjectLister for S3ObjectStore {
    async fn list_child_prefixes(&self, prefix: &str) -> Result<Vec<String>, ListingError> {
        let mut children = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .delimiter("/")
                .max_keys(self.page_size);
            if !prefix.is_empty() {
                request = request.prefix(prefix);
            }
            if let Some(token) = token.as_deref() {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(listing_error)?;
            children.extend(
                response
                    .common_prefixes()
                    .iter()
                    .filter_map(|common| common.prefix())
                    .map(str::to_string),
            );

            token = response
                .next_continuation_token()
                .filter(|_| response.is_truncated().unwrap_or(false))
                .map(str::to_string);
            if token.is_none() {
                break;
            }
        }

        children.sort();
        children.dedup();
        tracing::debug!(prefix, count = children.len(), "listed child prefixes");
        Ok(children)
    }

    async fn list_objects_page(
        &self,
        request: PageRequest<'_>,
    ) -> Result<ObjectPage, ListingError> {
        let mut call = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(self.page_size);
        if !request.prefix.is_empty() {
            call = call.prefix(request.prefix);
        }
        if request.delimited {
            call = call.delimiter("/");
        }
        if let Some(token) = request.continuation_token {
            call = call.continuation_token(token);
        }

        let response = call.send().await.map_err(listing_error)?;

        let objects = response
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?;
                Some(ObjectRecord {
                    key: key.to_string(),
                    last_modified: object.last_modified().and_then(to_utc),
                    size: object.size().and_then(|size| u64::try_from(size).ok()).unwrap_or(0),
                })
            })
            .collect();

        let next_continuation_token = response
            .next_continuation_token()
            .filter(|_| response.is_truncated().unwrap_or(false))
            .map(str::to_string);

        Ok(ObjectPage::new(objects, next_continuation_token))
    }
}
