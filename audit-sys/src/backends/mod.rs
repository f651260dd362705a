// SPDX-License-Identifier: GPL-3.0-only

//! Listing backends implementing [`audit_contracts::ObjectLister`].

pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

pub use local::LocalDirectoryStore;
#[cfg(feature = "s3")]
pub use s3::S3ObjectStore;
