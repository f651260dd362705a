// SPDX-License-Identifier: GPL-3.0-only

//! Canonical data model for bucket auditing
//!
//! These types are shared by every layer of the stack:
//!
//! - **audit-contracts**: listing backends return [`ObjectPage`] values
//! - **audit-sys**: the scan engine folds records into an [`AggregateStore`]
//!   and persists it alongside a [`ScanCursor`]
//! - **report consumers**: render a finished [`ScanReport`]
//!
//! ## Folder keys
//!
//! Every folder key is a '/'-terminated key prefix (`invoices/2021/`). Objects
//! stored at the top of the namespace belong to [`ROOT_FOLDER`], which is the
//! empty string and renders as `(root)`.

pub mod aggregate;
pub mod cursor;
pub mod partition;
pub mod record;
pub mod report;
pub mod status;

pub use aggregate::{
    AggregateStore, NO_EXTENSION, NestedCounter, ROOT_FOLDER, ROOT_LABEL, display_folder,
};
pub use cursor::ScanCursor;
pub use partition::{Partition, PartitionScope};
pub use record::{ObjectPage, ObjectRecord, PageRequest};
pub use report::ScanReport;
pub use status::ScanStatus;
