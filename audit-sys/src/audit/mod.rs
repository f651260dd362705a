// SPDX-License-Identifier: GPL-3.0-only

pub mod checkpoint;
pub mod classifier;
pub mod error;
pub mod partitioner;
pub mod progress;
pub mod scanner;
pub mod types;

pub use checkpoint::{CHECKPOINT_VERSION, CheckpointFile, CheckpointRecord, CheckpointSnapshot};
pub use classifier::{ObjectKind, ancestor_chain, classify, extension_of, logical_folder};
pub use error::{CheckpointError, ObjectError};
pub use partitioner::{PartitionPlan, plan_partitions};
pub use progress::{ThroughputMeter, format_bytes, format_duration};
pub use scanner::Scanner;
pub use types::{CountingMode, ScanConfig};
