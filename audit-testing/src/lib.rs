// SPDX-License-Identifier: GPL-3.0-only

//! Test support for bucket-audit: an in-memory object store with scripted
//! failures and call logging, plus shared fixtures.

pub mod fixtures;
pub mod memory;

pub use memory::{MemoryObjectStore, PageCall};
