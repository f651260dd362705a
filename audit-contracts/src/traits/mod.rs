// SPDX-License-Identifier: GPL-3.0-only

pub mod listing;

pub use listing::ObjectLister;
