//! # taskforest
//!
//! A personal task manager built around a forest of tasks nested up to three
//! levels deep.
//!
//! - [`tree`] holds the pure copy-on-write operations on the forest.
//! - [`view`] derives filtered, sorted and searched projections, and auto-archives
//!   fully completed roots.
//! - [`history`] keeps a bounded undo/redo list of snapshots.
//! - [`persist`] writes every change to a local cache and reconciles it with an
//!   optional external backup location.
//! - [`store::TaskStore`] ties them together and is the only writer.
//!
//! The `tf` binary is a thin command line wrapper around the store.

pub mod config;
pub mod directory;
pub mod error;
pub mod fields;
pub mod history;
pub mod logging;
pub mod persist;
pub mod recurrence;
pub mod store;
pub mod task;
pub mod transfer;
pub mod tree;
pub mod view;

pub use config::Config;
pub use error::{Result, StoreError};
pub use store::TaskStore;
pub use task::Task;
