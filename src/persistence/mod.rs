//! Local persistence for the release watcher.
//!
//! The keyed store is the source of truth for shared state. This module only
//! keeps a crash-safe file mirror of the configuration cells so that a
//! flushed store can be repopulated on the next start.
//!
//! # Crash Safety
//!
//! - The mirror is rewritten atomically using write-to-temp-then-rename
//! - Both the temp file and the parent directory are fsynced

pub mod fsync;
pub mod mirror;

pub use fsync::{fsync_dir, fsync_file};
pub use mirror::{FileMirror, MirrorError};
