//! Release watcher - publishes nightly releases to the project site once
//! every platform artifact has been uploaded.
//!
//! This library provides the watcher, the shared configuration cells it
//! writes, and the HTTP surface that feeds it.

pub mod cells;
pub mod config;
pub mod github;
pub mod persistence;
pub mod server;
pub mod site;
pub mod source;
pub mod store;
pub mod types;
pub mod watcher;
pub mod webhooks;

#[cfg(test)]
pub(crate) mod test_utils;
