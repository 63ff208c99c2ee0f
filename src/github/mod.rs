//! GitHub implementation of the artifact source.
//!
//! - Asset listing goes through octocrab, paged, with exponential backoff on
//!   transient failures
//! - Text files (the change summary) are downloaded with reqwest; a 404 is
//!   "not there", not an error

mod client;
mod error;
mod retry;
mod source;

pub use client::GitHubClient;
pub use retry::{RetryConfig, retry_with_backoff};
pub use source::GitHubSource;
