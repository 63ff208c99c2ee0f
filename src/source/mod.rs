//! The artifact source: where published release assets are listed.
//!
//! The watcher only needs two capabilities from the hosting service, so they
//! are expressed as a trait and injected. The GitHub implementation lives in
//! [`crate::github`]; tests use a scripted double.

use std::future::Future;

use crate::types::{ReleaseAsset, ReleaseId};

mod error;

pub use error::{SourceError, SourceErrorKind, classify};

/// Lists release assets and fetches small text resources.
pub trait ArtifactSource: Send + Sync + 'static {
    /// Returns every asset currently attached to `release`.
    fn list_assets(
        &self,
        release: ReleaseId,
    ) -> impl Future<Output = Result<Vec<ReleaseAsset>, SourceError>> + Send;

    /// Fetches a text resource. Returns `Ok(None)` if it does not exist (404).
    fn fetch_text(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Option<String>, SourceError>> + Send;
}
