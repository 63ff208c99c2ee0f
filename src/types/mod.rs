//! Core domain types for the release watcher.

pub mod artifact;
pub mod ids;

pub use artifact::{ArtifactRole, MatchedArtifact, ReleaseAsset, ReleaseCompletionRecord};
pub use ids::{InvalidRepoId, ReleaseId, RepoId};
