//! Startup recovery of releases that were pending when workers stopped.
//!
//! Scheduled checks live only in memory, so a restart loses them while
//! their locks survive in the store. On startup one worker is elected to
//! clear those locks and watch every pending release again.

use tracing::{info, warn};

use super::release::{ReleaseWatcher, WatchError, WatchOutcome};
use crate::source::ArtifactSource;
use crate::store::KeyedStore;
use crate::types::ReleaseId;

/// Key of the recovery election. Expires so a later restart can elect again.
pub const ELECTION_KEY: &str = "processReleaseIds";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Another worker won the election.
    NotLeader,
    /// This worker re-armed checks for `rearmed` of the `pending` releases;
    /// `failed` of them hit a store error and stay pending.
    Recovered {
        pending: usize,
        rearmed: usize,
        failed: usize,
    },
}

/// Re-arms checks for every pending release if this worker wins the
/// election.
///
/// A store error for one release is logged and the rest are still
/// recovered. Only a failed election or pending-set read is returned.
pub async fn recover_pending<S: KeyedStore, A: ArtifactSource>(
    watcher: &ReleaseWatcher<S, A>,
) -> Result<RecoveryOutcome, WatchError> {
    let store = watcher.cells().store();
    let config = watcher.config();

    let candidate = std::process::id().to_string();
    let elected = store
        .set_if_absent(ELECTION_KEY, &candidate, Some(config.election_ttl))
        .await?;
    if !elected {
        info!("another worker is recovering pending releases");
        return Ok(RecoveryOutcome::NotLeader);
    }

    let pending = watcher.pending().await?;
    info!(count = pending.len(), "recovering pending releases");

    let mut rearmed = 0;
    let mut failed = 0;
    for &id in &pending {
        match rearm(watcher, id).await {
            Ok(WatchOutcome::Scheduled) => rearmed += 1,
            Ok(WatchOutcome::AlreadyClaimed) => {
                warn!(release_id = %id, "release claimed again before recovery could re-arm it")
            }
            Err(e) => {
                warn!(release_id = %id, error = %e, "cannot recover release");
                failed += 1;
            }
        }
    }

    Ok(RecoveryOutcome::Recovered {
        pending: pending.len(),
        rearmed,
        failed,
    })
}

async fn rearm<S: KeyedStore, A: ArtifactSource>(
    watcher: &ReleaseWatcher<S, A>,
    id: ReleaseId,
) -> Result<WatchOutcome, WatchError> {
    watcher.cells().store().delete(&id.lock_key()).await?;
    watcher.watch(id, watcher.config().recovery_delay).await
}
