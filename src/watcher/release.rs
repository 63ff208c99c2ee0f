//! The release completion watcher.
//!
//! # State Machine
//!
//! ```text
//!   Unclaimed ──watch──► Claimed & Waiting ──timer──► Checking
//!                              ▲                          │
//!                              └──── incomplete/failed ───┤
//!                                                         ▼
//!                                                     Finalized
//! ```
//!
//! The per-release lock (`processing_<id>`) is the only thing that decides
//! which worker watches a release. Once claimed, the owning worker re-arms
//! its own timer until the release is complete and never claims again.
//! Finalization is guarded by membership in `release_ids`, so a second
//! completed check writes nothing.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::config::WatchConfig;
use super::scheduler::Scheduler;
use crate::cells::{
    CellError, CellStore, LATEST_RELEASE, LATEST_RELEASE_DATE, PR_SUMMARY, RELEASE_IDS,
};
use crate::source::ArtifactSource;
use crate::store::{KeyedStore, StoreError};
use crate::types::{ArtifactRole, ReleaseCompletionRecord, ReleaseId};

/// Value stored under a claimed lock key.
const LOCK_VALUE: &str = "1";

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cell(#[from] CellError),
}

impl WatchError {
    /// True if the keyed store could not be reached, as opposed to a bad
    /// value.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            WatchError::Store(_) | WatchError::Cell(CellError::Store(_))
        )
    }
}

/// Result of [`ReleaseWatcher::watch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// This worker claimed the release and armed a check.
    Scheduled,
    /// Another worker (or an earlier call) already owns the release.
    AlreadyClaimed,
}

/// Result of one completion check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Some artifacts are not published yet.
    Incomplete { missing: Vec<ArtifactRole> },
    /// The listing or a cell write failed; nothing was finalized.
    Failed,
    /// The site cells now point at `version`.
    Finalized { version: String },
    /// The release was no longer pending; nothing was written.
    AlreadyFinalized,
}

impl CheckOutcome {
    /// True if another check should be armed.
    pub fn needs_retry(&self) -> bool {
        matches!(self, CheckOutcome::Incomplete { .. } | CheckOutcome::Failed)
    }
}

struct Inner<S, A> {
    cells: CellStore<S>,
    source: A,
    scheduler: Arc<dyn Scheduler>,
    config: WatchConfig,
}

/// Watches announced releases until all their artifacts are published, then
/// points the site at the new version.
pub struct ReleaseWatcher<S, A> {
    inner: Arc<Inner<S, A>>,
}

impl<S, A> Clone for ReleaseWatcher<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, A> std::fmt::Debug for ReleaseWatcher<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseWatcher")
            .field("config", &self.inner.config)
            .field("scheduler", &self.inner.scheduler)
            .finish_non_exhaustive()
    }
}

impl<S: KeyedStore, A: ArtifactSource> ReleaseWatcher<S, A> {
    pub fn new(
        cells: CellStore<S>,
        source: A,
        scheduler: Arc<dyn Scheduler>,
        config: WatchConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cells,
                source,
                scheduler,
                config,
            }),
        }
    }

    pub fn cells(&self) -> &CellStore<S> {
        &self.inner.cells
    }

    pub fn config(&self) -> &WatchConfig {
        &self.inner.config
    }

    /// Claims `id` and arms its first check after `delay`.
    ///
    /// At most one caller across all workers wins the claim; everyone else
    /// gets [`WatchOutcome::AlreadyClaimed`] and nothing is scheduled.
    pub async fn watch(&self, id: ReleaseId, delay: Duration) -> Result<WatchOutcome, WatchError> {
        let claimed = self
            .inner
            .cells
            .store()
            .set_if_absent(&id.lock_key(), LOCK_VALUE, None)
            .await?;
        if !claimed {
            debug!(release_id = %id, "release already claimed");
            return Ok(WatchOutcome::AlreadyClaimed);
        }

        info!(
            release_id = %id,
            delay_secs = delay.as_secs(),
            "claimed release; scheduling completion check"
        );
        self.arm(id, delay);
        Ok(WatchOutcome::Scheduled)
    }

    /// Schedules one check. A check that does not finish the release arms
    /// the next one itself; the lock stays with this worker throughout.
    fn arm(&self, id: ReleaseId, delay: Duration) {
        let watcher = self.clone();
        self.inner.scheduler.schedule(
            delay,
            Box::pin(async move {
                if watcher.check(id).await.needs_retry() {
                    let backoff = watcher.inner.config.retry_backoff;
                    debug!(release_id = %id, backoff_secs = backoff.as_secs(), "re-arming check");
                    watcher.arm(id, backoff);
                }
            }),
        );
    }

    /// Runs one completion check for `id`.
    #[instrument(skip(self), fields(release_id = %id))]
    pub async fn check(&self, id: ReleaseId) -> CheckOutcome {
        let assets = match self.inner.source.list_assets(id).await {
            Ok(assets) => assets,
            Err(e) => {
                warn!(error = %e, "cannot list release assets");
                return CheckOutcome::Failed;
            }
        };

        let record = ReleaseCompletionRecord::from_assets(&assets);
        if !record.is_complete() {
            let missing = record.missing();
            let labels: Vec<_> = missing.iter().map(|r| r.label()).collect();
            info!(missing = ?labels, "release incomplete");
            return CheckOutcome::Incomplete { missing };
        }

        self.finalize(id, &record).await
    }

    /// Points the site at the release described by `record`.
    ///
    /// Does nothing if `id` is no longer pending. A store failure leaves the
    /// release pending so the next check finishes the job.
    pub async fn finalize(&self, id: ReleaseId, record: &ReleaseCompletionRecord) -> CheckOutcome {
        match self.try_finalize(id, record).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(release_id = %id, error = %e, "finalization failed");
                CheckOutcome::Failed
            }
        }
    }

    async fn try_finalize(
        &self,
        id: ReleaseId,
        record: &ReleaseCompletionRecord,
    ) -> Result<CheckOutcome, CellError> {
        let cells = &self.inner.cells;

        let pending = cells.read(&RELEASE_IDS).await?.unwrap_or_default();
        if !pending.contains(&id) {
            debug!(release_id = %id, "release no longer pending");
            return Ok(CheckOutcome::AlreadyFinalized);
        }

        let Some(version) = record.version().map(str::to_owned) else {
            warn!(release_id = %id, "complete release has no version");
            return Ok(CheckOutcome::Failed);
        };

        let summary = self.change_summary(&version).await;
        let date = Local::now().format("%Y-%m-%d").to_string();

        cells.write(&LATEST_RELEASE, &version).await?;
        cells.write(&LATEST_RELEASE_DATE, &date).await?;
        cells.write(&PR_SUMMARY, &summary).await?;

        // Removing the id last keeps the release pending until every site
        // cell has been written.
        let remaining: Vec<ReleaseId> = cells
            .read(&RELEASE_IDS)
            .await?
            .unwrap_or_default()
            .into_iter()
            .filter(|pending| *pending != id)
            .collect();
        cells.write(&RELEASE_IDS, &remaining).await?;

        info!(release_id = %id, version = %version, "site updated to new release");
        Ok(CheckOutcome::Finalized { version })
    }

    /// Builds the `<li>` list of change titles for `version` and the builds
    /// before it.
    ///
    /// Only `major.minor.build` versions have a summary. A build whose title
    /// cannot be fetched is skipped.
    pub async fn change_summary(&self, version: &str) -> String {
        let Some((major, minor, build)) = parse_build_version(version) else {
            debug!(version, "version has no build number; empty summary");
            return String::new();
        };

        let mut summary = String::new();
        for offset in 0..u64::from(self.inner.config.summary_count) {
            let Some(number) = build.checked_sub(offset) else {
                break;
            };
            let url = self
                .inner
                .config
                .summary_url(&format!("{major}.{minor}.{number}"));
            match self.inner.source.fetch_text(&url).await {
                Ok(Some(title)) if !title.trim().is_empty() => {
                    summary.push_str("<li>");
                    summary.push_str(&escape_html(title.trim()));
                    summary.push_str("</li>");
                }
                Ok(_) => debug!(build = number, "no change title"),
                Err(e) => debug!(build = number, error = %e, "cannot fetch change title"),
            }
        }
        summary
    }

    /// Adds `id` to the pending set.
    ///
    /// Returns `false` if it is already pending or was already finalized. A
    /// release whose lock is held but which is no longer pending has been
    /// finalized, since locks are only cleared for pending releases.
    pub async fn register(&self, id: ReleaseId) -> Result<bool, WatchError> {
        let cells = &self.inner.cells;
        let mut pending = cells.read(&RELEASE_IDS).await?.unwrap_or_default();
        if pending.contains(&id) {
            debug!(release_id = %id, "release already pending");
            return Ok(false);
        }
        if cells.store().get(&id.lock_key()).await?.is_some() {
            info!(release_id = %id, "release already finalized; not registering again");
            return Ok(false);
        }
        pending.push(id);
        cells.write(&RELEASE_IDS, &pending).await?;
        info!(release_id = %id, "release registered");
        Ok(true)
    }

    /// Releases currently waiting for artifacts.
    pub async fn pending(&self) -> Result<Vec<ReleaseId>, WatchError> {
        Ok(self.inner.cells.read(&RELEASE_IDS).await?.unwrap_or_default())
    }
}

fn parse_build_version(version: &str) -> Option<(u64, u64, u64)> {
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let build = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((major, minor, build))
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_versions_parse() {
        assert_eq!(parse_build_version("6.0.5217"), Some((6, 0, 5217)));
        assert_eq!(parse_build_version("6.0"), None);
        assert_eq!(parse_build_version("6.0.5217.1"), None);
        assert_eq!(parse_build_version("6.0.beta"), None);
        assert_eq!(parse_build_version(""), None);
    }

    #[test]
    fn titles_are_escaped() {
        assert_eq!(escape_html("Fix <b> & \"quotes\""), "Fix &lt;b&gt; &amp; &quot;quotes&quot;");
        assert_eq!(escape_html("plain title"), "plain title");
    }
}
