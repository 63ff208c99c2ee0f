//! Shared test utilities and arbitrary generators for property-based testing.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use tempfile::TempDir;

use crate::cells::CellStore;
use crate::persistence::FileMirror;
use crate::source::{ArtifactSource, SourceError};
use crate::store::{KeyedStore, MemoryStore, StoreError};
use crate::types::{ArtifactRole, ReleaseAsset, ReleaseId};

pub fn arb_release_id() -> impl Strategy<Value = ReleaseId> {
    any::<u64>().prop_map(ReleaseId)
}

/// Three-part numeric versions like the nightly builds use.
pub fn arb_version() -> impl Strategy<Value = String> {
    (0u32..20, 0u32..20, 0u32..100_000).prop_map(|(a, b, c)| format!("{a}.{b}.{c}"))
}

/// Download URL of `file` in the release tagged with `version`.
pub fn release_url(version: &str, file: &str) -> String {
    format!("https://github.com/subsurface/nightly-builds/releases/download/v{version}-CICD-release/{file}")
}

/// The four artifacts of a complete release, in `ArtifactRole::ALL` order.
pub fn complete_assets(version: &str) -> Vec<ReleaseAsset> {
    ArtifactRole::ALL
        .iter()
        .map(|role| ReleaseAsset::new(release_url(version, &role.file_name(version))))
        .collect()
}

/// A memory store in which every operation on a chosen key fails.
#[derive(Debug, Clone)]
pub struct FlakyStore {
    store: MemoryStore,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl FlakyStore {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            failing: Arc::default(),
        }
    }

    pub fn fail_key(&self, key: impl Into<String>) {
        self.failing.lock().unwrap().insert(key.into());
    }

    fn check(&self, key: &str) -> Result<(), StoreError> {
        if self.failing.lock().unwrap().contains(key) {
            return Err(StoreError::Unavailable(format!("{key} is failing")));
        }
        Ok(())
    }
}

impl KeyedStore for FlakyStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        expiry: Option<Duration>,
    ) -> Result<bool, StoreError> {
        self.check(key)?;
        self.store.set_if_absent(key, value, expiry).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check(key)?;
        self.store.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check(key)?;
        self.store.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check(key)?;
        self.store.delete(key).await
    }
}

/// Like [`memory_cells`], over a [`FlakyStore`].
pub fn flaky_cells() -> (CellStore<FlakyStore>, FlakyStore, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mirror = FileMirror::open(dir.path().join("site.env")).unwrap();
    let store = FlakyStore::new(MemoryStore::new());
    (CellStore::new(store.clone(), Arc::new(mirror)), store, dir)
}

/// A cell store over a fresh in-memory store and a mirror in a temp dir.
///
/// The `TempDir` must outlive the store.
pub fn memory_cells() -> (CellStore<MemoryStore>, MemoryStore, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mirror = FileMirror::open(dir.path().join("site.env")).unwrap();
    let store = MemoryStore::new();
    (CellStore::new(store.clone(), Arc::new(mirror)), store, dir)
}

enum Listing {
    Assets(Vec<ReleaseAsset>),
    Transient,
    Permanent,
}

#[derive(Default)]
struct FakeSourceInner {
    scripted: Mutex<VecDeque<Listing>>,
    assets: Mutex<Vec<ReleaseAsset>>,
    texts: Mutex<HashMap<String, String>>,
    failing_texts: Mutex<HashSet<String>>,
    list_calls: AtomicUsize,
    fetched: Mutex<Vec<String>>,
}

/// Scripted artifact source.
///
/// Listings come from the script first, then from the current asset list.
/// Text fetches return the registered text or `None`, or fail for URLs
/// marked with [`FakeSource::fail_text`].
#[derive(Clone, Default)]
pub struct FakeSource {
    inner: Arc<FakeSourceInner>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the listing returned once the script is exhausted.
    pub fn set_assets(&self, assets: Vec<ReleaseAsset>) {
        *self.inner.assets.lock().unwrap() = assets;
    }

    /// Queues one listing.
    pub fn push_assets(&self, assets: Vec<ReleaseAsset>) {
        self.inner.scripted.lock().unwrap().push_back(Listing::Assets(assets));
    }

    /// Queues one transient listing failure.
    pub fn push_transient_failure(&self) {
        self.inner.scripted.lock().unwrap().push_back(Listing::Transient);
    }

    /// Queues one permanent listing failure.
    pub fn push_permanent_failure(&self) {
        self.inner.scripted.lock().unwrap().push_back(Listing::Permanent);
    }

    pub fn set_text(&self, url: impl Into<String>, text: impl Into<String>) {
        self.inner.texts.lock().unwrap().insert(url.into(), text.into());
    }

    /// Makes every fetch of `url` fail with a transient error.
    pub fn fail_text(&self, url: impl Into<String>) {
        self.inner.failing_texts.lock().unwrap().insert(url.into());
    }

    pub fn list_calls(&self) -> usize {
        self.inner.list_calls.load(Ordering::SeqCst)
    }

    /// URLs passed to `fetch_text`, in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.inner.fetched.lock().unwrap().clone()
    }
}

impl ArtifactSource for FakeSource {
    async fn list_assets(&self, _release: ReleaseId) -> Result<Vec<ReleaseAsset>, SourceError> {
        self.inner.list_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.inner.scripted.lock().unwrap().pop_front();
        match next {
            Some(Listing::Assets(assets)) => Ok(assets),
            Some(Listing::Transient) => Err(SourceError::from_status(502, "bad gateway")),
            Some(Listing::Permanent) => Err(SourceError::from_status(404, "Not Found")),
            None => Ok(self.inner.assets.lock().unwrap().clone()),
        }
    }

    async fn fetch_text(&self, url: &str) -> Result<Option<String>, SourceError> {
        self.inner.fetched.lock().unwrap().push(url.to_string());
        if self.inner.failing_texts.lock().unwrap().contains(url) {
            return Err(SourceError::from_status(503, "service unavailable"));
        }
        Ok(self.inner.texts.lock().unwrap().get(url).cloned())
    }
}
