//! Process-local keyed store.
//!
//! Gives the same atomicity guarantees as Redis, but only within one process.
//! Expiry uses tokio's clock so paused-time tests can advance past it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use super::{KeyedStore, Result, StoreError};

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: Mutex<HashMap<String, Entry>>,
    unavailable: AtomicBool,
}

/// In-memory [`KeyedStore`]. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an outage: while unavailable every operation fails.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns the live keys, sorted. Intended for inspection in tests and logs.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let entries = self.lock();
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    fn check_available(&self) -> Result<()> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store marked unavailable".into()));
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyedStore for MemoryStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        expiry: Option<Duration>,
    ) -> Result<bool> {
        self.check_available()?;
        let now = Instant::now();
        let mut entries = self.lock();
        if entries.get(key).is_some_and(|entry| entry.is_live(now)) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: expiry.map(|ttl| now + ttl),
            },
        );
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        let now = Instant::now();
        let entries = self.lock();
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_available()?;
        self.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check_available()?;
        self.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_if_absent_only_first_wins() {
        let store = MemoryStore::new();

        assert!(store.set_if_absent("lock", "a", None).await.unwrap());
        assert!(!store.set_if_absent("lock", "b", None).await.unwrap());
        assert_eq!(store.get("lock").await.unwrap().as_deref(), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_key_can_be_reclaimed() {
        let store = MemoryStore::new();
        assert!(
            store
                .set_if_absent("election", "1", Some(Duration::from_secs(30)))
                .await
                .unwrap()
        );

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(!store.set_if_absent("election", "2", None).await.unwrap());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.get("election").await.unwrap(), None);
        assert!(store.set_if_absent("election", "2", None).await.unwrap());
    }

    #[tokio::test]
    async fn delete_absent_key_is_ok() {
        let store = MemoryStore::new();
        store.delete("missing").await.unwrap();
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = MemoryStore::new();
        let other = store.clone();

        store.set("k", "v").await.unwrap();
        assert_eq!(other.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(other.keys(), vec!["k".to_string()]);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_operation() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        assert!(store.get("k").await.is_err());
        assert!(store.set("k", "v").await.is_err());
        assert!(store.set_if_absent("k", "v", None).await.is_err());
        assert!(store.delete("k").await.is_err());

        store.set_unavailable(false);
        assert!(store.set("k", "v").await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_claims_have_one_winner() {
        let store = MemoryStore::new();
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .set_if_absent("processing_7", &i.to_string(), None)
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
