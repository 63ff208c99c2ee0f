//! Durable keyed store used for cross-process coordination.
//!
//! The store is the only synchronization primitive shared between worker
//! processes. It is consumed through a narrow contract:
//!
//! - `SET key value NX [EX seconds]` for locks and leader election
//! - `GET key`, `SET key value`, `DEL key` for shared values
//!
//! Values are opaque strings; the cell layer stores JSON in them.
//!
//! # Implementations
//!
//! - [`RedisStore`]: a Redis server shared by all workers
//! - [`MemoryStore`]: process-local map, for single-process deployments and tests

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Errors returned by a keyed store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The Redis server rejected the command or the connection failed.
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    /// The store cannot be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// The keyed store contract.
///
/// Implementations must make `set_if_absent` atomic across every process
/// sharing the store, and reads must observe writes from any process.
pub trait KeyedStore: Clone + Send + Sync + 'static {
    /// Atomically creates `key` if it does not exist.
    ///
    /// Returns `true` iff this call created the key. With `expiry`, the key
    /// disappears after that duration.
    fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        expiry: Option<Duration>,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Returns the current value of `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Unconditionally sets `key`.
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<()>> + Send;

    /// Removes `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Store selected at startup from configuration.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    Redis(RedisStore),
    Memory(MemoryStore),
}

impl StoreBackend {
    /// Connects to Redis when a URL is given, otherwise uses a process-local store.
    pub async fn connect(redis_url: Option<&str>) -> Result<Self> {
        match redis_url {
            Some(url) => Ok(StoreBackend::Redis(RedisStore::connect(url).await?)),
            None => {
                tracing::warn!(
                    "no redis url configured; using an in-memory store (single worker only)"
                );
                Ok(StoreBackend::Memory(MemoryStore::new()))
            }
        }
    }
}

impl KeyedStore for StoreBackend {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        expiry: Option<Duration>,
    ) -> Result<bool> {
        match self {
            StoreBackend::Redis(store) => store.set_if_absent(key, value, expiry).await,
            StoreBackend::Memory(store) => store.set_if_absent(key, value, expiry).await,
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self {
            StoreBackend::Redis(store) => store.get(key).await,
            StoreBackend::Memory(store) => store.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        match self {
            StoreBackend::Redis(store) => store.set(key, value).await,
            StoreBackend::Memory(store) => store.set(key, value).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self {
            StoreBackend::Redis(store) => store.delete(key).await,
            StoreBackend::Memory(store) => store.delete(key).await,
        }
    }
}
