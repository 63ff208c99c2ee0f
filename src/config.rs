//! Process configuration read from the environment.
//!
//! | variable | default |
//! |---|---|
//! | `RELEASE_WATCHER_BIND` | `0.0.0.0:8002` |
//! | `RELEASE_WATCHER_WEBHOOK_SECRET` | required for `serve` |
//! | `GITHUB_TOKEN` | anonymous API access |
//! | `RELEASE_WATCHER_REPO` | `subsurface/nightly-builds` |
//! | `RELEASE_WATCHER_REDIS_URL` | in-memory store |
//! | `RELEASE_WATCHER_MIRROR_PATH` | `site.env` |
//! | `RELEASE_WATCHER_WEBHOOK_LOG` | no audit log |
//!
//! Watch timings are read by [`WatchConfig::from_env`].

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::{InvalidRepoId, RepoId};
use crate::watcher::WatchConfig;
use crate::webhooks::WebhookSecret;

const DEFAULT_BIND: &str = "0.0.0.0:8002";
const DEFAULT_REPO: &str = "subsurface/nightly-builds";
const DEFAULT_MIRROR_PATH: &str = "site.env";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is not set")]
    Missing { name: &'static str },

    #[error("{name} is not a socket address: {value}")]
    InvalidBind { name: &'static str, value: String },

    #[error("RELEASE_WATCHER_REPO: {0}")]
    InvalidRepo(#[from] InvalidRepoId),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    /// Absent unless the server is going to run.
    pub webhook_secret: Option<WebhookSecret>,
    pub github_token: Option<String>,
    pub repo: RepoId,
    pub redis_url: Option<String>,
    pub mirror_path: PathBuf,
    pub webhook_log: Option<PathBuf>,
    pub watch: WatchConfig,
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_value = var("RELEASE_WATCHER_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_value
            .parse()
            .map_err(|_| ConfigError::InvalidBind {
                name: "RELEASE_WATCHER_BIND",
                value: bind_value.clone(),
            })?;

        let repo: RepoId = var("RELEASE_WATCHER_REPO")
            .as_deref()
            .unwrap_or(DEFAULT_REPO)
            .parse()?;

        Ok(AppConfig {
            bind,
            webhook_secret: var("RELEASE_WATCHER_WEBHOOK_SECRET").map(WebhookSecret::new),
            github_token: var("GITHUB_TOKEN"),
            redis_url: var("RELEASE_WATCHER_REDIS_URL"),
            mirror_path: var("RELEASE_WATCHER_MIRROR_PATH")
                .unwrap_or_else(|| DEFAULT_MIRROR_PATH.to_string())
                .into(),
            webhook_log: var("RELEASE_WATCHER_WEBHOOK_LOG").map(PathBuf::from),
            watch: WatchConfig::from_env(repo.clone()),
            repo,
        })
    }

    /// The webhook secret, which `serve` cannot run without.
    pub fn require_webhook_secret(&self) -> Result<WebhookSecret, ConfigError> {
        self.webhook_secret.clone().ok_or(ConfigError::Missing {
            name: "RELEASE_WATCHER_WEBHOOK_SECRET",
        })
    }
}
