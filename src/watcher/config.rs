//! Timing configuration for the release watcher.
//!
//! Webhooks announce a release as soon as it is created, long before CI has
//! uploaded every artifact. The watcher therefore waits before the first
//! check and then re-checks on a fixed backoff until the release is complete.
//!
//! # Defaults
//!
//! - **Initial delay**: 15 minutes after the webhook (`RELEASE_WATCHER_INITIAL_DELAY_SECS`)
//! - **Retry backoff**: 150 seconds between checks (`RELEASE_WATCHER_RETRY_SECS`)
//! - **Recovery delay**: 60 seconds after a restart (`RELEASE_WATCHER_RECOVERY_DELAY_SECS`)
//! - **Election TTL**: 30 seconds for the recovery leader key

use std::time::Duration;

use crate::types::RepoId;

const DEFAULT_INITIAL_DELAY_SECS: u64 = 900;
const DEFAULT_RETRY_BACKOFF_SECS: u64 = 150;
const DEFAULT_RECOVERY_DELAY_SECS: u64 = 60;
const DEFAULT_ELECTION_TTL_SECS: u64 = 30;
const DEFAULT_SUMMARY_COUNT: u32 = 5;

/// Location of the per-build change title. `{repo}` and `{version}` are
/// substituted.
pub const DEFAULT_SUMMARY_URL_TEMPLATE: &str =
    "https://github.com/{repo}/releases/download/v{version}-CICD-release/release_content_title.txt";

#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Delay between the webhook and the first check.
    pub initial_delay: Duration,

    /// Delay between a failed or incomplete check and the next one.
    pub retry_backoff: Duration,

    /// Delay before re-checking releases found pending at startup.
    pub recovery_delay: Duration,

    /// Lifetime of the recovery election key.
    pub election_ttl: Duration,

    /// How many builds, counting back from the new one, contribute a change
    /// title to the summary.
    pub summary_count: u32,

    pub summary_url_template: String,

    /// Repository substituted into `summary_url_template`.
    pub repo: RepoId,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchConfig {
    pub fn new() -> Self {
        WatchConfig {
            initial_delay: Duration::from_secs(DEFAULT_INITIAL_DELAY_SECS),
            retry_backoff: Duration::from_secs(DEFAULT_RETRY_BACKOFF_SECS),
            recovery_delay: Duration::from_secs(DEFAULT_RECOVERY_DELAY_SECS),
            election_ttl: Duration::from_secs(DEFAULT_ELECTION_TTL_SECS),
            summary_count: DEFAULT_SUMMARY_COUNT,
            summary_url_template: DEFAULT_SUMMARY_URL_TEMPLATE.to_string(),
            repo: RepoId::new("subsurface", "nightly-builds"),
        }
    }

    /// Reads `RELEASE_WATCHER_*` overrides. Unset or unparsable values keep
    /// their defaults.
    pub fn from_env(repo: RepoId) -> Self {
        let defaults = Self::new();
        WatchConfig {
            initial_delay: secs_from_env("RELEASE_WATCHER_INITIAL_DELAY_SECS")
                .unwrap_or(defaults.initial_delay),
            retry_backoff: secs_from_env("RELEASE_WATCHER_RETRY_SECS")
                .unwrap_or(defaults.retry_backoff),
            recovery_delay: secs_from_env("RELEASE_WATCHER_RECOVERY_DELAY_SECS")
                .unwrap_or(defaults.recovery_delay),
            election_ttl: secs_from_env("RELEASE_WATCHER_ELECTION_TTL_SECS")
                .unwrap_or(defaults.election_ttl),
            summary_count: std::env::var("RELEASE_WATCHER_SUMMARY_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.summary_count),
            summary_url_template: std::env::var("RELEASE_WATCHER_SUMMARY_URL_TEMPLATE")
                .unwrap_or(defaults.summary_url_template),
            repo,
        }
    }

    /// URL of the change title published with `version`.
    pub fn summary_url(&self, version: &str) -> String {
        self.summary_url_template
            .replace("{repo}", &self.repo.to_string())
            .replace("{version}", version)
    }
}

fn secs_from_env(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = WatchConfig::new();

        assert_eq!(config.initial_delay, Duration::from_secs(900));
        assert_eq!(config.retry_backoff, Duration::from_secs(150));
        assert_eq!(config.recovery_delay, Duration::from_secs(60));
        assert_eq!(config.election_ttl, Duration::from_secs(30));
        assert_eq!(config.summary_count, 5);
    }

    #[test]
    fn summary_url_substitutes_repo_and_version() {
        let config = WatchConfig::new();

        assert_eq!(
            config.summary_url("6.0.5217"),
            "https://github.com/subsurface/nightly-builds/releases/download/v6.0.5217-CICD-release/release_content_title.txt"
        );
    }
}
