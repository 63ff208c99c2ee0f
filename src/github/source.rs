//! [`ArtifactSource`] backed by GitHub releases.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::source::{ArtifactSource, SourceError};
use crate::types::{ReleaseAsset, ReleaseId};

use super::client::GitHubClient;
use super::retry::{RetryConfig, retry_with_backoff};

const PER_PAGE: u8 = 100;
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("release-watcher/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct AssetPayload {
    browser_download_url: String,
}

#[derive(Serialize)]
struct Page {
    per_page: u8,
    page: u32,
}

/// Lists release assets through the REST API and downloads text files over
/// plain HTTPS.
#[derive(Debug, Clone)]
pub struct GitHubSource {
    client: GitHubClient,
    http: reqwest::Client,
    retry: RetryConfig,
}

impl GitHubSource {
    pub fn new(client: GitHubClient, retry: RetryConfig) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(SourceError::from_reqwest)?;
        Ok(Self {
            client,
            http,
            retry,
        })
    }

    pub fn client(&self) -> &GitHubClient {
        &self.client
    }

    async fn fetch_page(&self, release: ReleaseId, page: u32) -> Result<Vec<AssetPayload>, SourceError> {
        let repo = self.client.repo();
        let route = format!("/repos/{}/{}/releases/{}/assets", repo.owner, repo.repo, release);
        self.client
            .inner()
            .get(
                route,
                Some(&Page {
                    per_page: PER_PAGE,
                    page,
                }),
            )
            .await
            .map_err(SourceError::from_octocrab)
    }
}

impl ArtifactSource for GitHubSource {
    async fn list_assets(&self, release: ReleaseId) -> Result<Vec<ReleaseAsset>, SourceError> {
        let mut assets = Vec::new();
        let mut page = 1;
        loop {
            let batch = retry_with_backoff(self.retry, move || self.fetch_page(release, page)).await?;
            let last = batch.len() < usize::from(PER_PAGE);
            assets.extend(
                batch
                    .into_iter()
                    .map(|a| ReleaseAsset::new(a.browser_download_url)),
            );
            if last {
                break;
            }
            page += 1;
        }
        debug!(release = %release, count = assets.len(), "listed release assets");
        Ok(assets)
    }

    async fn fetch_text(&self, url: &str) -> Result<Option<String>, SourceError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SourceError::from_status(
                status.as_u16(),
                format!("GET {url} returned {status}"),
            ));
        }

        response
            .text()
            .await
            .map(Some)
            .map_err(SourceError::from_reqwest)
    }
}
