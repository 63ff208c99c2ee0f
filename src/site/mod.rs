//! The site state handed to the rendering layer.
//!
//! Templates never talk to the store directly. They read one snapshot with
//! the two releases the download page shows and the changes that went into
//! the latest nightly.

use serde::Serialize;

use crate::cells::{
    CellError, CellStore, CURRENT_RELEASE, CURRENT_RELEASE_DATE, LATEST_RELEASE,
    LATEST_RELEASE_DATE, PR_SUMMARY, RELEASE_IDS,
};
use crate::store::KeyedStore;
use crate::types::{ArtifactRole, ReleaseId, RepoId};

/// Where stable releases are mirrored.
pub const STABLE_DOWNLOAD_BASE: &str = "https://subsurface-divelog.org/downloads";

/// Download URL for each platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadLinks {
    pub windows: String,
    pub macos: String,
    pub android: String,
    pub appimage: String,
}

impl DownloadLinks {
    /// Links into the nightly release on GitHub.
    pub fn latest(repo: &RepoId, version: &str) -> Self {
        Self::under(
            &format!("https://github.com/{repo}/releases/download/v{version}-CICD-release"),
            version,
        )
    }

    /// Links into the stable download mirror.
    pub fn current(version: &str) -> Self {
        Self::under(STABLE_DOWNLOAD_BASE, version)
    }

    fn under(base: &str, version: &str) -> Self {
        let link = |role: ArtifactRole| format!("{base}/{}", role.file_name(version));
        DownloadLinks {
            windows: link(ArtifactRole::WindowsInstaller),
            macos: link(ArtifactRole::MacosDiskImage),
            android: link(ArtifactRole::AndroidPackage),
            appimage: link(ArtifactRole::LinuxAppImage),
        }
    }
}

/// One release as shown on the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseInfo {
    pub version: Option<String>,
    pub date: Option<String>,
    /// Absent while the version is unknown.
    pub links: Option<DownloadLinks>,
}

impl ReleaseInfo {
    fn new(version: Option<String>, date: Option<String>, links: impl FnOnce(&str) -> DownloadLinks) -> Self {
        let version = version.filter(|v| !v.is_empty());
        let links = version.as_deref().map(links);
        ReleaseInfo {
            version,
            date,
            links,
        }
    }
}

/// Snapshot of the site cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteState {
    /// Latest nightly.
    pub latest: ReleaseInfo,
    /// Current stable release.
    pub current: ReleaseInfo,
    pub pr_summary: String,
    pub pending_releases: Vec<ReleaseId>,
}

impl SiteState {
    pub async fn load<S: KeyedStore>(cells: &CellStore<S>, repo: &RepoId) -> Result<Self, CellError> {
        let latest = ReleaseInfo::new(
            cells.read(&LATEST_RELEASE).await?,
            cells.read(&LATEST_RELEASE_DATE).await?,
            |v| DownloadLinks::latest(repo, v),
        );
        let current = ReleaseInfo::new(
            cells.read(&CURRENT_RELEASE).await?,
            cells.read(&CURRENT_RELEASE_DATE).await?,
            DownloadLinks::current,
        );
        Ok(SiteState {
            latest,
            current,
            pr_summary: cells.read(&PR_SUMMARY).await?.unwrap_or_default(),
            pending_releases: cells.read(&RELEASE_IDS).await?.unwrap_or_default(),
        })
    }
}
