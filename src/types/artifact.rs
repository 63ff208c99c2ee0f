//! Artifact roles and the per-check completion record.
//!
//! A nightly release is only usable once all four platform artifacts are
//! attached to it. Each artifact is recognized by the file name at the end of
//! its download URL.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// One of the four artifacts a complete release must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactRole {
    WindowsInstaller,
    MacosDiskImage,
    LinuxAppImage,
    AndroidPackage,
}

impl ArtifactRole {
    /// All roles, in the order they are reported.
    pub const ALL: [ArtifactRole; 4] = [
        ArtifactRole::WindowsInstaller,
        ArtifactRole::MacosDiskImage,
        ArtifactRole::LinuxAppImage,
        ArtifactRole::AndroidPackage,
    ];

    /// Human-readable label used in log lines.
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactRole::WindowsInstaller => "Windows Installer",
            ArtifactRole::MacosDiskImage => "macOS DMG",
            ArtifactRole::LinuxAppImage => "Linux AppImage",
            ArtifactRole::AndroidPackage => "Android APK",
        }
    }

    /// Whether a match for this role carries the release's version string
    /// and a display file name.
    pub fn yields_version(&self) -> bool {
        matches!(
            self,
            ArtifactRole::LinuxAppImage | ArtifactRole::AndroidPackage
        )
    }

    /// File name this role's artifact is published under for `version`.
    pub fn file_name(&self, version: &str) -> String {
        match self {
            ArtifactRole::WindowsInstaller => format!("subsurface-{version}-CICD-release-installer.exe"),
            ArtifactRole::MacosDiskImage => format!("Subsurface-{version}-CICD-release.dmg"),
            ArtifactRole::LinuxAppImage => format!("Subsurface-v{version}-CICD-release.AppImage"),
            ArtifactRole::AndroidPackage => format!("Subsurface-mobile-{version}-CICD-release.apk"),
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            ArtifactRole::WindowsInstaller => &PATTERNS[0],
            ArtifactRole::MacosDiskImage => &PATTERNS[1],
            ArtifactRole::LinuxAppImage => &PATTERNS[2],
            ArtifactRole::AndroidPackage => &PATTERNS[3],
        }
    }

    /// Tests a download URL against this role's file name pattern.
    pub fn recognize(&self, url: &str) -> Option<MatchedArtifact> {
        let caps = self.pattern().captures(url)?;
        let (display_name, version) = if self.yields_version() {
            (
                caps.name("name").map(|m| m.as_str().to_string()),
                caps.name("version").map(|m| m.as_str().to_string()),
            )
        } else {
            (None, None)
        };
        Some(MatchedArtifact {
            url: url.to_string(),
            display_name,
            version,
        })
    }
}

impl fmt::Display for ArtifactRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// Indexed in `ArtifactRole::ALL` order. The file name has to be the last
// path segment of the URL.
static PATTERNS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        r"(?:^|/)(?P<name>subsurface-(?P<version>\d[^/]*)-CICD-release-installer\.exe)$",
        r"(?:^|/)(?P<name>Subsurface-(?P<version>\d[^/]*)-CICD-release\.dmg)$",
        r"(?:^|/)(?P<name>Subsurface-v(?P<version>\d[^/]*)-CICD-release\.AppImage)$",
        r"(?:^|/)(?P<name>Subsurface-mobile-(?P<version>\d[^/]*)-CICD-release\.apk)$",
    ]
    .map(|p| Regex::new(p).expect("artifact patterns are valid"))
});

/// A published asset as reported by the artifact source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    /// Direct download URL of the asset.
    pub url: String,
}

impl ReleaseAsset {
    pub fn new(url: impl Into<String>) -> Self {
        ReleaseAsset { url: url.into() }
    }
}

/// An asset that satisfied one role's pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedArtifact {
    pub url: String,
    /// File name for building a direct download link (version-bearing roles only).
    pub display_name: Option<String>,
    /// Version token embedded in the file name (version-bearing roles only).
    pub version: Option<String>,
}

/// Result of matching one asset listing against the four roles.
///
/// Rebuilt from scratch on every check; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseCompletionRecord {
    found: BTreeMap<ArtifactRole, MatchedArtifact>,
}

impl ReleaseCompletionRecord {
    /// Matches every asset URL against every role. The first asset that
    /// satisfies a role is kept for it.
    pub fn from_assets(assets: &[ReleaseAsset]) -> Self {
        let mut found = BTreeMap::new();
        for asset in assets {
            for role in ArtifactRole::ALL {
                if found.contains_key(&role) {
                    continue;
                }
                if let Some(matched) = role.recognize(&asset.url) {
                    found.insert(role, matched);
                }
            }
        }
        ReleaseCompletionRecord { found }
    }

    /// The artifact matched for `role`, if any.
    pub fn get(&self, role: ArtifactRole) -> Option<&MatchedArtifact> {
        self.found.get(&role)
    }

    /// True iff every role has a non-empty matched URL.
    pub fn is_complete(&self) -> bool {
        ArtifactRole::ALL
            .iter()
            .all(|role| self.found.get(role).is_some_and(|m| !m.url.is_empty()))
    }

    /// Roles without a match, in reporting order.
    pub fn missing(&self) -> Vec<ArtifactRole> {
        ArtifactRole::ALL
            .into_iter()
            .filter(|role| !self.found.contains_key(role))
            .collect()
    }

    /// The canonical version string: the AppImage's token, else the APK's.
    pub fn version(&self) -> Option<&str> {
        [ArtifactRole::LinuxAppImage, ArtifactRole::AndroidPackage]
            .iter()
            .filter_map(|role| self.found.get(role))
            .find_map(|m| m.version.as_deref())
    }
}
