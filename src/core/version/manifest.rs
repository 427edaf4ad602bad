// ─── Version Manifest ───
// Handles fetching and parsing the Mojang version manifest v2.

use serde::Deserialize;
use tracing::info;

use crate::core::downloader::{fetch_json, ArtifactSource};
use crate::core::error::InstallResult;

pub const VERSION_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";

/// Top-level Mojang version manifest.
#[derive(Debug, Deserialize)]
pub struct VersionManifest {
    pub latest: LatestVersions,
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String,
}

/// A single entry in the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: String,
    #[serde(rename = "releaseTime")]
    pub release_time: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

impl VersionManifest {
    /// Fetch the version manifest through the given source.
    pub async fn fetch(source: &dyn ArtifactSource) -> InstallResult<Self> {
        info!("Fetching Minecraft version manifest...");

        let manifest: VersionManifest = fetch_json(source, VERSION_MANIFEST_URL).await?;

        info!("Loaded {} versions from manifest", manifest.versions.len());
        Ok(manifest)
    }

    /// Find a specific version entry by ID (e.g. "1.20.4").
    pub fn find_version(&self, id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// Map the `release` and `snapshot` aliases to the latest ids.
    pub fn resolve_alias<'a>(&'a self, name: &'a str) -> &'a str {
        match name {
            "release" => &self.latest.release,
            "snapshot" => &self.latest.snapshot,
            other => other,
        }
    }
}
