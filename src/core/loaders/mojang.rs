// ─── Mojang Descriptors ───
// Fetches missing version descriptors from the Mojang version manifest.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::core::downloader::{fetch_bytes, sha1_hex, ArtifactSource};
use crate::core::error::{DownloadFailure, DownloadFailureReason, InstallError, InstallResult};
use crate::core::version::{DescriptorSource, VersionManifest};

pub struct MojangSource {
    source: Arc<dyn ArtifactSource>,
    manifest: OnceCell<VersionManifest>,
    /// Names never looked up in the manifest.
    excluded: HashSet<String>,
}

impl MojangSource {
    pub fn new(source: Arc<dyn ArtifactSource>) -> Self {
        Self {
            source,
            manifest: OnceCell::new(),
            excluded: HashSet::new(),
        }
    }

    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.excluded.insert(name.into());
        self
    }

    /// The manifest, fetched on first use only.
    pub async fn manifest(&self) -> InstallResult<&VersionManifest> {
        self.manifest
            .get_or_try_init(|| VersionManifest::fetch(self.source.as_ref()))
            .await
    }

    /// `release` and `snapshot` resolve to the latest ids, other names are kept.
    pub async fn resolve_alias(&self, name: &str) -> InstallResult<String> {
        if !matches!(name, "release" | "snapshot") {
            return Ok(name.to_string());
        }
        let resolved = self.manifest().await?.resolve_alias(name).to_string();
        info!("Alias {} resolved to {}", name, resolved);
        Ok(resolved)
    }
}

#[async_trait]
impl DescriptorSource for MojangSource {
    async fn fetch(&self, name: &str, file: &Path) -> InstallResult<bool> {
        if self.excluded.contains(name) {
            return Ok(false);
        }
        let Some(entry) = self.manifest().await?.find_version(name) else {
            debug!("{} is not a Mojang version", name);
            return Ok(false);
        };

        let bytes = fetch_bytes(self.source.as_ref(), &entry.url).await?;
        if let Some(expected) = &entry.sha1 {
            let actual = sha1_hex(&bytes);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(InstallError::Download {
                    failures: vec![DownloadFailure {
                        url: entry.url.clone(),
                        dest: file.to_path_buf(),
                        reason: DownloadFailureReason::Sha1 {
                            expected: expected.clone(),
                            actual,
                        },
                    }],
                });
            }
        }

        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| InstallError::io(parent, e))?;
        }
        tokio::fs::write(file, &bytes)
            .await
            .map_err(|e| InstallError::io(file, e))?;
        info!("Fetched descriptor of {}", name);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::install::HookSet;
    use crate::core::testing::MemorySource;
    use crate::core::version::manifest::VERSION_MANIFEST_URL;
    use crate::core::version::resolve_hierarchy;
    use serde_json::json;

    fn serve(descriptor: &[u8], sha1: &str) -> Arc<MemorySource> {
        let source = Arc::new(MemorySource::new());
        source.insert_json(
            VERSION_MANIFEST_URL,
            &json!({
                "latest": {"release": "1.20.1", "snapshot": "23w31a"},
                "versions": [{
                    "id": "1.20.1",
                    "type": "release",
                    "releaseTime": "2023-06-12T13:25:51+00:00",
                    "url": "https://piston-meta.mojang.com/v1/packages/abc/1.20.1.json",
                    "sha1": sha1
                }]
            }),
        );
        source.insert(
            "https://piston-meta.mojang.com/v1/packages/abc/1.20.1.json",
            descriptor.to_vec(),
        );
        source
    }

    #[tokio::test]
    async fn fetches_missing_descriptors_once() {
        let descriptor = br#"{"id": "1.20.1", "mainClass": "net.minecraft.client.main.Main"}"#;
        let source = serve(descriptor, &sha1_hex(descriptor));
        let mojang = MojangSource::new(source.clone());
        let dir = tempfile::tempdir().unwrap();

        let hierarchy = resolve_hierarchy("1.20.1", dir.path(), &mojang, &mut HookSet::new())
            .await
            .unwrap();
        assert_eq!(hierarchy[0].descriptor.main_class.as_deref(), Some("net.minecraft.client.main.Main"));

        assert_eq!(mojang.resolve_alias("release").await.unwrap(), "1.20.1");
        assert_eq!(mojang.resolve_alias("1.8.9").await.unwrap(), "1.8.9");
        assert_eq!(source.request_count(VERSION_MANIFEST_URL), 1);

        // Stored descriptors are read locally
        resolve_hierarchy("1.20.1", dir.path(), &mojang, &mut HookSet::new())
            .await
            .unwrap();
        assert_eq!(source.requests().len(), 2);
    }

    #[tokio::test]
    async fn rejects_tampered_descriptors() {
        let source = serve(br#"{"id": "1.20.1"}"#, &sha1_hex(b"something else"));
        let mojang = MojangSource::new(source);
        let dir = tempfile::tempdir().unwrap();

        let err = resolve_hierarchy("1.20.1", dir.path(), &mojang, &mut HookSet::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::core::error::ErrorKind::Integrity);
        assert!(!dir.path().join("1.20.1").join("1.20.1.json").exists());
    }

    #[tokio::test]
    async fn excluded_and_unknown_names_are_not_found() {
        let source = serve(b"{}", &sha1_hex(b"{}"));
        let mojang = MojangSource::new(source.clone()).exclude("forge-1.20.1-47.2.0");
        let dir = tempfile::tempdir().unwrap();

        let err = resolve_hierarchy("forge-1.20.1-47.2.0", dir.path(), &mojang, &mut HookSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::VersionNotFound { ref version } if version == "forge-1.20.1-47.2.0"));
        assert!(source.requests().is_empty());

        let err = resolve_hierarchy("b1.7.3", dir.path(), &mojang, &mut HookSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::VersionNotFound { .. }));
    }
}
