use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::core::config::InstallConfig;
use crate::core::downloader::{check_file, ArtifactFetcher, ArtifactSource, Batch, DownloadTask};
use crate::core::error::{InstallError, InstallResult};
use crate::core::install::HookSet;
use crate::core::version::{Download, LoadedVersion};

/// Manages Minecraft asset downloads (sounds, textures referenced by asset index).
pub struct AssetManager;

/// Top-level asset index JSON structure.
#[derive(Debug, Deserialize)]
pub struct AssetIndex {
    /// Objects are laid out by name under `assets/virtual/<id>`.
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,
    /// Objects are also copied into `<mc_dir>/resources`.
    #[serde(default)]
    pub map_to_resources: bool,
    pub objects: HashMap<String, AssetObject>,
}

#[derive(Debug, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

pub const RESOURCES_URL: &str = "https://resources.download.minecraft.net/";

/// Assets of an installation, with the name mapping needed by old versions.
#[derive(Debug, Clone)]
pub struct Assets {
    pub id: String,
    pub mapping: Option<AssetsMapping>,
}

#[derive(Debug, Clone)]
pub struct AssetsMapping {
    pub virtual_dir: PathBuf,
    pub resources: bool,
    /// Relative name to object file and size.
    pub objects: Vec<(PathBuf, PathBuf, u64)>,
}

impl AssetManager {
    /// Load the asset index of the hierarchy and queue every missing object.
    ///
    /// The first version declaring `assetIndex` (or the legacy `assets` id)
    /// wins. Returns `None` when no version declares assets.
    pub async fn load(
        config: &InstallConfig,
        source: &dyn ArtifactSource,
        hierarchy: &[LoadedVersion],
        batch: &mut Batch,
        hooks: &mut HookSet<'_>,
    ) -> InstallResult<Option<Assets>> {
        let index_info: Option<(&str, Option<&Download>)> =
            hierarchy.iter().find_map(|version| {
                let descriptor = &version.descriptor;
                match (&descriptor.asset_index, &descriptor.assets) {
                    (Some(index), _) => Some((index.id.as_str(), Some(&index.download))),
                    (None, Some(id)) => Some((id.as_str(), None)),
                    (None, None) => None,
                }
            });

        let Some((id, download)) = index_info else {
            info!("No asset index declared");
            return Ok(None);
        };

        hooks.load_assets(id);

        // 1. Make sure the index itself is present
        let index_file = config.assets_dir.join("indexes").join(format!("{id}.json"));
        if let Some(dl) = download.filter(|dl| !dl.url.is_empty()) {
            if !check_file(&index_file, dl.size, dl.sha1.as_deref()).await? {
                let task = DownloadTask::new(&dl.url, &index_file)
                    .with_size(dl.size)
                    .with_sha1(dl.sha1.as_deref());
                ArtifactFetcher::new(source).fetch_one(task).await?;
            }
        }

        let raw = match tokio::fs::read(&index_file).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(InstallError::AssetsNotFound { id: id.to_string() })
            }
            Err(e) => return Err(InstallError::io(&index_file, e)),
        };
        let index: AssetIndex = serde_json::from_slice(&raw)?;

        hooks.loaded_assets(id, index.objects.len());

        // 2. Build download entries for all asset objects
        let objects_dir = config.assets_dir.join("objects");
        let mut mapping = (index.is_virtual || index.map_to_resources).then(|| AssetsMapping {
            virtual_dir: config.assets_dir.join("virtual").join(id),
            resources: index.map_to_resources,
            objects: Vec::new(),
        });

        let mut unique_hashes = HashSet::new();
        let mut queued = 0usize;

        for (name, obj) in &index.objects {
            if obj.hash.len() < 2 {
                return Err(InstallError::AssetsNotFound { id: id.to_string() });
            }
            let hash_prefix = &obj.hash[..2];
            let dest = objects_dir.join(hash_prefix).join(&obj.hash);

            if let Some(mapping) = &mut mapping {
                mapping
                    .objects
                    .push((PathBuf::from(name), dest.clone(), obj.size));
            }

            // Several names may share one object
            if !unique_hashes.insert(obj.hash.as_str()) {
                continue;
            }

            let sha1 = config.strict_assets_check.then_some(obj.hash.as_str());
            if check_file(&dest, Some(obj.size), sha1).await? {
                continue;
            }

            let url = format!("{}{}/{}", RESOURCES_URL, hash_prefix, obj.hash);
            batch.push(
                DownloadTask::new(url, dest)
                    .with_size(Some(obj.size))
                    .with_sha1(Some(&obj.hash)),
            );
            queued += 1;
        }

        info!(
            "Queued {} asset objects ({} already cached)",
            queued,
            unique_hashes.len() - queued
        );

        hooks.verified_assets(id, index.objects.len());

        Ok(Some(Assets {
            id: id.to_string(),
            mapping,
        }))
    }

    /// Link objects of virtual or resource-mapped indexes by name.
    pub async fn finalize(config: &InstallConfig, assets: &Assets) -> InstallResult<()> {
        let Some(mapping) = &assets.mapping else {
            return Ok(());
        };

        // Old versions rewrite their resources, so they are copies, never links.
        let resources_dir = mapping.resources.then(|| config.mc_dir.join("resources"));

        for (name, object_file, size) in &mapping.objects {
            let virtual_file = mapping.virtual_dir.join(name);
            create_parent(&virtual_file).await?;
            hard_link_file(object_file, &virtual_file).await?;

            if let Some(resources_dir) = &resources_dir {
                let resource_file = resources_dir.join(name);
                if !check_file(&resource_file, Some(*size), None).await? {
                    create_parent(&resource_file).await?;
                    tokio::fs::copy(object_file, &resource_file)
                        .await
                        .map_err(|e| InstallError::io(&resource_file, e))?;
                }
            }
        }

        debug!(
            "Mapped {} assets into {:?}",
            mapping.objects.len(),
            mapping.virtual_dir
        );
        Ok(())
    }
}

async fn create_parent(file: &Path) -> InstallResult<()> {
    if let Some(parent) = file.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| InstallError::io(parent, e))?;
    }
    Ok(())
}

/// Hard link `src` to `dst`, falling back to a copy across volumes.
pub(crate) async fn hard_link_file(src: &Path, dst: &Path) -> InstallResult<()> {
    match tokio::fs::remove_file(dst).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(InstallError::io(dst, e)),
    }

    if tokio::fs::hard_link(src, dst).await.is_err() {
        tokio::fs::copy(src, dst)
            .await
            .map_err(|e| InstallError::io(dst, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::downloader::sha1_hex;
    use crate::core::testing::{write_file, MemorySource};
    use serde_json::json;

    fn hierarchy(index: serde_json::Value) -> Vec<LoadedVersion> {
        vec![LoadedVersion {
            name: "1.6.4".into(),
            dir: PathBuf::from("versions/1.6.4"),
            descriptor: serde_json::from_value(json!({ "assetIndex": index })).unwrap(),
        }]
    }

    #[tokio::test]
    async fn queues_missing_objects_once_per_hash() {
        let dir = tempfile::tempdir().unwrap();
        let config = InstallConfig::new(dir.path());
        let source = MemorySource::new();

        let sound = sha1_hex(b"sound");
        let index = json!({
            "objects": {
                "a.ogg": {"hash": sound, "size": 5},
                "copy/a.ogg": {"hash": sound, "size": 5}
            }
        });
        let index_bytes = serde_json::to_vec(&index).unwrap();
        source.insert("https://example.com/idx.json", index_bytes.clone());

        let mut batch = Batch::new();
        let mut hooks = HookSet::new();
        let assets = AssetManager::load(
            &config,
            &source,
            &hierarchy(json!({
                "id": "legacy",
                "url": "https://example.com/idx.json",
                "sha1": sha1_hex(&index_bytes),
                "size": index_bytes.len()
            })),
            &mut batch,
            &mut hooks,
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(assets.id, "legacy");
        assert!(assets.mapping.is_none());
        assert_eq!(batch.len(), 1);
        assert_eq!(
            batch.tasks()[0].url,
            format!("{RESOURCES_URL}{}/{}", &sound[..2], sound)
        );
        assert!(config.assets_dir.join("indexes/legacy.json").is_file());
    }

    #[tokio::test]
    async fn missing_index_without_download_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let config = InstallConfig::new(dir.path());
        let versions = vec![LoadedVersion {
            name: "old".into(),
            dir: dir.path().join("versions/old"),
            descriptor: serde_json::from_value(json!({"assets": "pre-1.6"})).unwrap(),
        }];

        let err = AssetManager::load(
            &config,
            &MemorySource::new(),
            &versions,
            &mut Batch::new(),
            &mut HookSet::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, InstallError::AssetsNotFound { id } if id == "pre-1.6"));
    }

    #[tokio::test]
    async fn virtual_index_is_mapped_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let config = InstallConfig::new(dir.path());

        let hash = sha1_hex(b"lang");
        write_file(
            &config.assets_dir.join("indexes/pre-1.6.json"),
            &serde_json::to_vec(&json!({
                "map_to_resources": true,
                "objects": {"lang/en_US.lang": {"hash": hash, "size": 4}}
            }))
            .unwrap(),
        );
        write_file(
            &config.assets_dir.join("objects").join(&hash[..2]).join(&hash),
            b"lang",
        );

        let versions = vec![LoadedVersion {
            name: "1.5.2".into(),
            dir: dir.path().join("versions/1.5.2"),
            descriptor: serde_json::from_value(json!({"assets": "pre-1.6"})).unwrap(),
        }];
        let mut batch = Batch::new();
        let assets = AssetManager::load(
            &config,
            &MemorySource::new(),
            &versions,
            &mut batch,
            &mut HookSet::new(),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(batch.is_empty());

        AssetManager::finalize(&config, &assets).await.unwrap();
        let virtual_file = config.assets_dir.join("virtual/pre-1.6/lang/en_US.lang");
        assert_eq!(std::fs::read(virtual_file).unwrap(), b"lang");
        let resource = config.mc_dir.join("resources/lang/en_US.lang");
        assert_eq!(std::fs::read(resource).unwrap(), b"lang");
    }
}
