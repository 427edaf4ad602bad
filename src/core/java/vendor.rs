// ─── Vendor Runtimes ───
// Runtimes distributed by Mojang, described by a meta manifest per platform
// and a file manifest per distribution.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::config::InstallConfig;
use crate::core::downloader::{
    check_file, fetch_bytes, ArtifactFetcher, ArtifactSource, Batch, DownloadTask,
};
use crate::core::error::{InstallError, InstallResult};
use crate::core::platform::{java_exe, vendor_jvm_platform};
use crate::core::version::Download;

use super::JvmWarning;

pub const JVM_META_MANIFEST_URL: &str = "https://piston-meta.mojang.com/v1/products/java-runtime/2ec0cc96c44e5a76b9c8b7c39df7210883d12871/all.json";

const META_MANIFEST_FILE: &str = "all.json";
const META_MANIFEST_STAMP: &str = "all.json.cache";
const META_MANIFEST_TTL_HOURS: i64 = 24;

/// Platform to distribution name to variants.
type MetaManifest = HashMap<String, HashMap<String, Vec<MetaVariant>>>;

#[derive(Debug, Deserialize)]
struct MetaVariant {
    manifest: Download,
    version: MetaVersion,
}

#[derive(Debug, Deserialize)]
struct MetaVersion {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DistributionManifest {
    files: HashMap<String, ManifestFile>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ManifestFile {
    Directory,
    File {
        #[serde(default)]
        executable: bool,
        downloads: FileDownloads,
    },
    Link {
        target: String,
    },
}

#[derive(Debug, Deserialize)]
struct FileDownloads {
    raw: Download,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheStamp {
    fetched_at: DateTime<Utc>,
}

/// A vendor runtime whose files are queued in the download batch.
#[derive(Debug, Clone)]
pub struct VendorJvm {
    pub file: PathBuf,
    pub version: String,
    executables: Vec<PathBuf>,
    /// Link file and its target, relative to the link's directory.
    links: Vec<(PathBuf, PathBuf)>,
}

/// Distribution used when the descriptor names no component.
pub fn default_distribution(major_version: u32) -> Option<&'static str> {
    Some(match major_version {
        8 => "jre-legacy",
        16 => "java-runtime-alpha",
        17 => "java-runtime-gamma",
        21 => "java-runtime-delta",
        _ => return None,
    })
}

/// Resolve a vendor distribution and queue its missing files.
///
/// Returns `None` with a warning when the platform or distribution is not
/// provided by the vendor.
pub async fn load_vendor_jvm(
    config: &InstallConfig,
    source: &dyn ArtifactSource,
    distribution: &str,
    batch: &mut Batch,
    warn_hook: &mut (dyn FnMut(&JvmWarning) + Send),
) -> InstallResult<Option<VendorJvm>> {
    // Vendor builds are dynamically linked against glibc.
    let platform = if cfg!(all(target_os = "linux", target_feature = "crt-static")) {
        None
    } else {
        vendor_jvm_platform()
    };
    let Some(platform) = platform else {
        warn_hook(&JvmWarning::UnsupportedPlatform);
        return Ok(None);
    };

    let meta = load_meta_manifest(config, source).await?;

    let Some(distributions) = meta.get(platform) else {
        warn_hook(&JvmWarning::UnsupportedPlatform);
        return Ok(None);
    };
    let Some(variant) = distributions.get(distribution).and_then(|v| v.first()) else {
        warn_hook(&JvmWarning::MissingDistribution {
            distribution: distribution.to_string(),
        });
        return Ok(None);
    };

    let dir = config.jvm_dir.join(distribution);
    let manifest_file = config.jvm_dir.join(format!("{distribution}.json"));

    let dl = &variant.manifest;
    if !check_file(&manifest_file, dl.size, dl.sha1.as_deref()).await? {
        let task = DownloadTask::new(&dl.url, &manifest_file)
            .with_size(dl.size)
            .with_sha1(dl.sha1.as_deref());
        ArtifactFetcher::new(source).fetch_one(task).await?;
    }

    let raw = tokio::fs::read(&manifest_file)
        .await
        .map_err(|e| InstallError::io(&manifest_file, e))?;
    let manifest: DistributionManifest = serde_json::from_slice(&raw)?;

    let file = if cfg!(target_os = "macos") {
        dir.join("jre.bundle/Contents/Home/bin/java")
    } else {
        dir.join("bin").join(java_exe())
    };

    let mut jvm = VendorJvm {
        file,
        version: variant.version.name.clone(),
        executables: Vec::new(),
        links: Vec::new(),
    };

    let mut queued = 0usize;
    for (rel, entry) in &manifest.files {
        let path = dir.join(rel);
        match entry {
            ManifestFile::Directory => {
                tokio::fs::create_dir_all(&path)
                    .await
                    .map_err(|e| InstallError::io(&path, e))?;
            }
            ManifestFile::File {
                executable,
                downloads,
            } => {
                if *executable {
                    jvm.executables.push(path.clone());
                }
                let raw = &downloads.raw;
                let sha1 = raw.sha1.as_deref().filter(|_| config.strict_jvm_check);
                if !check_file(&path, raw.size, sha1).await? {
                    batch.push(
                        DownloadTask::new(&raw.url, path)
                            .with_size(raw.size)
                            .with_sha1(raw.sha1.as_deref()),
                    );
                    queued += 1;
                }
            }
            ManifestFile::Link { target } => {
                jvm.links.push((path, PathBuf::from(target)));
            }
        }
    }

    info!(
        "Vendor runtime {} ({}): {} files queued",
        distribution, jvm.version, queued
    );
    Ok(Some(jvm))
}

/// Meta manifest, served from the on-disk copy while it is fresh.
async fn load_meta_manifest(
    config: &InstallConfig,
    source: &dyn ArtifactSource,
) -> InstallResult<MetaManifest> {
    let file = config.jvm_dir.join(META_MANIFEST_FILE);
    let stamp_file = config.jvm_dir.join(META_MANIFEST_STAMP);

    if let Some(cached) = read_fresh_cache(&file, &stamp_file).await {
        debug!("Using cached runtime meta manifest");
        return Ok(cached);
    }

    let bytes = fetch_bytes(source, JVM_META_MANIFEST_URL).await?;
    let meta: MetaManifest = serde_json::from_slice(&bytes)?;

    tokio::fs::create_dir_all(&config.jvm_dir)
        .await
        .map_err(|e| InstallError::io(&config.jvm_dir, e))?;
    tokio::fs::write(&file, &bytes)
        .await
        .map_err(|e| InstallError::io(&file, e))?;
    let stamp = serde_json::to_vec(&CacheStamp {
        fetched_at: Utc::now(),
    })?;
    tokio::fs::write(&stamp_file, stamp)
        .await
        .map_err(|e| InstallError::io(&stamp_file, e))?;

    Ok(meta)
}

async fn read_fresh_cache(file: &Path, stamp_file: &Path) -> Option<MetaManifest> {
    let stamp: CacheStamp = serde_json::from_slice(&tokio::fs::read(stamp_file).await.ok()?).ok()?;
    if Utc::now() - stamp.fetched_at > Duration::hours(META_MANIFEST_TTL_HOURS) {
        return None;
    }
    serde_json::from_slice(&tokio::fs::read(file).await.ok()?).ok()
}

/// Make executables runnable and create links, once the batch completed.
pub async fn finalize_vendor_jvm(jvm: &VendorJvm) -> InstallResult<()> {
    #[cfg(unix)]
    for exe in &jvm.executables {
        use std::os::unix::fs::PermissionsExt;

        let mut perms = tokio::fs::metadata(exe)
            .await
            .map_err(|e| InstallError::io(exe, e))?
            .permissions();
        // Executable for whoever can read it
        let mode = perms.mode();
        let new_mode = mode | ((mode & 0o444) >> 2);
        if new_mode != mode {
            perms.set_mode(new_mode);
            tokio::fs::set_permissions(exe, perms)
                .await
                .map_err(|e| InstallError::io(exe, e))?;
        }
    }

    for (file, target) in &jvm.links {
        if let Err(e) = link_file(target, file).await {
            warn!("Could not link {:?} -> {:?}: {}", file, target, e);
            return Err(e);
        }
    }

    Ok(())
}

/// Symlink on unix, hard link of the resolved target elsewhere.
async fn link_file(target: &Path, file: &Path) -> InstallResult<()> {
    if let Some(parent) = file.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| InstallError::io(parent, e))?;
    }
    match tokio::fs::symlink_metadata(file).await {
        Ok(_) => tokio::fs::remove_file(file)
            .await
            .map_err(|e| InstallError::io(file, e))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(InstallError::io(file, e)),
    }

    #[cfg(unix)]
    {
        return tokio::fs::symlink(target, file)
            .await
            .map_err(|e| InstallError::io(file, e));
    }

    #[cfg(not(unix))]
    {
        let resolved = file
            .parent()
            .map(|p| p.join(target))
            .unwrap_or_else(|| target.to_path_buf());
        return tokio::fs::hard_link(&resolved, file)
            .await
            .map_err(|e| InstallError::io(file, e));
    }
}
