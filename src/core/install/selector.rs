// ─── Feature & Library Selection ───
// Computes the enabled features, the client jar, the merged library set of a
// hierarchy and the logger config, queuing whatever is missing.

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info};

use crate::core::config::InstallConfig;
use crate::core::downloader::{check_file, Batch, DownloadTask};
use crate::core::error::{InstallError, InstallResult};
use crate::core::maven::Gav;
use crate::core::platform::{os_bits, os_name};
use crate::core::version::{rules_allow, LoadedVersion};

use super::hooks::HookSet;

const ARCH_PATTERN: &str = "${arch}";

/// A library of the merged set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryEntry {
    pub gav: Gav,
    /// Path relative to the libraries dir, derived from the gav when absent.
    pub path: Option<PathBuf>,
    pub download: Option<LibraryDownload>,
    pub natives: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryDownload {
    pub url: String,
    pub size: Option<u64>,
    pub sha1: Option<String>,
}

/// Library files split between the classpath and native archives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LibraryFiles {
    pub class_files: Vec<PathBuf>,
    pub natives_files: Vec<PathBuf>,
}

/// Result of library selection.
#[derive(Debug, Clone)]
pub struct SelectedLibraries {
    pub entries: Vec<LibraryEntry>,
    /// Client jar of the leaf version, kept apart from the hookable classpath.
    pub client: PathBuf,
    pub files: LibraryFiles,
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub argument: String,
    pub file: PathBuf,
}

pub struct LibrarySelector<'a> {
    config: &'a InstallConfig,
}

impl<'a> LibrarySelector<'a> {
    pub fn new(config: &'a InstallConfig) -> Self {
        Self { config }
    }

    /// Configured features, as reshaped by the hooks.
    pub fn features(&self, hooks: &mut HookSet<'_>) -> BTreeSet<String> {
        let mut features = self.config.features.clone();
        hooks.filter_features(&mut features);
        hooks.loaded_features(&features);
        features
    }

    /// Queue the client jar of the leaf version.
    pub async fn load_client(
        &self,
        hierarchy: &[LoadedVersion],
        batch: &mut Batch,
        hooks: &mut HookSet<'_>,
    ) -> InstallResult<PathBuf> {
        let leaf = &hierarchy[0];
        let file = leaf.dir.join(format!("{}.jar", leaf.name));

        hooks.load_client();

        let download = hierarchy
            .iter()
            .find_map(|v| v.descriptor.downloads.get("client"));

        match download {
            Some(dl) => {
                let sha1 = dl
                    .sha1
                    .as_deref()
                    .filter(|_| self.config.strict_libraries_check);
                if !check_file(&file, dl.size, sha1).await? {
                    batch.push(
                        DownloadTask::new(&dl.url, &file)
                            .with_size(dl.size)
                            .with_sha1(dl.sha1.as_deref()),
                    );
                }
            }
            None if !file.is_file() => {
                return Err(InstallError::ClientNotFound {
                    version: leaf.name.clone(),
                })
            }
            None => {}
        }

        hooks.loaded_client(&file);
        Ok(file)
    }

    /// Merge the libraries of the hierarchy, leaf first, and queue missing ones.
    /// Returns the retained entries along with their files and the client jar.
    ///
    /// Files without download that are missing fail with `LibraryNotFound`,
    /// unless `pending` is given: they are then expected from a later step and
    /// recorded there.
    pub async fn load_libraries(
        &self,
        hierarchy: &[LoadedVersion],
        features: &BTreeSet<String>,
        batch: &mut Batch,
        hooks: &mut HookSet<'_>,
        mut pending: Option<&mut Vec<PathBuf>>,
    ) -> InstallResult<SelectedLibraries> {
        let client = self.load_client(hierarchy, batch, hooks).await?;

        hooks.load_libraries();

        let mut libraries = merge_libraries(hierarchy, features);

        hooks.filter_libraries(&mut libraries);
        hooks.loaded_libraries(&libraries);

        let mut files = LibraryFiles::default();
        files.class_files.push(client.clone());

        let mut queued = 0usize;
        for lib in &libraries {
            let file = match &lib.path {
                Some(path) => self.config.libraries_dir.join(path),
                None => lib.gav.file_in(&self.config.libraries_dir),
            };

            match &lib.download {
                Some(dl) => {
                    let sha1 = dl
                        .sha1
                        .as_deref()
                        .filter(|_| self.config.strict_libraries_check);
                    if !check_file(&file, dl.size, sha1).await? {
                        batch.push(
                            DownloadTask::new(&dl.url, &file)
                                .with_size(dl.size)
                                .with_sha1(dl.sha1.as_deref()),
                        );
                        queued += 1;
                    }
                }
                None if !file.is_file() => match pending.as_deref_mut() {
                    Some(pending) => {
                        debug!("Library {} expected from the loader install", lib.gav);
                        pending.push(file.clone());
                    }
                    None => {
                        return Err(InstallError::LibraryNotFound {
                            gav: lib.gav.to_string(),
                        })
                    }
                },
                None => {}
            }

            if lib.natives {
                files.natives_files.push(file);
            } else {
                files.class_files.push(file);
            }
        }

        info!(
            "Libraries: {} class files, {} natives, {} queued",
            files.class_files.len(),
            files.natives_files.len(),
            queued
        );

        hooks.filter_library_files(&mut files);
        hooks.loaded_library_files(&files);
        Ok(SelectedLibraries {
            entries: libraries,
            client,
            files,
        })
    }

    /// Queue the client logger config of the nearest version declaring one.
    pub async fn load_logger(
        &self,
        hierarchy: &[LoadedVersion],
        batch: &mut Batch,
        hooks: &mut HookSet<'_>,
    ) -> InstallResult<Option<LoggerConfig>> {
        let Some(config) = hierarchy
            .iter()
            .find_map(|v| v.descriptor.logging.get("client"))
        else {
            hooks.logger(None);
            return Ok(None);
        };

        hooks.logger(Some(&config.file.id));

        let file = self
            .config
            .assets_dir
            .join("log_configs")
            .join(&config.file.id);
        let dl = &config.file.download;
        if !check_file(&file, dl.size, dl.sha1.as_deref()).await? {
            batch.push(
                DownloadTask::new(&dl.url, &file)
                    .with_size(dl.size)
                    .with_sha1(dl.sha1.as_deref()),
            );
        }

        Ok(Some(LoggerConfig {
            argument: config.argument.clone(),
            file,
        }))
    }
}

/// Applicable libraries of the hierarchy, deduplicated on everything but the
/// version. The entry nearest to the leaf wins.
pub fn merge_libraries(hierarchy: &[LoadedVersion], features: &BTreeSet<String>) -> Vec<LibraryEntry> {
    let mut seen = HashSet::new();
    let mut libraries = Vec::new();

    for version in hierarchy {
        for lib in &version.descriptor.libraries {
            let mut gav = lib.name.clone();

            if let Some(natives) = &lib.natives {
                let (Some(os), Some(bits)) = (os_name(), os_bits()) else {
                    continue;
                };
                // No natives for this platform
                let Some(classifier) = natives.get(os) else {
                    continue;
                };
                gav = gav.with_classifier(Some(classifier.replace(ARCH_PATTERN, bits).as_str()));
            }

            if let Some(rules) = &lib.rules {
                if !rules_allow(rules, features) {
                    continue;
                }
            }

            if !seen.insert(gav.with_version("*")) {
                continue;
            }

            let natives = lib.natives.is_some();
            let artifact = if natives {
                gav.classifier
                    .as_ref()
                    .and_then(|c| lib.downloads.classifiers.get(c))
            } else {
                lib.downloads.artifact.as_ref()
            };

            let (path, download) = match (artifact, &lib.url) {
                (Some(artifact), _) => (
                    artifact.path.as_ref().map(PathBuf::from),
                    Some(LibraryDownload {
                        url: artifact.download.url.clone(),
                        size: artifact.download.size,
                        sha1: artifact.download.sha1.clone(),
                    }),
                ),
                (None, Some(repo)) if !repo.is_empty() => (
                    None,
                    Some(LibraryDownload {
                        url: gav.url(repo),
                        size: None,
                        sha1: None,
                    }),
                ),
                _ => (None, None),
            };

            libraries.push(LibraryEntry {
                gav,
                path,
                // Empty URLs are seen in the wild
                download: download.filter(|dl| !dl.url.is_empty()),
                natives,
            });
        }
    }

    libraries
}
