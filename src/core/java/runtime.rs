use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::core::config::InstallConfig;
use crate::core::downloader::{ArtifactSource, Batch};
use crate::core::error::{InstallError, InstallResult};
use crate::core::install::HookSet;
use crate::core::version::LoadedVersion;

use super::probe::{jvm_major_compatibility, parse_jvm_major_version, probe_versions, system_candidates};
use super::vendor::{default_distribution, finalize_vendor_jvm, load_vendor_jvm, VendorJvm};

/// How the runtime executable is located.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimePolicy {
    /// Use this executable as is.
    Static(PathBuf),
    System,
    Vendor,
    #[default]
    SystemThenVendor,
    VendorThenSystem,
}

/// The runtime selected for an installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedJvm {
    pub file: PathBuf,
    /// Reported version, `None` for a static runtime.
    pub version: Option<String>,
    pub compatible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JvmWarning {
    /// The vendor provides no runtime for this platform.
    UnsupportedPlatform,
    MissingDistribution { distribution: String },
    /// No compatible runtime, this one is used anyway.
    Incompatible { file: PathBuf, version: String },
}

/// Resolved runtime with the vendor files to finalize after download.
#[derive(Debug, Clone)]
pub struct LoadedJvm {
    pub resolved: ResolvedJvm,
    vendor: Option<VendorJvm>,
}

#[derive(Clone, Copy)]
enum Strategy {
    System,
    Vendor,
}

pub struct RuntimeResolver<'a> {
    config: &'a InstallConfig,
    source: &'a dyn ArtifactSource,
}

/// Major runtime version the nearest `javaVersion` asks for, 8 if none does.
pub fn required_major_version(hierarchy: &[LoadedVersion]) -> u32 {
    hierarchy
        .iter()
        .find_map(|v| v.descriptor.java_version.as_ref())
        .map_or(8, |v| v.major_version)
}

impl<'a> RuntimeResolver<'a> {
    pub fn new(config: &'a InstallConfig, source: &'a dyn ArtifactSource) -> Self {
        Self { config, source }
    }

    /// Find the runtime required by the hierarchy under the configured policy.
    #[instrument(skip_all)]
    pub async fn resolve(
        &self,
        hierarchy: &[LoadedVersion],
        batch: &mut Batch,
        hooks: &mut HookSet<'_>,
    ) -> InstallResult<LoadedJvm> {
        let java_version = hierarchy
            .iter()
            .find_map(|v| v.descriptor.java_version.as_ref());
        let major_version = required_major_version(hierarchy);
        let distribution = java_version
            .and_then(|v| v.component.as_deref())
            .or_else(|| default_distribution(major_version));

        hooks.load_jvm(major_version);

        let strategies: &[Strategy] = match &self.config.jvm_policy {
            RuntimePolicy::Static(file) => {
                let resolved = ResolvedJvm {
                    file: file.clone(),
                    version: None,
                    compatible: true,
                };
                hooks.loaded_jvm(&resolved);
                return Ok(LoadedJvm {
                    resolved,
                    vendor: None,
                });
            }
            RuntimePolicy::System => &[Strategy::System],
            RuntimePolicy::Vendor => &[Strategy::Vendor],
            RuntimePolicy::SystemThenVendor => &[Strategy::System, Strategy::Vendor],
            RuntimePolicy::VendorThenSystem => &[Strategy::Vendor, Strategy::System],
        };

        let mut fallback: Option<(u32, ResolvedJvm)> = None;

        for strategy in strategies {
            let found = match strategy {
                Strategy::System => self
                    .load_system(major_version, hooks, &mut fallback)
                    .await
                    .map(|resolved| LoadedJvm {
                        resolved,
                        vendor: None,
                    }),
                Strategy::Vendor => match distribution {
                    Some(distribution) => {
                        let mut warned = Vec::new();
                        let vendor = load_vendor_jvm(
                            self.config,
                            self.source,
                            distribution,
                            batch,
                            &mut |w: &JvmWarning| warned.push(w.clone()),
                        )
                        .await?;
                        for warning in &warned {
                            hooks.jvm_warning(warning);
                        }
                        vendor.map(|vendor| LoadedJvm {
                            resolved: ResolvedJvm {
                                file: vendor.file.clone(),
                                version: Some(vendor.version.clone()),
                                compatible: true,
                            },
                            vendor: Some(vendor),
                        })
                    }
                    None => {
                        hooks.jvm_warning(&JvmWarning::MissingDistribution {
                            distribution: format!("java {major_version}"),
                        });
                        None
                    }
                },
            };

            if let Some(jvm) = found {
                info!("Using runtime {:?}", jvm.resolved.file);
                hooks.loaded_jvm(&jvm.resolved);
                return Ok(jvm);
            }
        }

        match fallback {
            Some((_, resolved)) if !self.config.strict_jvm_check => {
                warn!(
                    "No runtime compatible with Java {}, using {:?}",
                    major_version, resolved.file
                );
                hooks.jvm_warning(&JvmWarning::Incompatible {
                    file: resolved.file.clone(),
                    version: resolved.version.clone().unwrap_or_default(),
                });
                hooks.loaded_jvm(&resolved);
                Ok(LoadedJvm {
                    resolved,
                    vendor: None,
                })
            }
            _ => Err(InstallError::JvmNotFound { major_version }),
        }
    }

    /// Best scored compatible system runtime. The incompatible one whose major
    /// version is closest to the required one is kept in `fallback`.
    async fn load_system(
        &self,
        major_version: u32,
        hooks: &mut HookSet<'_>,
        fallback: &mut Option<(u32, ResolvedJvm)>,
    ) -> Option<ResolvedJvm> {
        let probed = probe_versions(system_candidates(self.config)).await;

        let mut best: Option<(u32, ResolvedJvm)> = None;
        for jvm in probed {
            let Some(version) = jvm.version else {
                continue;
            };
            let actual = parse_jvm_major_version(&version);
            let score = actual.and_then(|actual| {
                jvm_major_compatibility(major_version, actual, self.config.allow_newer_jvm)
            });
            hooks.found_jvm(&jvm.file, &version, score.is_some());

            let resolved = ResolvedJvm {
                file: jvm.file,
                version: Some(version),
                compatible: score.is_some(),
            };
            match score {
                Some(score) if best.as_ref().map_or(true, |(min, _)| score < *min) => {
                    best = Some((score, resolved));
                }
                Some(_) => {}
                None => {
                    let distance = actual.map_or(u32::MAX, |actual| actual.abs_diff(major_version));
                    if fallback.as_ref().map_or(true, |(closest, _)| distance < *closest) {
                        *fallback = Some((distance, resolved));
                    }
                }
            }
        }

        best.map(|(_, resolved)| resolved)
    }

    /// Complete vendor runtime files once the download batch is done.
    pub async fn finalize(&self, jvm: &LoadedJvm) -> InstallResult<()> {
        match &jvm.vendor {
            Some(vendor) => finalize_vendor_jvm(vendor).await,
            None => Ok(()),
        }
    }
}
