// ─── Hierarchy Resolver ───
// Walks `inheritsFrom` from the requested version up to its root descriptor.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::core::error::{InstallError, InstallResult};
use crate::core::install::HookSet;

use super::descriptor::VersionDescriptor;

/// A descriptor of the hierarchy with the directory it was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedVersion {
    pub name: String,
    pub dir: PathBuf,
    pub descriptor: VersionDescriptor,
}

impl LoadedVersion {
    pub fn descriptor_file(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.name))
    }
}

/// Location of the descriptor of `name` in the versions directory.
pub fn descriptor_file(versions_dir: &Path, name: &str) -> PathBuf {
    versions_dir.join(name).join(format!("{name}.json"))
}

/// Where descriptor bytes come from.
#[async_trait]
pub trait DescriptorSource: Send + Sync {
    /// Read the stored descriptor, `None` when absent.
    async fn read(&self, file: &Path) -> InstallResult<Option<Vec<u8>>> {
        match tokio::fs::read(file).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(InstallError::io(file, e)),
        }
    }

    /// Try to obtain a missing descriptor, returns whether `file` may now exist.
    async fn fetch(&self, _name: &str, _file: &Path) -> InstallResult<bool> {
        Ok(false)
    }
}

/// Descriptors read from the versions directory only.
pub struct LocalDescriptors;

#[async_trait]
impl DescriptorSource for LocalDescriptors {}

/// Resolve the descriptor chain of `root`, ordered from leaf to root.
#[instrument(skip(versions_dir, source, hooks))]
pub async fn resolve_hierarchy(
    root: &str,
    versions_dir: &Path,
    source: &dyn DescriptorSource,
    hooks: &mut HookSet<'_>,
) -> InstallResult<Vec<LoadedVersion>> {
    if root.is_empty() {
        return Err(InstallError::VersionNotFound {
            version: String::new(),
        });
    }

    hooks.load_hierarchy(root);

    let mut hierarchy = Vec::new();
    let mut visited = HashSet::new();
    let mut next = Some(root.to_string());

    while let Some(name) = next.take() {
        if !visited.insert(name.clone()) {
            return Err(InstallError::HierarchyLoop { version: name });
        }

        let dir = versions_dir.join(&name);
        let file = descriptor_file(versions_dir, &name);
        hooks.load_version(&name, &file);

        let bytes = match source.read(&file).await? {
            Some(bytes) => bytes,
            None => {
                debug!("Descriptor of {} missing at {:?}", name, file);
                // A single retry per version name.
                let retry = hooks.need_version(&name, &file) || source.fetch(&name, &file).await?;
                let retried = if retry { source.read(&file).await? } else { None };
                retried.ok_or_else(|| InstallError::VersionNotFound {
                    version: name.clone(),
                })?
            }
        };

        let descriptor: VersionDescriptor =
            serde_json::from_slice(&bytes).map_err(|source| InstallError::InvalidDescriptor {
                file: file.clone(),
                source,
            })?;

        hooks.loaded_version(&name, &file);
        next = descriptor.inherits_from.clone().filter(|parent| !parent.is_empty());
        hierarchy.push(LoadedVersion {
            name,
            dir,
            descriptor,
        });
    }

    info!(
        "Resolved hierarchy of {}: {}",
        root,
        hierarchy
            .iter()
            .map(|v| v.name.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    );
    hooks.loaded_hierarchy(&hierarchy);
    Ok(hierarchy)
}
