use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{InstallError, InstallResult};
use crate::core::java::RuntimePolicy;

/// How argument templates of a hierarchy are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentMerge {
    /// Root arguments first, then each child's, down to the leaf.
    #[default]
    Concatenate,
    /// The nearest descriptor declaring arguments replaces its ancestors'.
    LeafOverrides,
}

/// Settings of one installer, stored as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    pub versions_dir: PathBuf,
    pub libraries_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub jvm_dir: PathBuf,
    /// Parent of the per-run natives directories and loader work dirs.
    pub bin_dir: PathBuf,
    /// Game working directory, `${game_directory}`.
    pub mc_dir: PathBuf,

    pub strict_assets_check: bool,
    pub strict_libraries_check: bool,
    pub strict_jvm_check: bool,

    pub jvm_policy: RuntimePolicy,
    pub launcher_name: String,
    pub launcher_version: String,
    /// Features enabled before hooks filter them.
    pub features: BTreeSet<String>,

    pub download_concurrency: usize,
    pub network_timeout_secs: u64,
    pub processor_timeout_secs: u64,
    pub argument_merge: ArgumentMerge,
    /// Directories searched for system runtimes instead of `PATH` and `/usr/lib/jvm`.
    pub system_jvm_dirs: Option<Vec<PathBuf>>,
    /// Accept a newer major than required, for requirements above 8.
    pub allow_newer_jvm: bool,
}

impl InstallConfig {
    /// Derive every directory from a single main directory.
    pub fn new(main_dir: impl AsRef<Path>) -> Self {
        let main_dir = main_dir.as_ref();
        Self {
            versions_dir: main_dir.join("versions"),
            libraries_dir: main_dir.join("libraries"),
            assets_dir: main_dir.join("assets"),
            jvm_dir: main_dir.join("jvm"),
            bin_dir: main_dir.join("bin"),
            mc_dir: main_dir.to_path_buf(),
            strict_assets_check: false,
            strict_libraries_check: false,
            strict_jvm_check: false,
            jvm_policy: RuntimePolicy::default(),
            launcher_name: "interface-install".into(),
            launcher_version: env!("CARGO_PKG_VERSION").into(),
            features: BTreeSet::new(),
            download_concurrency: 8,
            network_timeout_secs: 30,
            processor_timeout_secs: 600,
            argument_merge: ArgumentMerge::default(),
            system_jvm_dirs: None,
            allow_newer_jvm: true,
        }
    }

    pub fn load(path: &Path) -> InstallResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| InstallError::io(path, e))?;
        let config = serde_json::from_str(&raw)?;
        debug!("Loaded install config from {:?}", path);
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> InstallResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| InstallError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| InstallError::io(path, e))
    }
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self::new(default_main_dir())
    }
}

/// Platform standard game directory.
pub fn default_main_dir() -> PathBuf {
    let base = if cfg!(target_os = "windows") {
        dirs::config_dir()
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
    } else {
        dirs::home_dir()
    }
    .unwrap_or_else(|| PathBuf::from("."));

    if cfg!(target_os = "macos") {
        base.join("minecraft")
    } else {
        base.join(".minecraft")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_derive_from_main_dir() {
        let config = InstallConfig::new("/games/mc");
        assert_eq!(config.versions_dir, PathBuf::from("/games/mc/versions"));
        assert_eq!(config.assets_dir, PathBuf::from("/games/mc/assets"));
        assert_eq!(config.mc_dir, PathBuf::from("/games/mc"));
        assert_eq!(config.jvm_policy, RuntimePolicy::SystemThenVendor);
        assert_eq!(config.download_concurrency, 8);
    }

    #[test]
    fn save_and_load_keeps_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("install.json");

        let mut config = InstallConfig::new(dir.path());
        config.strict_libraries_check = true;
        config.jvm_policy = RuntimePolicy::Static(PathBuf::from("/opt/java/bin/java"));
        config.features.insert("has_custom_resolution".into());
        config.save(&path).unwrap();

        let loaded = InstallConfig::load(&path).unwrap();
        assert!(loaded.strict_libraries_check);
        assert_eq!(loaded.jvm_policy, config.jvm_policy);
        assert!(loaded.features.contains("has_custom_resolution"));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: InstallConfig = serde_json::from_str(r#"{"strict_jvm_check": true}"#).unwrap();
        assert!(config.strict_jvm_check);
        assert_eq!(config.processor_timeout_secs, 600);
        assert_eq!(config.argument_merge, ArgumentMerge::Concatenate);
    }
}
