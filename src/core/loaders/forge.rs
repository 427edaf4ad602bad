// ─── Forge / NeoForge Installer ───
// Unpacks a loader installer into a version descriptor, its libraries and the
// processor chain that completes the install once downloads are done.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::core::downloader::{check_file, fetch_bytes, Batch, DownloadTask};
use crate::core::error::{DownloadFailureReason, InstallError, InstallResult};
use crate::core::maven::{Gav, FORGE_MAVEN, MOJANG_LIBRARIES, NEOFORGE_MAVEN};
use crate::core::version::descriptor_file;

use super::context::{StepContext, StepState};
use super::processor::{DataEntry, InstallWorkDir, ProcessorExecutor, ProcessorTask};

type Archive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoaderKind {
    Forge,
    NeoForge,
}

impl LoaderKind {
    fn prefix(self) -> &'static str {
        match self {
            LoaderKind::Forge => "forge",
            LoaderKind::NeoForge => "neoforge",
        }
    }
}

impl fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoaderKind::Forge => "Forge",
            LoaderKind::NeoForge => "NeoForge",
        })
    }
}

/// A loader release, e.g. Forge `1.20.1-47.2.0` or NeoForge `21.1.77`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderSpec {
    pub kind: LoaderKind,
    pub version: String,
    game_version: String,
}

impl LoaderSpec {
    pub fn new(kind: LoaderKind, version: &str) -> InstallResult<Self> {
        let game_version = match kind {
            LoaderKind::Forge => version.split_once('-').map(|(game, _)| game.to_string()),
            LoaderKind::NeoForge => neoforge_game_version(version),
        };
        let game_version = game_version
            .filter(|game| !game.is_empty())
            .ok_or_else(|| InstallError::InstallProfile {
                reason: format!("cannot tell the game version of {kind} {version}"),
            })?;

        Ok(Self {
            kind,
            version: version.to_string(),
            game_version,
        })
    }

    pub fn game_version(&self) -> &str {
        &self.game_version
    }

    /// Name of the installed descriptor, `forge-<version>` or `neoforge-<version>`.
    pub fn root_version(&self) -> String {
        format!("{}-{}", self.kind.prefix(), self.version)
    }

    pub fn installer_gav(&self) -> Gav {
        let (group, artifact) = match self.kind {
            LoaderKind::Forge => ("net.minecraftforge", "forge"),
            // Releases for 1.20.1 kept the Forge coordinates
            LoaderKind::NeoForge if self.version.starts_with("1.20.1-") => ("net.neoforged", "forge"),
            LoaderKind::NeoForge => ("net.neoforged", "neoforge"),
        };
        Gav {
            group_id: group.to_string(),
            artifact_id: artifact.to_string(),
            version: self.version.clone(),
            classifier: Some("installer".to_string()),
            extension: "jar".to_string(),
        }
    }

    pub fn repository(&self) -> &'static str {
        match self.kind {
            LoaderKind::Forge => FORGE_MAVEN,
            LoaderKind::NeoForge => NEOFORGE_MAVEN,
        }
    }

    pub fn installer_url(&self) -> String {
        self.installer_gav().url(self.repository())
    }
}

/// `21.1.77` targets `1.21.1`, `21.0.x` targets `1.21`, `1.20.1-47.1.x` targets `1.20.1`.
fn neoforge_game_version(version: &str) -> Option<String> {
    if version.starts_with("1.") {
        return version.split_once('-').map(|(game, _)| game.to_string());
    }
    let mut parts = version.split('.');
    let major: u32 = parts.next()?.parse().ok()?;
    let minor: u32 = parts.next()?.parse().ok()?;
    Some(match minor {
        0 => format!("1.{major}"),
        _ => format!("1.{major}.{minor}"),
    })
}

// ── Install profile ─────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InstallerProfile {
    Modern(ModernProfile),
    Legacy(LegacyProfile),
}

/// `install_profile.json` of installers from 1.12.2 onward.
#[derive(Debug, Deserialize)]
struct ModernProfile {
    minecraft: String,
    json: String,
    #[serde(default)]
    path: Option<Gav>,
    #[serde(default)]
    libraries: Vec<ProfileLibrary>,
    #[serde(default)]
    processors: Vec<ProfileProcessor>,
    #[serde(default)]
    data: HashMap<String, SidedValue>,
}

#[derive(Debug, Deserialize)]
struct ProfileLibrary {
    name: Gav,
    #[serde(default)]
    downloads: ProfileDownloads,
}

#[derive(Debug, Default, Deserialize)]
struct ProfileDownloads {
    #[serde(default)]
    artifact: Option<ProfileArtifact>,
}

#[derive(Debug, Default, Deserialize)]
struct ProfileArtifact {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    sha1: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ProfileProcessor {
    jar: Gav,
    #[serde(default)]
    sides: Option<Vec<String>>,
    #[serde(default)]
    classpath: Vec<Gav>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    outputs: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct SidedValue {
    #[serde(default)]
    client: Option<String>,
}

/// Profile of the old installers, the descriptor is embedded as `versionInfo`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyProfile {
    install: LegacyInstall,
    version_info: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyInstall {
    minecraft: String,
    path: Gav,
    file_path: String,
}

// ── Prepare ─────────────────────────────────────────────

/// A loader unpacked by this run, waiting for its processors.
#[derive(Debug)]
pub struct PreparedLoader {
    pub work_dir: InstallWorkDir,
    pub tasks: Vec<ProcessorTask>,
    /// Profile library files by gav.
    pub libraries: HashMap<Gav, PathBuf>,
    pub data: HashMap<String, DataEntry>,
}

/// Unpack the installer of `spec` unless its descriptor is already installed.
///
/// Writes the loader descriptor, extracts the libraries embedded in the
/// installer and queues the downloadable ones into `batch`.
#[instrument(skip_all, fields(loader = %spec.root_version()))]
pub async fn prepare_loader(
    spec: &LoaderSpec,
    ctx: &mut StepContext<'_, '_>,
    state: &mut StepState,
    batch: &mut Batch,
) -> InstallResult<()> {
    let root = spec.root_version();
    state.root = root.clone();

    let descriptor_path = descriptor_file(&ctx.config.versions_dir, &root);
    if descriptor_path.is_file() {
        debug!("{} already installed at {:?}", root, descriptor_path);
        return Ok(());
    }

    info!("Installing {} {} for {}", spec.kind, spec.version, spec.game_version());

    let url = spec.installer_url();
    ctx.hooks.fetch_installer(&url);
    let installer = fetch_bytes(ctx.source, &url).await.map_err(|e| match e {
        InstallError::Download { failures }
            if failures
                .iter()
                .any(|f| f.reason == DownloadFailureReason::Status(404)) =>
        {
            InstallError::InstallerNotFound { url: url.clone() }
        }
        other => other,
    })?;
    ctx.hooks.fetched_installer(&url);

    let work_dir = InstallWorkDir::create(ctx.config.bin_dir.join(format!("{root}-install"))).await?;
    let installer_file = work_dir.path().join("installer.jar");
    write_file(&installer_file, &installer).await?;

    let mut archive = zip::ZipArchive::new(Cursor::new(installer.as_slice()))?;
    let profile: InstallerProfile = serde_json::from_slice(&read_entry(&mut archive, "install_profile.json")?)
        .map_err(|e| InstallError::InstallProfile {
            reason: format!("unreadable install_profile.json: {e}"),
        })?;

    let libs = &ctx.config.libraries_dir;
    let prepared = match profile {
        InstallerProfile::Modern(profile) => {
            check_target(spec, &profile.minecraft)?;

            let mut descriptor: serde_json::Value =
                serde_json::from_slice(&read_entry(&mut archive, profile.json.trim_start_matches('/'))?)?;
            complete_descriptor(&mut descriptor, &root, spec.game_version());
            write_descriptor(&descriptor_path, &descriptor).await?;
            state.written_descriptor = Some(descriptor_path);

            if let Some(path) = &profile.path {
                extract_entry(&mut archive, &maven_entry(path), &path.file_in(libs)).await?;
            }

            let libraries = prepare_libraries(&profile.libraries, &mut archive, libs, ctx.config.strict_libraries_check, batch).await?;

            let mut data = HashMap::new();
            for (name, value) in &profile.data {
                let Some(value) = &value.client else {
                    continue;
                };
                let entry = data_entry(value, &mut archive, work_dir.path()).await?;
                data.insert(name.clone(), entry);
            }
            data.insert("SIDE".into(), DataEntry::Literal("client".into()));
            data.insert("MINECRAFT_VERSION".into(), DataEntry::Literal(spec.game_version().to_string()));
            data.insert("ROOT".into(), DataEntry::File(ctx.config.mc_dir.clone()));
            data.insert("INSTALLER".into(), DataEntry::File(installer_file));
            data.insert("LIBRARY_DIR".into(), DataEntry::File(libs.clone()));

            let tasks: Vec<ProcessorTask> = profile
                .processors
                .into_iter()
                .filter(|p| p.sides.as_ref().map_or(true, |sides| sides.iter().any(|s| s == "client")))
                .map(|p| ProcessorTask {
                    jar: p.jar,
                    classpath: p.classpath,
                    args: p.args,
                    outputs: p.outputs.into_iter().collect(),
                })
                .collect();

            info!(
                "{}: {} libraries, {} client processors",
                root,
                libraries.len(),
                tasks.len()
            );
            PreparedLoader {
                work_dir,
                tasks,
                libraries,
                data,
            }
        }
        InstallerProfile::Legacy(profile) => {
            check_target(spec, &profile.install.minecraft)?;

            let mut descriptor = profile.version_info;
            complete_descriptor(&mut descriptor, &root, spec.game_version());
            if let Some(libraries) = descriptor
                .get_mut("libraries")
                .and_then(serde_json::Value::as_array_mut)
            {
                for lib in libraries.iter_mut().filter_map(serde_json::Value::as_object_mut) {
                    lib.entry("url")
                        .or_insert_with(|| serde_json::Value::from(MOJANG_LIBRARIES));
                }
            }
            write_descriptor(&descriptor_path, &descriptor).await?;
            state.written_descriptor = Some(descriptor_path);

            let universal = profile.install.path.file_in(libs);
            if !extract_entry(&mut archive, &profile.install.file_path, &universal).await? {
                return Err(InstallError::InstallProfile {
                    reason: format!("missing {} in the installer", profile.install.file_path),
                });
            }

            info!("{}: legacy installer, no processors", root);
            PreparedLoader {
                work_dir,
                tasks: Vec::new(),
                libraries: HashMap::new(),
                data: HashMap::new(),
            }
        }
    };

    state.loader = Some(prepared);
    Ok(())
}

fn check_target(spec: &LoaderSpec, minecraft: &str) -> InstallResult<()> {
    if minecraft == spec.game_version() {
        Ok(())
    } else {
        Err(InstallError::InstallProfile {
            reason: format!(
                "installer targets {}, expected {}",
                minecraft,
                spec.game_version()
            ),
        })
    }
}

/// Name the descriptor after the installed version and link it to the game.
fn complete_descriptor(descriptor: &mut serde_json::Value, root: &str, game_version: &str) {
    let Some(object) = descriptor.as_object_mut() else {
        return;
    };
    object.insert("id".into(), root.into());
    let inherits = object
        .get("inheritsFrom")
        .and_then(serde_json::Value::as_str)
        .is_some_and(|parent| !parent.is_empty());
    if !inherits {
        object.insert("inheritsFrom".into(), game_version.into());
    }
}

async fn prepare_libraries(
    libraries: &[ProfileLibrary],
    archive: &mut Archive<'_>,
    libs: &Path,
    strict: bool,
    batch: &mut Batch,
) -> InstallResult<HashMap<Gav, PathBuf>> {
    let mut seen = HashSet::new();
    let mut files = HashMap::new();

    for lib in libraries {
        if !seen.insert(&lib.name) {
            continue;
        }

        let artifact = lib.downloads.artifact.as_ref();
        let file = match artifact.and_then(|a| a.path.as_deref()) {
            Some(path) => libs.join(path),
            None => lib.name.file_in(libs),
        };

        match artifact.filter(|a| !a.url.is_empty()) {
            Some(artifact) => {
                let sha1 = artifact.sha1.as_deref().filter(|_| strict);
                if !check_file(&file, artifact.size, sha1).await? {
                    batch.push(
                        DownloadTask::new(&artifact.url, &file)
                            .with_size(artifact.size)
                            .with_sha1(artifact.sha1.as_deref()),
                    );
                }
            }
            None => {
                if !extract_entry(archive, &maven_entry(&lib.name), &file).await? {
                    return Err(InstallError::LibraryNotFound {
                        gav: lib.name.to_string(),
                    });
                }
            }
        }

        files.insert(lib.name.clone(), file);
    }

    Ok(files)
}

/// `[gav]` is a library, `'text'` a literal, anything else an installer file.
async fn data_entry(value: &str, archive: &mut Archive<'_>, work_dir: &Path) -> InstallResult<DataEntry> {
    if let Some(coord) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
        return Ok(DataEntry::Library(Gav::parse(coord)?));
    }
    if let Some(literal) = value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
        return Ok(DataEntry::Literal(literal.to_string()));
    }

    let name = value.trim_start_matches('/');
    let dest = work_dir.join(name);
    if !extract_entry(archive, name, &dest).await? {
        return Err(InstallError::InstallProfile {
            reason: format!("missing data file {value} in the installer"),
        });
    }
    Ok(DataEntry::File(dest))
}

fn maven_entry(gav: &Gav) -> String {
    format!("maven/{}", gav.url_path())
}

fn read_entry(archive: &mut Archive<'_>, name: &str) -> InstallResult<Vec<u8>> {
    let mut entry = archive.by_name(name).map_err(|_| InstallError::InstallProfile {
        reason: format!("missing {name} in the installer"),
    })?;
    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| InstallError::io(name, e))?;
    Ok(bytes)
}

/// Copy an archive entry to `dest`, `false` when the entry does not exist.
async fn extract_entry(archive: &mut Archive<'_>, name: &str, dest: &Path) -> InstallResult<bool> {
    if archive.index_for_name(name).is_none() {
        return Ok(false);
    }
    let bytes = read_entry(archive, name)?;
    write_file(dest, &bytes).await?;
    debug!("Extracted {} to {:?}", name, dest);
    Ok(true)
}

async fn write_file(dest: &Path, bytes: &[u8]) -> InstallResult<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| InstallError::io(parent, e))?;
    }
    tokio::fs::write(dest, bytes)
        .await
        .map_err(|e| InstallError::io(dest, e))
}

async fn write_descriptor(file: &Path, descriptor: &serde_json::Value) -> InstallResult<()> {
    write_file(file, &serde_json::to_vec_pretty(descriptor)?).await
}

// ── Complete ────────────────────────────────────────────

/// Run the processors of the loader prepared by this run, if any.
pub async fn complete_loader(ctx: &mut StepContext<'_, '_>, state: &mut StepState) -> InstallResult<()> {
    let Some(loader) = state.loader.take() else {
        return Ok(());
    };
    let Some(client) = &state.client_file else {
        return Err(InstallError::ClientNotFound {
            version: state.root.clone(),
        });
    };
    let Some(jvm) = &state.jvm_file else {
        return Err(InstallError::JvmNotFound {
            major_version: state.jvm_major_version,
        });
    };

    let mut data = loader.data;
    data.insert("MINECRAFT_JAR".into(), DataEntry::File(client.clone()));

    let executor = ProcessorExecutor {
        runner: ctx.runner,
        jvm,
        libraries_dir: &ctx.config.libraries_dir,
        libraries: &loader.libraries,
        data: &data,
        timeout: Duration::from_secs(ctx.config.processor_timeout_secs),
    };
    executor.run_all(&loader.tasks, &loader.work_dir, ctx.hooks).await?;

    if let Some(missing) = state.pending.iter().find(|file| !file.is_file()) {
        return Err(InstallError::LibraryNotFound {
            gav: missing.display().to_string(),
        });
    }

    loader.work_dir.release().await?;
    info!("Loader {} installed", state.root);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::InstallConfig;
    use crate::core::downloader::sha1_hex;
    use crate::core::install::HookSet;
    use crate::core::testing::{success, zip_bytes, MemorySource, ScriptedRunner};
    use serde_json::json;

    #[test]
    fn derives_versions_and_coordinates() {
        let forge = LoaderSpec::new(LoaderKind::Forge, "1.20.1-47.2.0").unwrap();
        assert_eq!(forge.game_version(), "1.20.1");
        assert_eq!(forge.root_version(), "forge-1.20.1-47.2.0");
        assert_eq!(
            forge.installer_url(),
            "https://maven.minecraftforge.net/net/minecraftforge/forge/1.20.1-47.2.0/forge-1.20.1-47.2.0-installer.jar"
        );

        let neo = LoaderSpec::new(LoaderKind::NeoForge, "21.1.77").unwrap();
        assert_eq!(neo.game_version(), "1.21.1");
        assert_eq!(neo.root_version(), "neoforge-21.1.77");
        assert_eq!(neo.installer_gav().to_string(), "net.neoforged:neoforge:21.1.77:installer");

        assert_eq!(LoaderSpec::new(LoaderKind::NeoForge, "21.0.167").unwrap().game_version(), "1.21");
        let old_neo = LoaderSpec::new(LoaderKind::NeoForge, "1.20.1-47.1.106").unwrap();
        assert_eq!(old_neo.game_version(), "1.20.1");
        assert_eq!(old_neo.installer_gav().artifact_id, "forge");

        assert!(LoaderSpec::new(LoaderKind::Forge, "47.2.0").is_err());
        assert!(LoaderSpec::new(LoaderKind::NeoForge, "latest").is_err());
    }

    struct Fixture {
        dir: tempfile::TempDir,
        config: InstallConfig,
        source: MemorySource,
        spec: LoaderSpec,
    }

    fn fixture(installer: Option<Vec<u8>>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = InstallConfig::new(dir.path());
        let spec = LoaderSpec::new(LoaderKind::Forge, "1.20.1-47.2.0").unwrap();
        let source = MemorySource::new();
        if let Some(installer) = installer {
            source.insert(&spec.installer_url(), installer);
        }
        Fixture {
            dir,
            config,
            source,
            spec,
        }
    }

    fn modern_installer() -> Vec<u8> {
        let profile = json!({
            "minecraft": "1.20.1",
            "json": "/version.json",
            "path": "net.minecraftforge:forge:1.20.1-47.2.0:shim",
            "data": {
                "MAPPINGS": {"client": "[de.oceanlabs.mcp:mcp_config:1.20.1-20230612.114412:mappings@txt]", "server": "x"},
                "PATCHED_SHA": {"client": "'0123abcd'", "server": "'ffff'"},
                "BINPATCH": {"client": "/data/client.lzma", "server": "/data/server.lzma"},
                "SERVER_ONLY": {"server": "'x'"}
            },
            "processors": [
                {"sides": ["server"], "jar": "net.minecraftforge:installertools:1.3.0", "args": ["--task", "EXTRACT_SERVER"]},
                {"jar": "net.minecraftforge:binarypatcher:1.1.1", "args": ["--patch", "{BINPATCH}"], "outputs": {"{PATCHED}": "{PATCHED_SHA}"}}
            ],
            "libraries": [
                {"name": "net.minecraftforge:binarypatcher:1.1.1", "downloads": {"artifact": {
                    "path": "net/minecraftforge/binarypatcher/1.1.1/binarypatcher-1.1.1.jar",
                    "url": "https://maven.minecraftforge.net/net/minecraftforge/binarypatcher/1.1.1/binarypatcher-1.1.1.jar",
                    "sha1": sha1_hex(b"patcher"), "size": 7
                }}},
                {"name": "net.minecraftforge:binarypatcher:1.1.1"},
                {"name": "net.minecraftforge:forge:1.20.1-47.2.0:universal", "downloads": {"artifact": {
                    "path": "net/minecraftforge/forge/1.20.1-47.2.0/forge-1.20.1-47.2.0-universal.jar", "url": ""
                }}}
            ]
        });
        let version = json!({
            "id": "1.20.1-forge-47.2.0",
            "inheritsFrom": "1.20.1",
            "mainClass": "cpw.mods.bootstraplauncher.BootstrapLauncher"
        });
        zip_bytes(&[
            ("install_profile.json", profile.to_string().as_bytes()),
            ("version.json", version.to_string().as_bytes()),
            ("data/client.lzma", b"binpatch"),
            ("maven/net/minecraftforge/forge/1.20.1-47.2.0/forge-1.20.1-47.2.0-shim.jar", b"shim"),
            ("maven/net/minecraftforge/forge/1.20.1-47.2.0/forge-1.20.1-47.2.0-universal.jar", b"universal"),
        ])
    }

    #[tokio::test]
    async fn unpacks_modern_installer() {
        let f = fixture(Some(modern_installer()));
        let runner = ScriptedRunner::new(|_| success());
        let mut fetched = Vec::new();
        let mut hooks = HookSet::new().on_fetched_installer(|url| fetched.push(url.to_string()));
        let mut ctx = StepContext {
            config: &f.config,
            source: &f.source,
            runner: &runner,
            hooks: &mut hooks,
        };
        let mut state = StepState::new("1.20.1-47.2.0");
        let mut batch = Batch::new();

        prepare_loader(&f.spec, &mut ctx, &mut state, &mut batch).await.unwrap();
        drop(ctx);
        drop(hooks);

        assert_eq!(fetched, vec![f.spec.installer_url()]);
        assert_eq!(state.root, "forge-1.20.1-47.2.0");

        let descriptor_path = descriptor_file(&f.config.versions_dir, "forge-1.20.1-47.2.0");
        assert_eq!(state.written_descriptor.as_ref(), Some(&descriptor_path));
        let descriptor: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&descriptor_path).unwrap()).unwrap();
        assert_eq!(descriptor["id"], "forge-1.20.1-47.2.0");
        assert_eq!(descriptor["inheritsFrom"], "1.20.1");

        let libs = &f.config.libraries_dir;
        assert_eq!(
            std::fs::read(libs.join("net/minecraftforge/forge/1.20.1-47.2.0/forge-1.20.1-47.2.0-universal.jar")).unwrap(),
            b"universal"
        );
        assert!(libs.join("net/minecraftforge/forge/1.20.1-47.2.0/forge-1.20.1-47.2.0-shim.jar").is_file());

        // Duplicate declaration queued once
        assert_eq!(batch.len(), 1);
        assert!(batch.tasks()[0].url.ends_with("binarypatcher-1.1.1.jar"));

        let loader = state.loader.as_ref().unwrap();
        assert_eq!(loader.tasks.len(), 1);
        assert_eq!(loader.tasks[0].name(), "patch_binary");
        assert_eq!(loader.libraries.len(), 2);
        assert!(!loader.data.contains_key("SERVER_ONLY"));
        assert_eq!(loader.data["PATCHED_SHA"], DataEntry::Literal("0123abcd".into()));
        assert_eq!(loader.data["SIDE"], DataEntry::Literal("client".into()));
        assert!(matches!(loader.data["MAPPINGS"], DataEntry::Library(ref gav) if gav.extension == "txt"));
        let DataEntry::File(binpatch) = &loader.data["BINPATCH"] else {
            panic!("binpatch should be a file");
        };
        assert_eq!(std::fs::read(binpatch).unwrap(), b"binpatch");
        assert!(binpatch.starts_with(loader.work_dir.path()));
    }

    #[tokio::test]
    async fn installed_loader_is_not_fetched_again() {
        let f = fixture(Some(modern_installer()));
        crate::core::testing::write_descriptor(
            &f.config.versions_dir,
            "forge-1.20.1-47.2.0",
            &json!({"id": "forge-1.20.1-47.2.0"}),
        );
        let runner = ScriptedRunner::new(|_| success());
        let mut hooks = HookSet::new();
        let mut ctx = StepContext {
            config: &f.config,
            source: &f.source,
            runner: &runner,
            hooks: &mut hooks,
        };
        let mut state = StepState::new("1.20.1-47.2.0");

        prepare_loader(&f.spec, &mut ctx, &mut state, &mut Batch::new()).await.unwrap();
        assert_eq!(state.root, "forge-1.20.1-47.2.0");
        assert!(state.loader.is_none());
        assert!(f.source.requests().is_empty());
    }

    #[test]
    fn unreadable_entries_name_the_entry() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        writer.start_file("version.json", options).unwrap();
        std::io::Write::write_all(&mut writer, br#"{"id": "forge"}"#).unwrap();
        let mut bytes = writer.finish().unwrap().into_inner();

        // Break the stored data so its checksum fails
        let pos = bytes.windows(5).position(|w| w == b"forge").unwrap();
        bytes[pos] = b'F';

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let err = read_entry(&mut archive, "version.json").unwrap_err();
        assert!(matches!(err, InstallError::Io { ref path, .. } if path == Path::new("version.json")));
    }

    #[tokio::test]
    async fn completion_requires_client_and_runtime() {
        let f = fixture(Some(modern_installer()));
        let runner = ScriptedRunner::new(|_| success());
        let mut hooks = HookSet::new();
        let mut ctx = StepContext {
            config: &f.config,
            source: &f.source,
            runner: &runner,
            hooks: &mut hooks,
        };
        let mut state = StepState::new("1.20.1-47.2.0");
        prepare_loader(&f.spec, &mut ctx, &mut state, &mut Batch::new()).await.unwrap();
        let work_dir = state.loader.as_ref().unwrap().work_dir.path().to_path_buf();

        let err = complete_loader(&mut ctx, &mut state).await.unwrap_err();
        assert!(matches!(err, InstallError::ClientNotFound { ref version } if version == "forge-1.20.1-47.2.0"));
        assert!(runner.calls().is_empty());
        assert!(work_dir.is_dir());

        std::fs::remove_file(state.written_descriptor.take().unwrap()).unwrap();
        prepare_loader(&f.spec, &mut ctx, &mut state, &mut Batch::new()).await.unwrap();
        state.client_file = Some(f.config.versions_dir.join("forge-1.20.1-47.2.0/forge-1.20.1-47.2.0.jar"));
        state.jvm_major_version = 17;
        let err = complete_loader(&mut ctx, &mut state).await.unwrap_err();
        assert!(matches!(err, InstallError::JvmNotFound { major_version: 17 }));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_installer_is_reported_with_its_url() {
        let f = fixture(None);
        let runner = ScriptedRunner::new(|_| success());
        let mut hooks = HookSet::new();
        let mut ctx = StepContext {
            config: &f.config,
            source: &f.source,
            runner: &runner,
            hooks: &mut hooks,
        };
        let mut state = StepState::new("1.20.1-47.2.0");

        let err = prepare_loader(&f.spec, &mut ctx, &mut state, &mut Batch::new())
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::InstallerNotFound { ref url } if *url == f.spec.installer_url()));
        assert!(!f.dir.path().join("versions").join("forge-1.20.1-47.2.0").exists());
    }

    #[tokio::test]
    async fn unpacks_legacy_installer() {
        let profile = json!({
            "install": {
                "minecraft": "1.7.10",
                "path": "net.minecraftforge:forge:1.7.10-10.13.4.1614-1.7.10",
                "filePath": "forge-1.7.10-10.13.4.1614-1.7.10-universal.jar"
            },
            "versionInfo": {
                "id": "1.7.10-Forge10.13.4.1614-1.7.10",
                "mainClass": "net.minecraft.launchwrapper.Launch",
                "minecraftArguments": "--username ${auth_player_name}",
                "libraries": [
                    {"name": "net.minecraft:launchwrapper:1.12"},
                    {"name": "org.ow2.asm:asm-all:5.0.3", "url": "https://maven.minecraftforge.net/"}
                ]
            }
        });
        let installer = zip_bytes(&[
            ("install_profile.json", profile.to_string().as_bytes()),
            ("forge-1.7.10-10.13.4.1614-1.7.10-universal.jar", b"universal"),
        ]);
        let mut f = fixture(None);
        f.spec = LoaderSpec::new(LoaderKind::Forge, "1.7.10-10.13.4.1614-1.7.10").unwrap();
        f.source.insert(&f.spec.installer_url(), installer);

        let runner = ScriptedRunner::new(|_| success());
        let mut hooks = HookSet::new();
        let mut ctx = StepContext {
            config: &f.config,
            source: &f.source,
            runner: &runner,
            hooks: &mut hooks,
        };
        let mut state = StepState::new("1.7.10-10.13.4.1614-1.7.10");
        prepare_loader(&f.spec, &mut ctx, &mut state, &mut Batch::new()).await.unwrap();

        let root = "forge-1.7.10-10.13.4.1614-1.7.10";
        let descriptor: serde_json::Value = serde_json::from_slice(
            &std::fs::read(descriptor_file(&f.config.versions_dir, root)).unwrap(),
        )
        .unwrap();
        assert_eq!(descriptor["id"], root);
        assert_eq!(descriptor["inheritsFrom"], "1.7.10");
        assert_eq!(descriptor["libraries"][0]["url"], MOJANG_LIBRARIES);
        assert_eq!(descriptor["libraries"][1]["url"], "https://maven.minecraftforge.net/");

        let universal = Gav::parse("net.minecraftforge:forge:1.7.10-10.13.4.1614-1.7.10")
            .unwrap()
            .file_in(&f.config.libraries_dir);
        assert_eq!(std::fs::read(universal).unwrap(), b"universal");
        assert!(state.loader.as_ref().unwrap().tasks.is_empty());
    }

    #[tokio::test]
    async fn mismatched_game_version_is_rejected() {
        let f = fixture(None);
        let spec = LoaderSpec::new(LoaderKind::Forge, "1.20.2-48.0.0").unwrap();
        f.source.insert(&spec.installer_url(), modern_installer());
        let runner = ScriptedRunner::new(|_| success());
        let mut hooks = HookSet::new();
        let mut ctx = StepContext {
            config: &f.config,
            source: &f.source,
            runner: &runner,
            hooks: &mut hooks,
        };
        let err = prepare_loader(&spec, &mut ctx, &mut StepState::new("x"), &mut Batch::new())
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::InstallProfile { .. }));
    }
}
