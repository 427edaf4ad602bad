// ─── Installation Pipeline ───
// Drives the stages of an install: variant pre steps, hierarchy, libraries,
// logger, assets, runtime, downloads, variant post steps, natives and
// arguments, ending with an InstallationPlan.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Client;
use tracing::{info, instrument, warn};

use crate::core::assets::AssetManager;
use crate::core::auth::Account;
use crate::core::config::InstallConfig;
use crate::core::downloader::{ArtifactFetcher, ArtifactSource, Batch, CancelFlag, DownloadProgress, HttpSource};
use crate::core::error::{InstallError, InstallResult};
use crate::core::http::build_http_client;
use crate::core::java::{required_major_version, RuntimeResolver};
use crate::core::loaders::{
    CommandRunner, Flavor, PostStep, PreStep, Specialization, StepContext, StepState, ToolRunner,
};
use crate::core::version::{resolve_hierarchy, DescriptorSource};

use super::hooks::HookSet;
use super::natives::finalize_libraries;
use super::plan::{collect_arguments, replace_placeholders, InstallationPlan, Placeholders};
use super::selector::{LibrarySelector, SelectedLibraries};

/// Installs versions of one flavor into the directories of a config.
pub struct Installer {
    config: InstallConfig,
    flavor: Flavor,
    source: Arc<dyn ArtifactSource>,
    runner: Arc<dyn ToolRunner>,
    /// Client of the default HTTP source, `None` once a source is injected.
    client: Option<Client>,
    account: Option<Account>,
}

impl Installer {
    pub fn new(config: InstallConfig, flavor: Flavor) -> InstallResult<Self> {
        let client = build_http_client(&config)?;
        Ok(Self {
            source: Arc::new(HttpSource::new(client.clone())),
            runner: Arc::new(CommandRunner),
            client: Some(client),
            account: None,
            config,
            flavor,
        })
    }

    /// Fetch artifacts from `source` instead of HTTP.
    pub fn with_source(mut self, source: Arc<dyn ArtifactSource>) -> Self {
        self.source = source;
        self.client = None;
        self
    }

    pub fn with_tool_runner(mut self, runner: Arc<dyn ToolRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Authenticate requests to the hosts the account authorizes and fill
    /// the `${auth_*}` arguments.
    pub fn with_account(mut self, account: Account) -> Self {
        if let Some(client) = &self.client {
            self.source = Arc::new(HttpSource::new(client.clone()).with_account(Some(account.clone())));
        }
        self.account = Some(account);
        self
    }

    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    pub async fn install(&self, version: &str, hooks: HookSet<'_>) -> InstallResult<InstallationPlan> {
        self.install_with_cancel(version, hooks, &CancelFlag::new()).await
    }

    /// Install `version`, the download stage stops early once `cancel` is raised.
    #[instrument(skip(self, hooks, cancel))]
    pub async fn install_with_cancel<'h>(
        &self,
        version: &str,
        hooks: HookSet<'h>,
        cancel: &CancelFlag,
    ) -> InstallResult<InstallationPlan> {
        let Specialization {
            hooks: variant_hooks,
            descriptors,
            pre,
            post,
            placeholders,
        } = self.flavor.specialize(version, self.source.clone())?;

        // Variant hooks run before the caller's
        let variant_hooks: HookSet<'h> = variant_hooks;
        let mut hooks = variant_hooks.merge(hooks);
        let mut state = StepState::new(version);

        let stages = Stages {
            descriptors: descriptors.as_ref(),
            pre: &pre,
            post: &post,
            placeholders: &placeholders,
        };
        let result = self.run(stages, &mut hooks, &mut state, cancel).await;

        if let Err(e) = &result {
            if let Some(file) = &state.written_descriptor {
                warn!("Install of {} failed ({}), removing {:?}", state.root, e, file);
                if let Err(e) = tokio::fs::remove_file(file).await {
                    warn!("Failed to remove {:?}: {}", file, e);
                }
            }
        }
        result
    }

    async fn run(
        &self,
        stages: Stages<'_>,
        hooks: &mut HookSet<'_>,
        state: &mut StepState,
        cancel: &CancelFlag,
    ) -> InstallResult<InstallationPlan> {
        let config = &self.config;
        let source = self.source.as_ref();
        let mut batch = Batch::new();

        let mut ctx = StepContext {
            config,
            source,
            runner: self.runner.as_ref(),
            hooks: &mut *hooks,
        };
        for step in stages.pre {
            step.run(&mut ctx, state, &mut batch).await?;
        }
        let root = state.root.clone();

        // ── Metadata ──
        let selector = LibrarySelector::new(config);
        let features = selector.features(hooks);
        let hierarchy = resolve_hierarchy(&root, &config.versions_dir, stages.descriptors, hooks).await?;

        let pending = state.loader.is_some().then_some(&mut state.pending);
        let SelectedLibraries {
            entries: libraries,
            client,
            mut files,
        } = selector
            .load_libraries(&hierarchy, &features, &mut batch, hooks, pending)
            .await?;
        let logger = selector.load_logger(&hierarchy, &mut batch, hooks).await?;
        let assets = AssetManager::load(config, source, &hierarchy, &mut batch, hooks).await?;
        let runtime = RuntimeResolver::new(config, source);
        let jvm = runtime.resolve(&hierarchy, &mut batch, hooks).await?;

        let main_class = hierarchy
            .iter()
            .find_map(|v| v.descriptor.main_class.clone())
            .ok_or_else(|| InstallError::MainClassNotFound {
                version: root.clone(),
            })?;

        // ── Downloads ──
        if !batch.is_empty() {
            hooks.download_resources(cancel);
            if cancel.is_cancelled() {
                info!("Download of {} resources cancelled before start", batch.len());
                return Err(InstallError::DownloadResourcesCancelled);
            }
            ArtifactFetcher::new(source)
                .with_concurrency(config.download_concurrency)
                .fetch_all(batch, cancel, &mut |progress: &DownloadProgress| {
                    hooks.download_progress(progress)
                })
                .await?;
            hooks.downloaded_resources();
        }

        runtime.finalize(&jvm).await?;

        // ── Post steps ──
        state.client_file = Some(client);
        state.jvm_file = Some(jvm.resolved.file.clone());
        state.jvm_major_version = required_major_version(&hierarchy);
        let mut ctx = StepContext {
            config,
            source,
            runner: self.runner.as_ref(),
            hooks: &mut *hooks,
        };
        for step in stages.post {
            step.run(&mut ctx, state).await?;
        }

        let natives_dir = finalize_libraries(&config.bin_dir, &root, &mut files, hooks).await?;
        if let Some(assets) = &assets {
            AssetManager::finalize(config, assets).await?;
        }

        // ── Arguments ──
        let (mut jvm_args, mut game_args) = collect_arguments(&hierarchy, &features, config.argument_merge);
        if let Some(logger) = &logger {
            let file = canonical(&logger.file).await?;
            jvm_args.push(replace_placeholders(&logger.argument, |name| {
                (name == "path").then(|| file.display().to_string())
            }));
        }

        let mc_dir = canonical_dir(&config.mc_dir).await?;
        let libraries_dir = canonical_dir(&config.libraries_dir).await?;
        let assets_dir = canonical_dir(&config.assets_dir).await?;
        let virtual_dir = match assets.as_ref().and_then(|a| a.mapping.as_ref()) {
            Some(mapping) => Some(canonical_dir(&mapping.virtual_dir).await?),
            None => None,
        };

        let mut jvm = jvm.resolved;
        if let Ok(file) = tokio::fs::canonicalize(&jvm.file).await {
            jvm.file = file;
        }

        let values = Placeholders {
            classpath: &files.class_files,
            natives_dir: &natives_dir,
            launcher_name: &config.launcher_name,
            launcher_version: &config.launcher_version,
            hierarchy: &hierarchy,
            mc_dir: &mc_dir,
            libraries_dir: &libraries_dir,
            assets_dir: &assets_dir,
            assets_index: assets.as_ref().map(|a| a.id.as_str()),
            assets_virtual_dir: virtual_dir.as_ref(),
            account: self.account.as_ref(),
            extra: stages.placeholders,
        };
        values.apply(&mut jvm_args);
        values.apply(&mut game_args);

        info!("{} installed, main class {}", root, main_class);
        Ok(InstallationPlan {
            version: root,
            main_class,
            jvm,
            mc_dir,
            natives_dir,
            class_files: files.class_files,
            libraries,
            asset_index: assets.map(|a| a.id),
            features,
            jvm_args,
            game_args,
        })
    }
}

/// Borrowed parts of a specialization the stages need.
struct Stages<'a> {
    descriptors: &'a dyn DescriptorSource,
    pre: &'a [PreStep],
    post: &'a [PostStep],
    placeholders: &'a [(String, String)],
}

async fn canonical(path: &Path) -> InstallResult<PathBuf> {
    tokio::fs::canonicalize(path)
        .await
        .map_err(|e| InstallError::io(path, e))
}

async fn canonical_dir(dir: &Path) -> InstallResult<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| InstallError::io(dir, e))?;
    canonical(dir).await
}
