// ─── Variants ───
// A flavor is specialized into hooks, a descriptor source and ordered steps
// around the common pipeline, instead of a subtype of it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::downloader::{ArtifactSource, Batch};
use crate::core::error::InstallResult;
use crate::core::install::HookSet;
use crate::core::version::{DescriptorSource, LocalDescriptors};

use super::context::{StepContext, StepState};
use super::forge::{complete_loader, prepare_loader, LoaderKind, LoaderSpec};
use super::mojang::MojangSource;

/// Options of the Mojang curated versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MojangOptions {
    /// Enables the `is_demo_user` feature.
    #[serde(default)]
    pub demo: bool,
    /// Window size, enables the `has_custom_resolution` feature.
    #[serde(default)]
    pub resolution: Option<(u16, u16)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Flavor {
    /// Local descriptors only.
    Generic,
    Mojang(MojangOptions),
    /// Mojang versions extended by a mod loader; the requested version is
    /// the loader version.
    Loader {
        kind: LoaderKind,
        #[serde(default)]
        options: MojangOptions,
    },
}

/// Runs before hierarchy resolution.
pub enum PreStep {
    ResolveAlias(Arc<MojangSource>),
    PrepareLoader(LoaderSpec),
}

/// Runs once downloads are done and the runtime is ready.
pub enum PostStep {
    CompleteLoader,
}

impl PreStep {
    pub async fn run(
        &self,
        ctx: &mut StepContext<'_, '_>,
        state: &mut StepState,
        batch: &mut Batch,
    ) -> InstallResult<()> {
        match self {
            PreStep::ResolveAlias(mojang) => {
                state.root = mojang.resolve_alias(&state.root).await?;
                Ok(())
            }
            PreStep::PrepareLoader(spec) => prepare_loader(spec, ctx, state, batch).await,
        }
    }
}

impl PostStep {
    pub async fn run(&self, ctx: &mut StepContext<'_, '_>, state: &mut StepState) -> InstallResult<()> {
        match self {
            PostStep::CompleteLoader => complete_loader(ctx, state).await,
        }
    }
}

pub struct Specialization {
    pub hooks: HookSet<'static>,
    pub descriptors: Arc<dyn DescriptorSource>,
    pub pre: Vec<PreStep>,
    pub post: Vec<PostStep>,
    /// Extra `${name}` values of the arguments.
    pub placeholders: Vec<(String, String)>,
}

impl Flavor {
    pub fn specialize(&self, version: &str, source: Arc<dyn ArtifactSource>) -> InstallResult<Specialization> {
        let specialization = match self {
            Flavor::Generic => Specialization {
                hooks: HookSet::new(),
                descriptors: Arc::new(LocalDescriptors),
                pre: Vec::new(),
                post: Vec::new(),
                placeholders: Vec::new(),
            },
            Flavor::Mojang(options) => {
                let mojang = Arc::new(MojangSource::new(source));
                Specialization {
                    hooks: mojang_hooks(options),
                    descriptors: mojang.clone(),
                    pre: vec![PreStep::ResolveAlias(mojang)],
                    post: Vec::new(),
                    placeholders: resolution_placeholders(options),
                }
            }
            Flavor::Loader { kind, options } => {
                let spec = LoaderSpec::new(*kind, version)?;
                let mojang = MojangSource::new(source).exclude(spec.root_version());
                Specialization {
                    hooks: mojang_hooks(options),
                    descriptors: Arc::new(mojang),
                    pre: vec![PreStep::PrepareLoader(spec)],
                    post: vec![PostStep::CompleteLoader],
                    placeholders: resolution_placeholders(options),
                }
            }
        };
        Ok(specialization)
    }
}

fn mojang_hooks(options: &MojangOptions) -> HookSet<'static> {
    let options = options.clone();
    HookSet::new().on_filter_features(move |features| {
        if options.demo {
            features.insert("is_demo_user".into());
        }
        if options.resolution.is_some() {
            features.insert("has_custom_resolution".into());
        }
    })
}

fn resolution_placeholders(options: &MojangOptions) -> Vec<(String, String)> {
    match options.resolution {
        Some((width, height)) => vec![
            ("resolution_width".into(), width.to_string()),
            ("resolution_height".into(), height.to_string()),
        ],
        None => Vec::new(),
    }
}
