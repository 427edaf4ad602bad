use std::path::PathBuf;

use crate::core::config::InstallConfig;
use crate::core::downloader::ArtifactSource;
use crate::core::install::HookSet;

use super::forge::PreparedLoader;
use super::processor::ToolRunner;

/// What the pre and post steps of a variant get to work with.
pub struct StepContext<'a, 'h> {
    pub config: &'a InstallConfig,
    pub source: &'a dyn ArtifactSource,
    pub runner: &'a dyn ToolRunner,
    pub hooks: &'a mut HookSet<'h>,
}

/// State threaded from the pre steps through the pipeline to the post steps.
#[derive(Debug, Default)]
pub struct StepState {
    /// Version the hierarchy is resolved from, steps may rewrite it.
    pub root: String,
    /// Loader unpacked during this run, completed after downloads.
    pub loader: Option<PreparedLoader>,
    /// Descriptor written by this run, removed again if the run fails.
    pub written_descriptor: Option<PathBuf>,
    /// Library files only a post step produces.
    pub pending: Vec<PathBuf>,
    /// Client jar and runtime executable, known once downloads are done.
    pub client_file: Option<PathBuf>,
    pub jvm_file: Option<PathBuf>,
    /// Major runtime version the hierarchy requires.
    pub jvm_major_version: u32,
}

impl StepState {
    pub fn new(root: &str) -> Self {
        Self {
            root: root.to_string(),
            ..Self::default()
        }
    }
}
