// ─── Hook Set ───
// Named extension points of the installation pipeline. A variant is a HookSet
// value merged with the caller's, the pipeline always calls through one record.

use std::collections::BTreeSet;
use std::path::Path;

use crate::core::downloader::{CancelFlag, DownloadProgress};
use crate::core::java::{JvmWarning, ResolvedJvm};
use crate::core::loaders::processor::ProcessorRun;
use crate::core::version::LoadedVersion;

use super::selector::{LibraryEntry, LibraryFiles};

type Hooks<F> = Vec<Box<F>>;

/// Callbacks invoked synchronously by the pipeline.
///
/// Every hook is optional. Registering several callbacks for the same point
/// runs them in registration order. Hooks must return promptly and must not
/// re-enter the installer.
#[derive(Default)]
pub struct HookSet<'h> {
    filter_features: Hooks<dyn FnMut(&mut BTreeSet<String>) + Send + 'h>,
    loaded_features: Hooks<dyn FnMut(&BTreeSet<String>) + Send + 'h>,

    load_hierarchy: Hooks<dyn FnMut(&str) + Send + 'h>,
    loaded_hierarchy: Hooks<dyn FnMut(&[LoadedVersion]) + Send + 'h>,
    load_version: Hooks<dyn FnMut(&str, &Path) + Send + 'h>,
    need_version: Hooks<dyn FnMut(&str, &Path) -> bool + Send + 'h>,
    loaded_version: Hooks<dyn FnMut(&str, &Path) + Send + 'h>,

    load_client: Hooks<dyn FnMut() + Send + 'h>,
    loaded_client: Hooks<dyn FnMut(&Path) + Send + 'h>,

    load_libraries: Hooks<dyn FnMut() + Send + 'h>,
    filter_libraries: Hooks<dyn FnMut(&mut Vec<LibraryEntry>) + Send + 'h>,
    loaded_libraries: Hooks<dyn FnMut(&[LibraryEntry]) + Send + 'h>,
    filter_library_files: Hooks<dyn FnMut(&mut LibraryFiles) + Send + 'h>,
    loaded_library_files: Hooks<dyn FnMut(&LibraryFiles) + Send + 'h>,

    logger: Hooks<dyn FnMut(Option<&str>) + Send + 'h>,

    load_assets: Hooks<dyn FnMut(&str) + Send + 'h>,
    loaded_assets: Hooks<dyn FnMut(&str, usize) + Send + 'h>,
    verified_assets: Hooks<dyn FnMut(&str, usize) + Send + 'h>,

    load_jvm: Hooks<dyn FnMut(u32) + Send + 'h>,
    found_jvm: Hooks<dyn FnMut(&Path, &str, bool) + Send + 'h>,
    jvm_warning: Hooks<dyn FnMut(&JvmWarning) + Send + 'h>,
    loaded_jvm: Hooks<dyn FnMut(&ResolvedJvm) + Send + 'h>,

    download_resources: Hooks<dyn FnMut(&CancelFlag) + Send + 'h>,
    download_progress: Hooks<dyn FnMut(&DownloadProgress) + Send + 'h>,
    downloaded_resources: Hooks<dyn FnMut() + Send + 'h>,
    extracted_binaries: Hooks<dyn FnMut(&Path) + Send + 'h>,

    fetch_installer: Hooks<dyn FnMut(&str) + Send + 'h>,
    fetched_installer: Hooks<dyn FnMut(&str) + Send + 'h>,
    run_processor: Hooks<dyn FnMut(&ProcessorRun) + Send + 'h>,
}

/// Registration and emission of a hook whose arguments are shared borrows.
macro_rules! observer {
    ($(#[$meta:meta])* $field:ident, $on:ident ( $($arg:ident : $ty:ty),* )) => {
        $(#[$meta])*
        pub fn $on(mut self, hook: impl FnMut($($ty),*) + Send + 'h) -> Self {
            self.$field.push(Box::new(hook));
            self
        }

        pub(crate) fn $field(&mut self, $($arg: $ty),*) {
            for hook in &mut self.$field {
                hook($($arg),*);
            }
        }
    };
}

impl<'h> HookSet<'h> {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Features ────────────────────────────────────────

    /// Add or remove features before rules are evaluated.
    pub fn on_filter_features(
        mut self,
        hook: impl FnMut(&mut BTreeSet<String>) + Send + 'h,
    ) -> Self {
        self.filter_features.push(Box::new(hook));
        self
    }

    pub(crate) fn filter_features(&mut self, features: &mut BTreeSet<String>) {
        for hook in &mut self.filter_features {
            hook(&mut *features);
        }
    }

    observer!(loaded_features, on_loaded_features(features: &BTreeSet<String>));

    // ── Hierarchy ───────────────────────────────────────

    observer!(load_hierarchy, on_load_hierarchy(root: &str));
    observer!(loaded_hierarchy, on_loaded_hierarchy(hierarchy: &[LoadedVersion]));
    observer!(load_version, on_load_version(name: &str, file: &Path));

    /// Called when a descriptor file is missing. Returning `true` asks the
    /// resolver to look for the file once more.
    pub fn on_need_version(mut self, hook: impl FnMut(&str, &Path) -> bool + Send + 'h) -> Self {
        self.need_version.push(Box::new(hook));
        self
    }

    pub(crate) fn need_version(&mut self, name: &str, file: &Path) -> bool {
        self.need_version.iter_mut().any(|hook| hook(name, file))
    }

    observer!(loaded_version, on_loaded_version(name: &str, file: &Path));

    // ── Client & libraries ──────────────────────────────

    observer!(load_client, on_load_client());
    observer!(loaded_client, on_loaded_client(file: &Path));
    observer!(load_libraries, on_load_libraries());

    /// Drop or rewrite libraries of the merged set.
    pub fn on_filter_libraries(
        mut self,
        hook: impl FnMut(&mut Vec<LibraryEntry>) + Send + 'h,
    ) -> Self {
        self.filter_libraries.push(Box::new(hook));
        self
    }

    pub(crate) fn filter_libraries(&mut self, libraries: &mut Vec<LibraryEntry>) {
        for hook in &mut self.filter_libraries {
            hook(&mut *libraries);
        }
    }

    observer!(loaded_libraries, on_loaded_libraries(libraries: &[LibraryEntry]));

    pub fn on_filter_library_files(
        mut self,
        hook: impl FnMut(&mut LibraryFiles) + Send + 'h,
    ) -> Self {
        self.filter_library_files.push(Box::new(hook));
        self
    }

    pub(crate) fn filter_library_files(&mut self, files: &mut LibraryFiles) {
        for hook in &mut self.filter_library_files {
            hook(&mut *files);
        }
    }

    observer!(loaded_library_files, on_loaded_library_files(files: &LibraryFiles));

    observer!(
        /// Receives the logger config id, `None` when the version declares none.
        logger,
        on_logger(id: Option<&str>)
    );

    // ── Assets ──────────────────────────────────────────

    observer!(load_assets, on_load_assets(index_id: &str));
    observer!(loaded_assets, on_loaded_assets(index_id: &str, objects: usize));
    observer!(verified_assets, on_verified_assets(index_id: &str, objects: usize));

    // ── Runtime ─────────────────────────────────────────

    observer!(load_jvm, on_load_jvm(major_version: u32));
    observer!(
        /// A candidate runtime: executable, reported version and compatibility.
        found_jvm,
        on_found_jvm(file: &Path, version: &str, compatible: bool)
    );
    observer!(jvm_warning, on_jvm_warning(warning: &JvmWarning));
    observer!(loaded_jvm, on_loaded_jvm(jvm: &ResolvedJvm));

    // ── Downloads ───────────────────────────────────────

    observer!(
        /// Fired once before the batch starts. Cancelling the flag aborts it.
        download_resources,
        on_download_resources(cancel: &CancelFlag)
    );
    observer!(download_progress, on_download_progress(progress: &DownloadProgress));
    observer!(downloaded_resources, on_downloaded_resources());
    observer!(extracted_binaries, on_extracted_binaries(dir: &Path));

    // ── Loader ──────────────────────────────────────────

    observer!(fetch_installer, on_fetch_installer(url: &str));
    observer!(fetched_installer, on_fetched_installer(url: &str));
    observer!(run_processor, on_run_processor(run: &ProcessorRun));

    /// Append every hook of `other` after the hooks of `self`.
    pub fn merge(mut self, other: HookSet<'h>) -> Self {
        macro_rules! concat_fields {
            ($($field:ident),* $(,)?) => {
                $( self.$field.extend(other.$field); )*
            };
        }
        concat_fields!(
            filter_features,
            loaded_features,
            load_hierarchy,
            loaded_hierarchy,
            load_version,
            need_version,
            loaded_version,
            load_client,
            loaded_client,
            load_libraries,
            filter_libraries,
            loaded_libraries,
            filter_library_files,
            loaded_library_files,
            logger,
            load_assets,
            loaded_assets,
            verified_assets,
            load_jvm,
            found_jvm,
            jvm_warning,
            loaded_jvm,
            download_resources,
            download_progress,
            downloaded_resources,
            extracted_binaries,
            fetch_installer,
            fetched_installer,
            run_processor,
        );
        self
    }
}
