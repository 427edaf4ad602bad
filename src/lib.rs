pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::config::InstallConfig;
pub use crate::core::error::{ErrorKind, InstallError, InstallResult};
pub use crate::core::install::{HookSet, InstallationPlan, Installer};
pub use crate::core::loaders::{Flavor, LoaderKind, MojangOptions};

/// Install a structured logging subscriber filtered by `RUST_LOG`.
///
/// Embedding applications with their own subscriber should not call this.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,interface_install=debug")),
        )
        .try_init();
}
