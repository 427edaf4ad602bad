// ─── Java Runtime ───
// Locates the runtime an installed version runs on: a static path, a probed
// system installation or a vendor distribution downloaded with the version.

pub mod probe;
pub mod runtime;
pub mod vendor;

pub use runtime::{required_major_version, JvmWarning, LoadedJvm, ResolvedJvm, RuntimePolicy, RuntimeResolver};
