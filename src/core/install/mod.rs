pub mod hooks;
pub mod natives;
pub mod pipeline;
pub mod plan;
pub mod selector;


pub use hooks::HookSet;
pub use pipeline::Installer;
pub use plan::InstallationPlan;
pub use selector::{LibraryEntry, LibraryFiles, SelectedLibraries};
