pub mod context;
pub mod forge;
pub mod mojang;
pub mod processor;
pub mod variant;

pub use context::{StepContext, StepState};
pub use forge::{LoaderKind, LoaderSpec, PreparedLoader};
pub use mojang::MojangSource;
pub use processor::{CommandRunner, ToolInvocation, ToolOutput, ToolRunner};
pub use variant::{Flavor, MojangOptions, PostStep, PreStep, Specialization};
