pub mod descriptor;
pub mod hierarchy;
pub mod manifest;
pub mod rules;

pub use descriptor::{
    Argument, Arguments, AssetIndexInfo, DescriptorLibrary, Download, JavaVersionInfo,
    LoggingConfig, VersionDescriptor,
};
pub use hierarchy::{
    descriptor_file, resolve_hierarchy, DescriptorSource, LoadedVersion, LocalDescriptors,
};
pub use manifest::{VersionEntry, VersionManifest};
pub use rules::{resolve_arguments, rules_allow, Rule};
