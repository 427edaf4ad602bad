// ─── Installation Plan ───
// Argument resolution over the hierarchy and the final plan handed to callers.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Serialize;

use crate::core::auth::Account;
use crate::core::config::ArgumentMerge;
use crate::core::java::ResolvedJvm;
use crate::core::platform::classpath_separator;
use crate::core::version::{resolve_arguments, LoadedVersion};

use super::selector::LibraryEntry;

/// Runtime arguments used when a version only declares `minecraftArguments`.
pub const LEGACY_JVM_ARGS: &[&str] = &[
    "-Djava.library.path=${natives_directory}",
    "-Dminecraft.launcher.brand=${launcher_name}",
    "-Dminecraft.launcher.version=${launcher_version}",
    "-cp",
    "${classpath}",
];

/// Everything needed to run an installed version. Read-only once built.
#[derive(Debug, Clone, Serialize)]
pub struct InstallationPlan {
    /// Leaf version name.
    pub version: String,
    pub main_class: String,
    pub jvm: ResolvedJvm,
    /// Working directory of the game.
    pub mc_dir: PathBuf,
    pub natives_dir: PathBuf,
    /// Canonical classpath, the client jar first.
    pub class_files: Vec<PathBuf>,
    pub libraries: Vec<LibraryEntry>,
    pub asset_index: Option<String>,
    pub features: BTreeSet<String>,
    pub jvm_args: Vec<String>,
    pub game_args: Vec<String>,
}

impl InstallationPlan {
    /// Full command line: runtime, runtime args, main class, game args.
    pub fn command_line(&self) -> Vec<String> {
        let mut line = Vec::with_capacity(self.jvm_args.len() + self.game_args.len() + 2);
        line.push(self.jvm.file.display().to_string());
        line.extend(self.jvm_args.iter().cloned());
        line.push(self.main_class.clone());
        line.extend(self.game_args.iter().cloned());
        line
    }
}

/// Runtime and game argument templates of the hierarchy, placeholders intact.
///
/// The leaf-most version declaring only `minecraftArguments` replaces every
/// other template with the legacy set.
pub fn collect_arguments(
    hierarchy: &[LoadedVersion],
    features: &BTreeSet<String>,
    merge: ArgumentMerge,
) -> (Vec<String>, Vec<String>) {
    let mut jvm_args = Vec::new();
    let mut game_args = Vec::new();

    // Versions declaring modern arguments, up to the first legacy one
    let mut modern = Vec::new();
    for version in hierarchy {
        let descriptor = &version.descriptor;
        match (&descriptor.arguments, &descriptor.minecraft_arguments) {
            (Some(args), _) => modern.push(args),
            (None, Some(legacy)) => {
                jvm_args.extend(LEGACY_JVM_ARGS.iter().map(|arg| arg.to_string()));
                game_args.extend(legacy.split_whitespace().map(str::to_string));
                return (jvm_args, game_args);
            }
            (None, None) => {}
        }
    }

    if merge == ArgumentMerge::LeafOverrides {
        modern.truncate(1);
    }

    for args in modern.into_iter().rev() {
        resolve_arguments(&mut jvm_args, &args.jvm, features);
        resolve_arguments(&mut game_args, &args.game, features);
    }

    (jvm_args, game_args)
}

/// Values substituted into `${name}` placeholders.
pub struct Placeholders<'a> {
    pub classpath: &'a [PathBuf],
    pub natives_dir: &'a PathBuf,
    pub launcher_name: &'a str,
    pub launcher_version: &'a str,
    pub hierarchy: &'a [LoadedVersion],
    pub mc_dir: &'a PathBuf,
    pub libraries_dir: &'a PathBuf,
    pub assets_dir: &'a PathBuf,
    pub assets_index: Option<&'a str>,
    pub assets_virtual_dir: Option<&'a PathBuf>,
    pub account: Option<&'a Account>,
    /// Values contributed by the variant, e.g. the window size.
    pub extra: &'a [(String, String)],
}

impl Placeholders<'_> {
    fn lookup(&self, name: &str) -> Option<String> {
        let value = match name {
            "classpath_separator" => classpath_separator().to_string(),
            "classpath" => self
                .classpath
                .iter()
                .map(|file| file.display().to_string())
                .collect::<Vec<_>>()
                .join(classpath_separator()),
            "natives_directory" => self.natives_dir.display().to_string(),
            "launcher_name" => self.launcher_name.to_string(),
            "launcher_version" => self.launcher_version.to_string(),
            "version_name" => self.hierarchy.first()?.name.clone(),
            "version_type" => self
                .hierarchy
                .iter()
                .find_map(|v| v.descriptor.channel.clone())?,
            "game_directory" => self.mc_dir.display().to_string(),
            "library_directory" => self.libraries_dir.display().to_string(),
            "assets_root" => self.assets_dir.display().to_string(),
            "assets_index_name" => self.assets_index?.to_string(),
            "game_assets" => self.assets_virtual_dir?.display().to_string(),
            "auth_player_name" => self.account?.username.clone(),
            "auth_uuid" => self.account?.uuid.clone(),
            "auth_access_token" => self.account?.access_token.clone(),
            "user_type" => self.account?.user_type.clone(),
            other => {
                return self
                    .extra
                    .iter()
                    .find(|(name, _)| name == other)
                    .map(|(_, value)| value.clone())
            }
        };
        Some(value)
    }

    pub fn apply(&self, args: &mut [String]) {
        for arg in args {
            *arg = replace_placeholders(arg, |name| self.lookup(name));
        }
    }
}

/// Replace every `${name}` the lookup knows, unknown ones are kept as is.
pub fn replace_placeholders(arg: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(arg.len());
    let mut rest = arg;

    while let Some(open) = rest.find("${") {
        let Some(close) = rest[open + 2..].find('}') else {
            break;
        };
        let close = open + 2 + close;
        out.push_str(&rest[..open]);
        match lookup(&rest[open + 2..close]) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[open..=close]),
        }
        rest = &rest[close + 1..];
    }

    out.push_str(rest);
    out
}
