use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::core::config::InstallConfig;
use crate::core::platform::java_exe;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// A runtime executable and the version it reported, if any.
#[derive(Debug, Clone)]
pub struct ProbedJvm {
    pub file: PathBuf,
    pub version: Option<String>,
}

/// Candidate executables of system runtimes, deduplicated, in search order.
pub fn system_candidates(config: &InstallConfig) -> Vec<PathBuf> {
    let dirs: Vec<PathBuf> = match &config.system_jvm_dirs {
        Some(dirs) => dirs.clone(),
        None => {
            let mut dirs: Vec<PathBuf> = std::env::var_os("PATH")
                .map(|path| std::env::split_paths(&path).collect())
                .unwrap_or_default();
            if cfg!(target_os = "linux") {
                dirs.push(PathBuf::from("/usr/lib/jvm"));
            }
            dirs
        }
    };

    let exe = java_exe();
    let mut candidates = Vec::new();
    let mut push = |file: PathBuf| {
        if file.is_file() && !candidates.contains(&file) {
            candidates.push(file);
        }
    };

    for dir in dirs {
        push(dir.join(exe));
        push(dir.join("bin").join(exe));
        if let Ok(entries) = std::fs::read_dir(&dir) {
            let mut homes: Vec<PathBuf> = entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .collect();
            homes.sort();
            for home in homes {
                push(home.join("bin").join(exe));
            }
        }
    }

    candidates
}

/// Query every candidate with `-version` concurrently.
#[instrument(skip_all, fields(candidates = files.len()))]
pub async fn probe_versions(files: Vec<PathBuf>) -> Vec<ProbedJvm> {
    join_all(files.into_iter().map(|file| async move {
        let version = probe_version(&file).await;
        ProbedJvm { file, version }
    }))
    .await
}

async fn probe_version(file: &Path) -> Option<String> {
    let output = Command::new(file)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(PROBE_TIMEOUT, output).await {
        Ok(Ok(output)) if output.status.success() => output,
        Ok(Ok(output)) => {
            debug!("Probing {:?} exited with {}", file, output.status);
            return None;
        }
        Ok(Err(e)) => {
            debug!("Probing {:?} failed: {}", file, e);
            return None;
        }
        Err(_) => {
            debug!("Probing {:?} timed out", file);
            return None;
        }
    };

    let stderr = String::from_utf8_lossy(&output.stderr);
    let version = parse_version_string(&stderr);
    debug!("Probing {:?}: {:?}", file, version);
    version
}

/// First double-quoted token of the `-version` output.
fn parse_version_string(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (_, rest) = line.split_once('"')?;
        let (version, _) = rest.split_once('"')?;
        Some(version.to_string())
    })
}

/// Major version of a runtime version string.
pub fn parse_jvm_major_version(version: &str) -> Option<u32> {
    // `8u51` style
    if !version.contains('.') {
        if let Some((major, _)) = version.split_once('u') {
            return major.parse().ok();
        }
    }

    let mut parts = version.split('.');
    let major: u32 = parts.next()?.parse().ok()?;
    if major == 1 {
        return parts.next()?.parse().ok();
    }
    Some(major)
}

/// Compatibility score of `actual` for `required`, lower is better, `None`
/// when incompatible. Runtimes up to 8 must match exactly.
pub fn jvm_major_compatibility(required: u32, actual: u32, allow_newer: bool) -> Option<u32> {
    if required <= 8 || !allow_newer {
        (required == actual).then_some(0)
    } else {
        actual.checked_sub(required)
    }
}
