use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Central error type for the installation core.
/// Every module returns `Result<T, InstallError>`.
#[derive(Debug, Error)]
pub enum InstallError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Not enough disk space at {path:?}: required {required} bytes, available {available}")]
    InsufficientDiskSpace {
        path: PathBuf,
        required: u64,
        available: u64,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{} resource(s) failed to download: {}", .failures.len(), summarize(.failures))]
    Download { failures: Vec<DownloadFailure> },

    #[error("Download of resources has been cancelled")]
    DownloadResourcesCancelled,

    // ── Structural ──────────────────────────────────────
    #[error("Version hierarchy loops back to {version}")]
    HierarchyLoop { version: String },

    #[error("Version not found: {version}")]
    VersionNotFound { version: String },

    #[error("Invalid version descriptor {file:?}: {source}")]
    InvalidDescriptor {
        file: PathBuf,
        source: serde_json::Error,
    },

    #[error("Asset index not found: {id}")]
    AssetsNotFound { id: String },

    #[error("Client jar not found for {version}")]
    ClientNotFound { version: String },

    #[error("Library not found: {gav}")]
    LibraryNotFound { gav: String },

    #[error("No main class declared in the hierarchy of {version}")]
    MainClassNotFound { version: String },

    #[error("Invalid library coordinate: {0}")]
    InvalidGav(String),

    // ── Runtime ─────────────────────────────────────────
    #[error("No compatible Java runtime found for major version {major_version}")]
    JvmNotFound { major_version: u32 },

    // ── Loader ──────────────────────────────────────────
    #[error("Loader installer not found at {url}")]
    InstallerNotFound { url: String },

    #[error("Invalid install profile: {reason}")]
    InstallProfile { reason: String },

    #[error("Processor {task}: {gav} not found")]
    ProcessorNotFound { task: String, gav: String },

    #[error("Processor {task} failed (status {status:?})\nSTDOUT:\n{stdout}\nSTDERR:\n{stderr}")]
    ProcessorFailed {
        task: String,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Processor {task} produced a corrupted file {file:?}, expected SHA-1 {expected}")]
    ProcessorCorrupted {
        task: String,
        file: PathBuf,
        expected: String,
    },

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Convenience alias used throughout the crate.
pub type InstallResult<T> = Result<T, InstallError>;

/// Coarse classification of an [`InstallError`], used by callers to decide
/// whether a retry makes sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Structural,
    Integrity,
    Runtime,
    Network,
    Cancelled,
    ExternalTool,
    Io,
}

impl InstallError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InstallError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            InstallError::Io { .. } | InstallError::InsufficientDiskSpace { .. } => ErrorKind::Io,
            InstallError::Http(_) => ErrorKind::Network,
            InstallError::Download { failures } => {
                if !failures.is_empty() && failures.iter().all(|f| f.reason.is_integrity()) {
                    ErrorKind::Integrity
                } else {
                    ErrorKind::Network
                }
            }
            InstallError::DownloadResourcesCancelled => ErrorKind::Cancelled,
            InstallError::HierarchyLoop { .. }
            | InstallError::VersionNotFound { .. }
            | InstallError::InvalidDescriptor { .. }
            | InstallError::AssetsNotFound { .. }
            | InstallError::ClientNotFound { .. }
            | InstallError::LibraryNotFound { .. }
            | InstallError::MainClassNotFound { .. }
            | InstallError::InvalidGav(_)
            | InstallError::InstallerNotFound { .. }
            | InstallError::InstallProfile { .. }
            | InstallError::Json(_)
            | InstallError::Zip(_) => ErrorKind::Structural,
            InstallError::JvmNotFound { .. } => ErrorKind::Runtime,
            InstallError::ProcessorNotFound { .. } | InstallError::ProcessorFailed { .. } => {
                ErrorKind::ExternalTool
            }
            InstallError::ProcessorCorrupted { .. } => ErrorKind::Integrity,
        }
    }
}

// ── Download failures ───────────────────────────────────

/// A single artifact that could not be installed by a download batch.
#[derive(Debug, Clone)]
pub struct DownloadFailure {
    pub url: String,
    pub dest: PathBuf,
    pub reason: DownloadFailureReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadFailureReason {
    Status(u16),
    /// Transport error, including timeouts.
    Transport(String),
    Size { expected: u64, actual: u64 },
    Sha1 { expected: String, actual: String },
    Io(String),
}

impl DownloadFailureReason {
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Size { .. } | Self::Sha1 { .. })
    }
}

impl fmt::Display for DownloadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            DownloadFailureReason::Status(status) => write!(f, "{} (HTTP {})", self.url, status),
            DownloadFailureReason::Transport(message) => write!(f, "{} ({})", self.url, message),
            DownloadFailureReason::Size { expected, actual } => write!(
                f,
                "{} -> {:?} (size mismatch: expected {}, got {})",
                self.url, self.dest, expected, actual
            ),
            DownloadFailureReason::Sha1 { expected, actual } => write!(
                f,
                "{} -> {:?} (SHA-1 mismatch: expected {}, got {})",
                self.url, self.dest, expected, actual
            ),
            DownloadFailureReason::Io(message) => {
                write!(f, "{} -> {:?} ({})", self.url, self.dest, message)
            }
        }
    }
}

fn summarize(failures: &[DownloadFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Serialization for IPC ───────────────────────────────
// Embedders forward errors as plain text.
impl serde::Serialize for InstallError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
