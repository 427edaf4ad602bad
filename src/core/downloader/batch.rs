use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use sha1::{Digest, Sha1};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::core::error::{DownloadFailure, DownloadFailureReason, InstallError, InstallResult};

use super::source::ArtifactSource;

const PROGRESS_TICK: Duration = Duration::from_millis(250);

/// A single file to download with optional size and SHA-1 for validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: String,
    pub dest: PathBuf,
    pub size: Option<u64>,
    pub sha1: Option<String>,
}

impl DownloadTask {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            size: None,
            sha1: None,
        }
    }

    pub fn with_size(mut self, size: Option<u64>) -> Self {
        self.size = size;
        self
    }

    pub fn with_sha1(mut self, sha1: Option<&str>) -> Self {
        self.sha1 = sha1.map(str::to_string);
        self
    }
}

/// Download set of one installation run, deduplicated by destination.
#[derive(Debug, Default)]
pub struct Batch {
    tasks: Vec<DownloadTask>,
    dests: HashSet<PathBuf>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a task, ignored when its destination is already queued.
    pub fn push(&mut self, task: DownloadTask) -> bool {
        if !self.dests.insert(task.dest.clone()) {
            return false;
        }
        self.tasks.push(task);
        true
    }

    pub fn extend(&mut self, tasks: impl IntoIterator<Item = DownloadTask>) {
        for task in tasks {
            self.push(task);
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> &[DownloadTask] {
        &self.tasks
    }

    /// Sum of the known task sizes.
    pub fn total_size(&self) -> u64 {
        self.tasks.iter().filter_map(|t| t.size).sum()
    }
}

/// Cooperative cancellation flag, polled before each new transfer.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Aggregate progress of a batch. Both `count` and `size` only ever grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct DownloadProgress {
    pub count: u64,
    pub total_count: u64,
    pub size: u64,
    pub total_size: u64,
}

#[derive(Default)]
struct Counters {
    count: AtomicU64,
    size: AtomicU64,
}

enum Outcome {
    Done,
    Skipped,
    Failed(DownloadFailure),
}

/// Concurrent, SHA-1 validated fetcher.
pub struct ArtifactFetcher<'a> {
    source: &'a dyn ArtifactSource,
    /// Maximum number of parallel downloads.
    concurrency: usize,
}

impl<'a> ArtifactFetcher<'a> {
    pub fn new(source: &'a dyn ArtifactSource) -> Self {
        Self {
            source,
            concurrency: 8,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    // ── Single file download ────────────────────────────

    /// Download one task immediately, failing with a download error.
    pub async fn fetch_one(&self, task: DownloadTask) -> InstallResult<()> {
        let counters = Counters::default();
        match self.run_task(task, &counters, None).await {
            Outcome::Failed(failure) => Err(InstallError::Download {
                failures: vec![failure],
            }),
            Outcome::Done | Outcome::Skipped => Ok(()),
        }
    }

    // ── Batch concurrent downloads ──────────────────────

    /// Download a whole batch using `buffer_unordered`.
    ///
    /// Returns only once every started task terminated. A cancelled batch
    /// reports [`InstallError::DownloadResourcesCancelled`] even when some
    /// transfers also failed.
    #[instrument(skip_all, fields(tasks = batch.len()))]
    pub async fn fetch_all(
        &self,
        batch: Batch,
        cancel: &CancelFlag,
        on_progress: &mut (dyn FnMut(&DownloadProgress) + Send),
    ) -> InstallResult<()> {
        let total_count = batch.len() as u64;
        let total_size = batch.total_size();

        if let Some(first) = batch.tasks.first() {
            ensure_disk_space(&first.dest, total_size)?;
        }

        info!(
            "Starting batch download: {} files ({} bytes), concurrency={}",
            total_count, total_size, self.concurrency
        );

        let counters = Counters::default();
        let snapshot = |counters: &Counters| DownloadProgress {
            count: counters.count.load(Ordering::SeqCst),
            total_count,
            size: counters.size.load(Ordering::SeqCst),
            total_size,
        };

        let mut last = snapshot(&counters);
        on_progress(&last);

        let mut failures = Vec::new();
        let mut cancelled = false;

        let mut results = stream::iter(batch.tasks)
            .map(|task| self.run_task(task, &counters, Some(cancel)))
            .buffer_unordered(self.concurrency);

        let mut ticker = tokio::time::interval(PROGRESS_TICK);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                outcome = results.next() => match outcome {
                    Some(Outcome::Done) => {}
                    Some(Outcome::Skipped) => cancelled = true,
                    Some(Outcome::Failed(failure)) => {
                        warn!("Download failed: {}", failure);
                        failures.push(failure);
                    }
                    None => break,
                },
                _ = ticker.tick() => {}
            }

            let current = snapshot(&counters);
            if current != last {
                last = current;
                on_progress(&last);
            }
        }

        // Raised while the last transfers were in flight
        if cancelled || cancel.is_cancelled() {
            info!("Batch download cancelled after {} files", last.count);
            return Err(InstallError::DownloadResourcesCancelled);
        }
        if !failures.is_empty() {
            return Err(InstallError::Download { failures });
        }
        Ok(())
    }

    async fn run_task(
        &self,
        task: DownloadTask,
        counters: &Counters,
        cancel: Option<&CancelFlag>,
    ) -> Outcome {
        if cancel.is_some_and(CancelFlag::is_cancelled) {
            return Outcome::Skipped;
        }

        let failed = |reason: DownloadFailureReason| {
            Outcome::Failed(DownloadFailure {
                url: task.url.clone(),
                dest: task.dest.clone(),
                reason,
            })
        };

        let bytes = match self.source.fetch(&task.url, &counters.size).await {
            Ok(bytes) => bytes,
            Err(reason) => return failed(reason),
        };

        // Validate before writing, a corrupted artifact never lands on disk
        if let Some(expected) = task.size {
            let actual = bytes.len() as u64;
            if actual != expected {
                return failed(DownloadFailureReason::Size { expected, actual });
            }
        }
        if let Some(expected) = &task.sha1 {
            let actual = sha1_hex(&bytes);
            if !actual.eq_ignore_ascii_case(expected) {
                return failed(DownloadFailureReason::Sha1 {
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        if let Err(e) = write_atomically(&task.dest, &bytes).await {
            return failed(DownloadFailureReason::Io(e.to_string()));
        }

        counters.count.fetch_add(1, Ordering::SeqCst);
        debug!("Downloaded: {} -> {:?}", task.url, task.dest);
        Outcome::Done
    }
}

/// Write through a `.part` file renamed into place once complete.
async fn write_atomically(dest: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut part = dest.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);

    {
        let mut file = tokio::fs::File::create(&part).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
    }

    tokio::fs::rename(&part, dest).await
}

pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// SHA-1 of a file on disk, `None` when it does not exist.
pub async fn file_sha1(path: &Path) -> InstallResult<Option<String>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(sha1_hex(&bytes))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(InstallError::io(path, e)),
    }
}

/// Check that a file exists and matches the given size and SHA-1, when given.
pub async fn check_file(file: &Path, size: Option<u64>, sha1: Option<&str>) -> InstallResult<bool> {
    let metadata = match tokio::fs::metadata(file).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(InstallError::io(file, e)),
    };

    if !metadata.is_file() {
        return Ok(false);
    }
    if let Some(size) = size {
        if metadata.len() != size {
            return Ok(false);
        }
    }
    match sha1 {
        Some(expected) => Ok(file_sha1(file)
            .await?
            .is_some_and(|actual| actual.eq_ignore_ascii_case(expected))),
        None => Ok(true),
    }
}

fn ensure_disk_space(path: &Path, required: u64) -> InstallResult<()> {
    if required == 0 {
        return Ok(());
    }

    let existing = path
        .ancestors()
        .find(|p| p.exists())
        .unwrap_or_else(|| Path::new("."));
    let canonical = std::fs::canonicalize(existing).unwrap_or_else(|_| existing.to_path_buf());

    let disks = sysinfo::Disks::new_with_refreshed_list();
    let mut best_len = 0usize;
    let mut available = None;
    for disk in disks.list() {
        let mount = disk.mount_point();
        if canonical.starts_with(mount) {
            let len = mount.as_os_str().len();
            if len >= best_len {
                best_len = len;
                available = Some(disk.available_space());
            }
        }
    }

    match available {
        Some(available) if available < required => Err(InstallError::InsufficientDiskSpace {
            path: canonical,
            required,
            available,
        }),
        _ => Ok(()),
    }
}
