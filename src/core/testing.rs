// Test doubles shared by the unit tests of the installation core.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::downloader::{ArtifactSource, CancelFlag};
use crate::core::error::{DownloadFailureReason, InstallResult};
use crate::core::loaders::processor::{ToolInvocation, ToolOutput, ToolRunner};

/// In-memory artifact source recording every request.
#[derive(Default)]
pub struct MemorySource {
    files: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<String>>,
    cancel_on: Mutex<Option<(usize, CancelFlag)>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: &str, body: Vec<u8>) {
        self.files.lock().unwrap().insert(url.to_string(), body);
    }

    pub fn insert_json(&self, url: &str, value: &serde_json::Value) {
        self.insert(url, serde_json::to_vec(value).unwrap());
    }

    /// Raise `flag` when the `n`-th request arrives.
    pub fn cancel_on_request(&self, n: usize, flag: CancelFlag) {
        *self.cancel_on.lock().unwrap() = Some((n, flag));
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }
}

#[async_trait]
impl ArtifactSource for MemorySource {
    async fn fetch(
        &self,
        url: &str,
        received: &AtomicU64,
    ) -> Result<Vec<u8>, DownloadFailureReason> {
        let n = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(url.to_string());
            requests.len()
        };
        if let Some((at, flag)) = self.cancel_on.lock().unwrap().as_ref() {
            if *at == n {
                flag.cancel();
            }
        }

        let body = self
            .files
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or(DownloadFailureReason::Status(404))?;
        received.fetch_add(body.len() as u64, Ordering::SeqCst);
        Ok(body)
    }
}

type Script = Box<dyn Fn(&ToolInvocation) -> ToolOutput + Send + Sync>;

/// Tool runner answering with a closure and logging invoked main classes.
pub struct ScriptedRunner {
    script: Script,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new(script: impl Fn(&ToolInvocation) -> ToolOutput + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolRunner for ScriptedRunner {
    async fn run(&self, invocation: &ToolInvocation) -> InstallResult<ToolOutput> {
        self.calls
            .lock()
            .unwrap()
            .push(invocation.main_class.clone());
        Ok((self.script)(invocation))
    }
}

pub fn success() -> ToolOutput {
    ToolOutput {
        status: Some(0),
        stdout: String::new(),
        stderr: String::new(),
        timed_out: false,
    }
}

/// Build an archive holding the given entries.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, body) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(body).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn write_file(path: &Path, body: &[u8]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

/// Store `versions/<name>/<name>.json`.
pub fn write_descriptor(versions_dir: &Path, name: &str, value: &serde_json::Value) {
    write_file(
        &versions_dir.join(name).join(format!("{name}.json")),
        &serde_json::to_vec_pretty(value).unwrap(),
    );
}
