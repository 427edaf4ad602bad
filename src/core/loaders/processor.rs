// ─── Processor Executor ───
// Runs the post-install tools declared by a loader install profile, one at a
// time, verifying the files each one declares as output.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::core::downloader::check_file;
use crate::core::error::{InstallError, InstallResult};
use crate::core::install::HookSet;
use crate::core::maven::Gav;

/// Captured bytes per output stream.
const OUTPUT_LIMIT: usize = 64 * 1024;

/// One external tool execution.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub jvm: PathBuf,
    pub classpath: Vec<PathBuf>,
    pub main_class: String,
    pub args: Vec<String>,
    pub work_dir: PathBuf,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Exit code, `None` when killed or timed out.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status == Some(0)
    }
}

/// Executes tools, a process spawner outside tests.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, invocation: &ToolInvocation) -> InstallResult<ToolOutput>;
}

/// Spawns `java -cp <classpath> <main> <args>` and waits for it.
pub struct CommandRunner;

#[async_trait]
impl ToolRunner for CommandRunner {
    async fn run(&self, invocation: &ToolInvocation) -> InstallResult<ToolOutput> {
        let classpath = std::env::join_paths(&invocation.classpath)
            .map_err(|e| InstallError::io(&invocation.work_dir, std::io::Error::other(e)))?;

        let mut child = Command::new(&invocation.jvm)
            .arg("-cp")
            .arg(classpath)
            .arg(&invocation.main_class)
            .args(&invocation.args)
            .current_dir(&invocation.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| InstallError::io(&invocation.jvm, e))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();

        let waited = {
            let run = async {
                let (_, _, status) = tokio::join!(
                    read_bounded(stdout, &mut stdout_buf),
                    read_bounded(stderr, &mut stderr_buf),
                    child.wait()
                );
                status
            };
            tokio::time::timeout(invocation.timeout, run).await
        };

        let timed_out = waited.is_err();
        let status = match waited {
            Ok(status) => status.map_err(|e| InstallError::io(&invocation.jvm, e))?.code(),
            Err(_) => {
                warn!(
                    "{} timed out after {:?}",
                    invocation.main_class, invocation.timeout
                );
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill {}: {}", invocation.main_class, e);
                }
                None
            }
        };

        Ok(ToolOutput {
            status,
            stdout: String::from_utf8_lossy(&stdout_buf).into_owned(),
            stderr: String::from_utf8_lossy(&stderr_buf).into_owned(),
            timed_out,
        })
    }
}

/// Read a stream to its end into `kept`, keeping at most `OUTPUT_LIMIT` bytes.
async fn read_bounded<R: tokio::io::AsyncRead + Unpin>(stream: Option<R>, kept: &mut Vec<u8>) {
    let Some(mut stream) = stream else {
        return;
    };
    let mut buf = [0u8; 8192];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = OUTPUT_LIMIT.saturating_sub(kept.len());
                kept.extend_from_slice(&buf[..n.min(room)]);
            }
        }
    }
}

// ── Tasks ───────────────────────────────────────────────

/// A processor declared by an install profile.
#[derive(Debug, Clone)]
pub struct ProcessorTask {
    pub jar: Gav,
    pub classpath: Vec<Gav>,
    /// Argument templates with `{DATA}` tokens, `'literals'` and `[gav]` refs.
    pub args: Vec<String>,
    /// Output file template to expected SHA-1 template.
    pub outputs: Vec<(String, String)>,
}

impl ProcessorTask {
    /// `--task` argument, or a name derived from the tool artifact.
    pub fn name(&self) -> String {
        if let Some(pos) = self.args.iter().position(|arg| arg == "--task") {
            if let Some(task) = self.args.get(pos + 1) {
                return task.to_lowercase();
            }
        }
        match self.jar.artifact_id.as_str() {
            "jarsplitter" => "split_jar".into(),
            "ForgeAutoRenamingTool" => "forge_auto_renaming".into(),
            "binarypatcher" => "patch_binary".into(),
            "SpecialSource" => "special_source_renaming".into(),
            other => other.to_string(),
        }
    }
}

/// Notification payload of a processor about to run.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessorRun {
    pub name: String,
    pub index: usize,
    pub total: usize,
}

/// Value of a profile data entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataEntry {
    Library(Gav),
    Literal(String),
    File(PathBuf),
}

// ── Work dir ────────────────────────────────────────────

/// Temporary directory of one loader install, removed only once every
/// processor succeeded.
#[derive(Debug)]
pub struct InstallWorkDir {
    path: PathBuf,
}

impl InstallWorkDir {
    pub async fn create(path: PathBuf) -> InstallResult<Self> {
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| InstallError::io(&path, e))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn release(self) -> InstallResult<()> {
        debug!("Releasing work dir {:?}", self.path);
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(InstallError::io(&self.path, e)),
        }
    }
}

// ── Executor ────────────────────────────────────────────

pub struct ProcessorExecutor<'a> {
    pub runner: &'a dyn ToolRunner,
    pub jvm: &'a Path,
    pub libraries_dir: &'a Path,
    /// Files of the profile libraries, by gav.
    pub libraries: &'a HashMap<Gav, PathBuf>,
    pub data: &'a HashMap<String, DataEntry>,
    pub timeout: Duration,
}

impl ProcessorExecutor<'_> {
    /// Run every task in order, stopping at the first failure.
    #[instrument(skip_all, fields(tasks = tasks.len()))]
    pub async fn run_all(
        &self,
        tasks: &[ProcessorTask],
        work_dir: &InstallWorkDir,
        hooks: &mut HookSet<'_>,
    ) -> InstallResult<()> {
        for (index, task) in tasks.iter().enumerate() {
            let name = task.name();

            if self.outputs_verified(task).await? {
                info!("Processor {} outputs already verified, skipping", name);
                continue;
            }

            hooks.run_processor(&ProcessorRun {
                name: name.clone(),
                index,
                total: tasks.len(),
            });
            self.run_one(task, &name, work_dir).await?;
        }
        Ok(())
    }

    async fn run_one(&self, task: &ProcessorTask, name: &str, work_dir: &InstallWorkDir) -> InstallResult<()> {
        let jar = self.library_file(&task.jar, name)?;
        let main_class = read_main_class(&jar)
            .await?
            .ok_or_else(|| InstallError::ProcessorNotFound {
                task: name.to_string(),
                gav: task.jar.to_string(),
            })?;

        let mut classpath = vec![jar];
        for gav in &task.classpath {
            classpath.push(self.library_file(gav, name)?);
        }

        let args = task
            .args
            .iter()
            .map(|arg| self.format_arg(arg).unwrap_or_else(|| arg.clone()))
            .collect();

        info!("Running processor {} ({})", name, main_class);
        let output = self
            .runner
            .run(&ToolInvocation {
                jvm: self.jvm.to_path_buf(),
                classpath,
                main_class,
                args,
                work_dir: work_dir.path().to_path_buf(),
                timeout: self.timeout,
            })
            .await?;

        if !output.success() {
            return Err(InstallError::ProcessorFailed {
                task: name.to_string(),
                status: output.status,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }

        for (file, sha1) in self.expected_outputs(task) {
            if !check_file(&file, None, Some(&sha1)).await? {
                return Err(InstallError::ProcessorCorrupted {
                    task: name.to_string(),
                    file,
                    expected: sha1,
                });
            }
        }

        debug!("Processor {} done", name);
        Ok(())
    }

    /// Whether a previous run already produced valid outputs for `task`.
    async fn outputs_verified(&self, task: &ProcessorTask) -> InstallResult<bool> {
        let outputs = self.expected_outputs(task);
        if outputs.is_empty() {
            return Ok(false);
        }
        for (file, sha1) in &outputs {
            if !check_file(file, None, Some(sha1)).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn expected_outputs(&self, task: &ProcessorTask) -> Vec<(PathBuf, String)> {
        task.outputs
            .iter()
            .filter_map(|(file, sha1)| {
                Some((PathBuf::from(self.format_arg(file)?), self.format_arg(sha1)?))
            })
            .collect()
    }

    fn library_file(&self, gav: &Gav, task: &str) -> InstallResult<PathBuf> {
        let file = self
            .libraries
            .get(gav)
            .cloned()
            .unwrap_or_else(|| gav.file_in(self.libraries_dir));
        if file.is_file() {
            Ok(file)
        } else {
            Err(InstallError::ProcessorNotFound {
                task: task.to_string(),
                gav: gav.to_string(),
            })
        }
    }

    fn format_arg(&self, input: &str) -> Option<String> {
        format_processor_arg(input, self.libraries_dir, self.data)
    }
}

/// Expand a processor argument: `[gav]` becomes a library path, `{NAME}` a
/// data entry and `'text'` a literal. `None` on unknown entries.
pub fn format_processor_arg(
    input: &str,
    libraries_dir: &Path,
    data: &HashMap<String, DataEntry>,
) -> Option<String> {
    if let Some(coord) = input.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let gav = Gav::parse(coord).ok()?;
        return Some(gav.file_in(libraries_dir).display().to_string());
    }

    enum Token {
        Data,
        Literal,
    }

    let mut out = String::with_capacity(input.len());
    let mut token_buf = String::new();
    let mut token = None;
    let mut escape = false;

    for ch in input.chars() {
        match ch {
            '\\' if !escape => escape = true,
            '{' if !escape && token.is_none() => token = Some(Token::Data),
            '}' if !escape && matches!(token, Some(Token::Data)) => {
                match data.get(&token_buf)? {
                    DataEntry::Library(gav) => {
                        out.push_str(&gav.file_in(libraries_dir).display().to_string())
                    }
                    DataEntry::Literal(value) => out.push_str(value),
                    DataEntry::File(file) => out.push_str(&file.display().to_string()),
                }
                token_buf.clear();
                token = None;
            }
            '\'' if !escape && token.is_none() => token = Some(Token::Literal),
            '\'' if !escape && matches!(token, Some(Token::Literal)) => {
                out.push_str(&token_buf);
                token_buf.clear();
                token = None;
            }
            _ => {
                if token.is_none() {
                    out.push(ch);
                } else {
                    token_buf.push(ch);
                }
                escape = false;
            }
        }
    }

    // Dangling escape or unterminated token
    if escape || token.is_some() {
        return None;
    }
    Some(out)
}

/// `Main-Class` of a jar manifest, `None` without manifest or entry.
pub async fn read_main_class(jar: &Path) -> InstallResult<Option<String>> {
    let bytes = tokio::fs::read(jar)
        .await
        .map_err(|e| InstallError::io(jar, e))?;

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))?;
    let Ok(mut manifest) = archive.by_name("META-INF/MANIFEST.MF") else {
        return Ok(None);
    };
    let mut text = String::new();
    manifest
        .read_to_string(&mut text)
        .map_err(|e| InstallError::io(jar, e))?;

    Ok(parse_main_class(&text))
}

fn parse_main_class(manifest: &str) -> Option<String> {
    let mut main_class: Option<String> = None;
    let mut in_main_class = false;
    for line in manifest.lines() {
        // Continuation lines start with a single space
        if let Some(rest) = line.strip_prefix(' ') {
            if in_main_class {
                if let Some(value) = &mut main_class {
                    value.push_str(rest.trim_end());
                }
            }
            continue;
        }

        in_main_class = false;
        if let Some((key, value)) = line.split_once(':') {
            if key.trim() == "Main-Class" {
                in_main_class = true;
                main_class = Some(value.trim().to_string());
            }
        }
    }
    main_class.filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::downloader::sha1_hex;
    use crate::core::testing::{success, write_file, zip_bytes, ScriptedRunner};

    fn tool_jar(libs: &Path, gav: &Gav, main_class: &str) {
        let manifest = format!("Manifest-Version: 1.0\nMain-Class: {main_class}\n");
        write_file(
            &gav.file_in(libs),
            &zip_bytes(&[("META-INF/MANIFEST.MF", manifest.as_bytes())]),
        );
    }

    fn data(entries: &[(&str, DataEntry)]) -> HashMap<String, DataEntry> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn formats_arguments() {
        let libs = Path::new("/libs");
        let data = data(&[
            ("SIDE", DataEntry::Literal("client".into())),
            ("MAPPINGS", DataEntry::Library(Gav::parse("de.oceanlabs.mcp:mcp_config:1.20.1@zip").unwrap())),
            ("PATCHED", DataEntry::File(PathBuf::from("/tmp/patched.jar"))),
        ]);

        assert_eq!(
            format_processor_arg("{SIDE}", libs, &data).as_deref(),
            Some("client")
        );
        assert_eq!(
            format_processor_arg("--in={PATCHED}", libs, &data).as_deref(),
            Some("--in=/tmp/patched.jar")
        );
        assert_eq!(
            format_processor_arg("'{not data}'", libs, &data).as_deref(),
            Some("{not data}")
        );
        assert_eq!(
            format_processor_arg("[net.minecraft:client:1.20.1:slim]", libs, &data).as_deref(),
            Some("/libs/net/minecraft/client/1.20.1/client-1.20.1-slim.jar")
        );
        assert!(format_processor_arg("{MAPPINGS}", libs, &data)
            .unwrap()
            .ends_with("mcp_config-1.20.1.zip"));
        assert_eq!(format_processor_arg("{MISSING}", libs, &data), None);
        assert_eq!(format_processor_arg("trailing\\", libs, &data), None);
    }

    #[test]
    fn task_names() {
        let task = |gav: &str, args: &[&str]| ProcessorTask {
            jar: Gav::parse(gav).unwrap(),
            classpath: Vec::new(),
            args: args.iter().map(|a| a.to_string()).collect(),
            outputs: Vec::new(),
        };
        assert_eq!(
            task("net.minecraftforge:installertools:1.3.0", &["--task", "MCP_DATA"]).name(),
            "mcp_data"
        );
        assert_eq!(task("net.minecraftforge:jarsplitter:1.1.4", &[]).name(), "split_jar");
        assert_eq!(task("net.minecraftforge:binarypatcher:1.1.1", &[]).name(), "patch_binary");
        assert_eq!(task("com.example:custom:1.0", &[]).name(), "custom");
    }

    #[test]
    fn manifest_main_class_with_continuation() {
        let manifest = "Manifest-Version: 1.0\nMain-Class: net.minecraftforge.installertools.Console\n Main\nCreated-By: test\n";
        assert_eq!(
            parse_main_class(manifest).as_deref(),
            Some("net.minecraftforge.installertools.ConsoleMain")
        );
        assert_eq!(parse_main_class("Manifest-Version: 1.0\n"), None);
    }

    struct Chain {
        _dir: tempfile::TempDir,
        libs: PathBuf,
        work: PathBuf,
        data: HashMap<String, DataEntry>,
        tasks: Vec<ProcessorTask>,
    }

    /// Task 1 writes `{PATCHED}`, task 2 reads it.
    fn chain(expected_sha1: &str) -> Chain {
        let dir = tempfile::tempdir().unwrap();
        let libs = dir.path().join("libraries");
        let work = dir.path().join("work");

        let patcher = Gav::parse("net.minecraftforge:binarypatcher:1.1.1").unwrap();
        let splitter = Gav::parse("net.minecraftforge:jarsplitter:1.1.4").unwrap();
        tool_jar(&libs, &patcher, "net.minecraftforge.binarypatcher.ConsoleTool");
        tool_jar(&libs, &splitter, "net.minecraftforge.jarsplitter.ConsoleTool");

        let data = data(&[
            ("PATCHED", DataEntry::File(dir.path().join("patched.jar"))),
            ("PATCHED_SHA", DataEntry::Literal(expected_sha1.to_string())),
        ]);
        let tasks = vec![
            ProcessorTask {
                jar: patcher,
                classpath: Vec::new(),
                args: vec!["--output".into(), "{PATCHED}".into()],
                outputs: vec![("{PATCHED}".into(), "{PATCHED_SHA}".into())],
            },
            ProcessorTask {
                jar: splitter,
                classpath: Vec::new(),
                args: vec!["--input".into(), "{PATCHED}".into()],
                outputs: Vec::new(),
            },
        ];

        Chain {
            _dir: dir,
            libs,
            work,
            data,
            tasks,
        }
    }

    /// Writes `body` to the file following `--output`.
    fn writing_runner(body: &'static [u8]) -> ScriptedRunner {
        ScriptedRunner::new(move |invocation| {
            if let Some(pos) = invocation.args.iter().position(|a| a == "--output") {
                std::fs::write(&invocation.args[pos + 1], body).unwrap();
            }
            success()
        })
    }

    #[tokio::test]
    async fn chain_runs_when_outputs_match() {
        let chain = chain(&sha1_hex(b"patched"));
        let runner = writing_runner(b"patched");
        let libraries = HashMap::new();
        let executor = ProcessorExecutor {
            runner: &runner,
            jvm: Path::new("java"),
            libraries_dir: &chain.libs,
            libraries: &libraries,
            data: &chain.data,
            timeout: Duration::from_secs(5),
        };
        let work_dir = InstallWorkDir::create(chain.work.clone()).await.unwrap();

        let mut runs = Vec::new();
        let mut hooks = HookSet::new().on_run_processor(|run| runs.push(run.name.clone()));
        executor
            .run_all(&chain.tasks, &work_dir, &mut hooks)
            .await
            .unwrap();
        drop(hooks);

        assert_eq!(runs, vec!["patch_binary", "split_jar"]);
        assert_eq!(
            runner.calls(),
            vec![
                "net.minecraftforge.binarypatcher.ConsoleTool",
                "net.minecraftforge.jarsplitter.ConsoleTool"
            ]
        );

        // Verified outputs are not produced twice
        let rerun = writing_runner(b"patched");
        let executor = ProcessorExecutor {
            runner: &rerun,
            ..executor
        };
        executor
            .run_all(&chain.tasks[..1], &work_dir, &mut HookSet::new())
            .await
            .unwrap();
        assert!(rerun.calls().is_empty());

        work_dir.release().await.unwrap();
        assert!(!chain.work.exists());
    }

    #[tokio::test]
    async fn corrupted_output_stops_the_chain() {
        let chain = chain(&sha1_hex(b"patched"));
        let runner = writing_runner(b"garbage");
        let libraries = HashMap::new();
        let executor = ProcessorExecutor {
            runner: &runner,
            jvm: Path::new("java"),
            libraries_dir: &chain.libs,
            libraries: &libraries,
            data: &chain.data,
            timeout: Duration::from_secs(5),
        };
        let work_dir = InstallWorkDir::create(chain.work.clone()).await.unwrap();

        let err = executor
            .run_all(&chain.tasks, &work_dir, &mut HookSet::new())
            .await
            .unwrap_err();
        match err {
            InstallError::ProcessorCorrupted { task, expected, .. } => {
                assert_eq!(task, "patch_binary");
                assert_eq!(expected, sha1_hex(b"patched"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.calls().len(), 1);
        // Diagnostic state is kept
        assert!(chain.work.is_dir());
    }

    #[tokio::test]
    async fn failures_carry_output_and_missing_tools_are_named() {
        let chain = chain(&sha1_hex(b"patched"));
        let runner = ScriptedRunner::new(|_| ToolOutput {
            status: Some(3),
            stdout: "patching".into(),
            stderr: "boom".into(),
            timed_out: false,
        });
        let libraries = HashMap::new();
        let executor = ProcessorExecutor {
            runner: &runner,
            jvm: Path::new("java"),
            libraries_dir: &chain.libs,
            libraries: &libraries,
            data: &chain.data,
            timeout: Duration::from_secs(5),
        };
        let work_dir = InstallWorkDir::create(chain.work.clone()).await.unwrap();

        let err = executor
            .run_all(&chain.tasks, &work_dir, &mut HookSet::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InstallError::ProcessorFailed { ref task, status: Some(3), ref stderr, .. }
                if task == "patch_binary" && stderr == "boom"
        ));

        let missing = vec![ProcessorTask {
            jar: Gav::parse("net.minecraftforge:installertools:1.3.0").unwrap(),
            classpath: Vec::new(),
            args: vec!["--task".into(), "MCP_DATA".into()],
            outputs: Vec::new(),
        }];
        let err = executor
            .run_all(&missing, &work_dir, &mut HookSet::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InstallError::ProcessorNotFound { ref task, ref gav }
                if task == "mcp_data" && gav == "net.minecraftforge:installertools:1.3.0"
        ));
    }

    /// Shell script standing in for the runtime, ignoring its arguments.
    #[cfg(unix)]
    fn script_jvm(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let file = dir.join("java");
        std::fs::write(&file, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o755)).unwrap();
        file
    }

    #[cfg(unix)]
    fn invocation(dir: &Path, jvm: PathBuf, timeout: Duration) -> ToolInvocation {
        ToolInvocation {
            jvm,
            classpath: vec![dir.join("tool.jar")],
            main_class: "net.minecraftforge.binarypatcher.ConsoleTool".into(),
            args: vec!["--output".into(), "patched.jar".into()],
            work_dir: dir.to_path_buf(),
            timeout,
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_runner_reports_status_and_streams() {
        let dir = tempfile::tempdir().unwrap();
        let jvm = script_jvm(dir.path(), "echo \"$4 $5\"\necho oops >&2\nexit 3");

        let output = CommandRunner
            .run(&invocation(dir.path(), jvm, Duration::from_secs(30)))
            .await
            .unwrap();
        assert_eq!(output.status, Some(3));
        assert!(!output.timed_out);
        assert!(!output.success());
        assert_eq!(output.stdout, "--output patched.jar\n");
        assert_eq!(output.stderr, "oops\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_runner_bounds_captured_output() {
        let dir = tempfile::tempdir().unwrap();
        let jvm = script_jvm(dir.path(), "head -c 100000 /dev/zero | tr '\\0' 'a'");

        let output = CommandRunner
            .run(&invocation(dir.path(), jvm, Duration::from_secs(30)))
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.len(), OUTPUT_LIMIT);
        assert!(output.stdout.bytes().all(|b| b == b'a'));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_runner_times_out_and_keeps_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let jvm = script_jvm(dir.path(), "echo started\necho warming >&2\nexec sleep 10");

        let started = std::time::Instant::now();
        let output = CommandRunner
            .run(&invocation(dir.path(), jvm, Duration::from_millis(500)))
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(output.timed_out);
        assert_eq!(output.status, None);
        assert!(!output.success());
        assert_eq!(output.stdout, "started\n");
        assert_eq!(output.stderr, "warming\n");
    }
}
