//! Spine subprocess execution.
//!
//! Spawns `Spine -i <input> -o <output> -e <settings>`, streams both pipes
//! line by line to the observer, and races the process exit against the
//! timeout and the cancellation token.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use forge_core::config::ConverterConfig;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ConversionError;
use crate::observer::{ConversionObserver, OutputStream};

/// Windows process creation flag that suppresses the console window.
pub const CREATE_NO_WINDOW: u32 = 0x08000000;

/// How long reader tasks may keep draining after the process is gone.
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// One Spine command line.
#[derive(Debug, Clone)]
pub struct SpineInvocation {
    /// The Spine executable.
    pub executable: PathBuf,
    /// Project file passed with `-i`.
    pub input: PathBuf,
    /// Output directory passed with `-o`.
    pub output: PathBuf,
    /// Export settings file passed with `-e`.
    pub settings: PathBuf,
}

impl SpineInvocation {
    /// Arguments as separate argv entries.
    pub fn args(&self) -> Vec<OsString> {
        vec![
            "-i".into(),
            self.input.clone().into_os_string(),
            "-o".into(),
            self.output.clone().into_os_string(),
            "-e".into(),
            self.settings.clone().into_os_string(),
        ]
    }

    /// Human-readable command line with every path quoted.
    pub fn command_line(&self) -> String {
        format!(
            "\"{}\" -i \"{}\" -o \"{}\" -e \"{}\"",
            self.executable.display(),
            self.input.display(),
            self.output.display(),
            self.settings.display()
        )
    }

    /// Working directory for the process: the input file's directory.
    pub fn working_dir(&self) -> Option<&Path> {
        self.input.parent().filter(|p| !p.as_os_str().is_empty())
    }
}

/// How the process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Exited on its own with this code.
    Exited(i32),
    /// Ended without an exit code (killed by a signal).
    Signalled,
    /// Killed after exceeding the timeout.
    TimedOut,
    /// Killed because the cancellation token fired.
    Cancelled,
}

/// Collected result of one process run.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// How the process ended.
    pub status: ProcessStatus,
    /// Non-empty stdout lines in arrival order.
    pub stdout: Vec<String>,
    /// Non-empty stderr lines in arrival order.
    pub stderr: Vec<String>,
    /// Wall time from spawn to exit.
    pub duration: Duration,
}

impl ProcessOutput {
    /// True when the process exited with code 0.
    pub fn success(&self) -> bool {
        self.status == ProcessStatus::Exited(0)
    }

    /// Exit code, if the process exited on its own.
    pub fn exit_code(&self) -> Option<i32> {
        match self.status {
            ProcessStatus::Exited(code) => Some(code),
            _ => None,
        }
    }
}

/// Runs the Spine executable with a timeout.
#[derive(Debug, Clone)]
pub struct SpineExecutor {
    timeout: Duration,
    force_utf8_env: bool,
}

impl SpineExecutor {
    /// Executor with an explicit timeout.
    pub fn new(timeout: Duration, force_utf8_env: bool) -> Self {
        Self {
            timeout,
            force_utf8_env,
        }
    }

    /// Executor using the configured timeout and environment settings.
    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(
            Duration::from_secs(config.timeout_seconds),
            config.force_utf8_env,
        )
    }

    /// The per-run timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one invocation to completion, timeout or cancellation.
    ///
    /// Only spawn and wait failures are errors. Every way the process can end
    /// is reported through [`ProcessStatus`].
    pub async fn run(
        &self,
        invocation: &SpineInvocation,
        observer: Arc<dyn ConversionObserver>,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, ConversionError> {
        let mut cmd = Command::new(&invocation.executable);
        cmd.args(invocation.args());

        if let Some(dir) = invocation.working_dir() {
            cmd.current_dir(dir);
        }

        if self.force_utf8_env {
            cmd.env("PYTHONIOENCODING", "utf-8")
                .env("LC_ALL", "en_US.UTF-8")
                .env("LANG", "en_US.UTF-8");
        }

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(command = %invocation.command_line(), "Launching Spine");

        let start = Instant::now();
        let mut child = cmd.spawn()?;

        let stdout_lines = Arc::new(Mutex::new(Vec::new()));
        let stderr_lines = Arc::new(Mutex::new(Vec::new()));
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(
                stdout,
                OutputStream::Stdout,
                Arc::clone(&observer),
                Arc::clone(&stdout_lines),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(
                stderr,
                OutputStream::Stderr,
                Arc::clone(&observer),
                Arc::clone(&stderr_lines),
            ));
        }

        let status = tokio::select! {
            result = child.wait() => {
                let exit = result?;
                match exit.code() {
                    Some(code) => ProcessStatus::Exited(code),
                    None => ProcessStatus::Signalled,
                }
            }
            _ = tokio::time::sleep(self.timeout) => {
                error!(
                    timeout_secs = self.timeout.as_secs(),
                    "Spine process timed out, killing"
                );
                let _ = child.kill().await;
                ProcessStatus::TimedOut
            }
            _ = cancel.cancelled() => {
                warn!("Spine process cancelled, killing");
                let _ = child.kill().await;
                ProcessStatus::Cancelled
            }
        };

        for reader in readers {
            drain_reader(reader).await;
        }

        let duration = start.elapsed();
        debug!(?status, duration_ms = duration.as_millis() as u64, "Spine process finished");

        Ok(ProcessOutput {
            status,
            stdout: take_lines(&stdout_lines),
            stderr: take_lines(&stderr_lines),
            duration,
        })
    }
}

/// Read a pipe line by line, forwarding each line as it arrives.
///
/// Invalid UTF-8 is replaced rather than ending the stream.
fn spawn_reader<R>(
    pipe: R,
    stream: OutputStream,
    observer: Arc<dyn ConversionObserver>,
    sink: Arc<Mutex<Vec<String>>>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\r', '\n'])
                        .to_string();
                    if line.is_empty() {
                        continue;
                    }
                    observer.output_line(stream, &line);
                    if let Ok(mut lines) = sink.lock() {
                        lines.push(line);
                    }
                }
                Err(e) => {
                    debug!(?stream, error = %e, "Output reader stopped");
                    break;
                }
            }
        }
    })
}

/// Give a reader a bounded time to finish, then abort it.
///
/// A grandchild process can keep the pipe open after the child is killed.
async fn drain_reader(mut handle: JoinHandle<()>) {
    if tokio::time::timeout(READER_DRAIN_TIMEOUT, &mut handle)
        .await
        .is_err()
    {
        debug!("Output reader still running after process exit, aborting");
        handle.abort();
    }
}

fn take_lines(lines: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    lines
        .lock()
        .map(|mut l| std::mem::take(&mut *l))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::RecordingObserver;

    fn invocation(exe: &Path) -> SpineInvocation {
        SpineInvocation {
            executable: exe.to_path_buf(),
            input: PathBuf::from("/art/my hero/hero.spine"),
            output: PathBuf::from("/out dir"),
            settings: PathBuf::from("/tmp/settings.json"),
        }
    }

    #[test]
    fn test_args_are_separate_entries() {
        let inv = invocation(Path::new("/opt/spine/spine"));
        let args = inv.args();
        assert_eq!(args.len(), 6);
        assert_eq!(args[0], "-i");
        assert_eq!(args[1], "/art/my hero/hero.spine");
        assert_eq!(args[3], "/out dir");
        assert_eq!(args[4], "-e");
    }

    #[test]
    fn test_command_line_quotes_paths() {
        let inv = invocation(Path::new("/opt/spine/spine"));
        assert_eq!(
            inv.command_line(),
            "\"/opt/spine/spine\" -i \"/art/my hero/hero.spine\" -o \"/out dir\" -e \"/tmp/settings.json\""
        );
        assert_eq!(inv.working_dir(), Some(Path::new("/art/my hero")));
    }

    #[test]
    fn test_exit_code_only_for_exited() {
        let out = ProcessOutput {
            status: ProcessStatus::TimedOut,
            stdout: vec![],
            stderr: vec![],
            duration: Duration::ZERO,
        };
        assert!(!out.success());
        assert_eq!(out.exit_code(), None);
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("spine");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write");
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .expect("chmod");
            path
        }

        fn local_invocation(dir: &Path, exe: PathBuf) -> SpineInvocation {
            SpineInvocation {
                executable: exe,
                input: dir.join("hero.spine"),
                output: dir.join("out"),
                settings: dir.join("settings.json"),
            }
        }

        #[tokio::test]
        async fn test_streams_lines_and_exit_code() {
            let temp = tempfile::tempdir().expect("tempdir");
            let exe = script(
                temp.path(),
                "echo \"args: $1 $3 $5\"\necho 'oops' >&2\nexit 3",
            );
            let observer = Arc::new(RecordingObserver::new());
            let executor = SpineExecutor::new(Duration::from_secs(10), false);

            let output = executor
                .run(
                    &local_invocation(temp.path(), exe),
                    observer.clone(),
                    &CancellationToken::new(),
                )
                .await
                .expect("run");

            assert_eq!(output.status, ProcessStatus::Exited(3));
            assert_eq!(output.stdout, vec!["args: -i -o -e"]);
            assert_eq!(output.stderr, vec!["oops"]);
            assert_eq!(observer.lines(OutputStream::Stdout), vec!["args: -i -o -e"]);
        }

        #[tokio::test]
        async fn test_timeout_kills_process() {
            let temp = tempfile::tempdir().expect("tempdir");
            let exe = script(temp.path(), "echo started\nexec sleep 30");
            let executor = SpineExecutor::new(Duration::from_millis(300), false);

            let start = Instant::now();
            let output = executor
                .run(
                    &local_invocation(temp.path(), exe),
                    Arc::new(RecordingObserver::new()),
                    &CancellationToken::new(),
                )
                .await
                .expect("run");

            assert_eq!(output.status, ProcessStatus::TimedOut);
            assert!(start.elapsed() < Duration::from_secs(10));
            assert_eq!(output.stdout, vec!["started"]);
        }

        #[tokio::test]
        async fn test_cancellation_kills_process() {
            let temp = tempfile::tempdir().expect("tempdir");
            let exe = script(temp.path(), "exec sleep 30");
            let executor = SpineExecutor::new(Duration::from_secs(30), false);
            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                trigger.cancel();
            });

            let output = executor
                .run(
                    &local_invocation(temp.path(), exe),
                    Arc::new(RecordingObserver::new()),
                    &cancel,
                )
                .await
                .expect("run");
            assert_eq!(output.status, ProcessStatus::Cancelled);
        }

        #[tokio::test]
        async fn test_utf8_env_is_forwarded() {
            let temp = tempfile::tempdir().expect("tempdir");
            let exe = script(temp.path(), "echo \"$PYTHONIOENCODING\"");
            let executor = SpineExecutor::new(Duration::from_secs(10), true);

            let output = executor
                .run(
                    &local_invocation(temp.path(), exe),
                    Arc::new(RecordingObserver::new()),
                    &CancellationToken::new(),
                )
                .await
                .expect("run");
            assert!(output.success());
            assert_eq!(output.stdout, vec!["utf-8"]);
        }
    }
}
