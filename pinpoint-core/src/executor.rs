//! Test process execution
//!
//! Each spawned executable gets two independent channels. Stderr is read
//! line by line and forwarded as it arrives, so callers can show progress.
//! Stdout is accumulated silently, because the report it carries can only
//! be parsed once it is complete. The two are joined when the process exits.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};

use crate::{Error, Result};

/// Stderr lines buffered before the reader waits for the consumer
const STDERR_CHANNEL_CAPACITY: usize = 64;

/// Everything a finished test process produced besides stderr
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// Complete stdout of the process
    pub stdout: String,
    pub exit_code: i32,
}

/// Handle to a running test executable
pub struct TestProcess {
    id: Option<u32>,
    executable: PathBuf,
    stderr: mpsc::Receiver<String>,
    done: oneshot::Receiver<Result<RunOutput>>,
    kill: Option<oneshot::Sender<()>>,
}

impl std::fmt::Debug for TestProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestProcess")
            .field("id", &self.id)
            .field("executable", &self.executable)
            .finish()
    }
}

impl TestProcess {
    /// OS process identifier, for tracking or terminating the run out-of-band
    pub fn id(&self) -> Option<u32> {
        self.id
    }

    /// Path of the running executable
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Terminate the process
    ///
    /// The run still completes normally afterwards, with the exit code of
    /// the killed process.
    pub fn kill(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }

    /// Next stderr line, or `None` once stderr is closed
    pub async fn next_stderr_line(&mut self) -> Option<String> {
        self.stderr.recv().await
    }

    /// Deliver every remaining stderr line to `on_stderr`, then wait for exit
    ///
    /// Lines are delivered in the order the process wrote them, and all of
    /// them are delivered before this returns.
    pub async fn run_to_end<F>(mut self, mut on_stderr: F) -> Result<RunOutput>
    where
        F: FnMut(&str),
    {
        while let Some(line) = self.stderr.recv().await {
            on_stderr(&line);
        }

        let output = self
            .done
            .await
            .map_err(|_| Error::Io(std::io::Error::other("test process waiter stopped")))??;

        tracing::info!(
            executable = %self.executable.display(),
            exit_code = output.exit_code,
            stdout_bytes = output.stdout.len(),
            "Test process exited"
        );
        Ok(output)
    }

    /// Wait for exit, discarding stderr
    pub async fn finish(self) -> Result<RunOutput> {
        self.run_to_end(|_| {}).await
    }
}

/// Spawn `executable` with `args`
///
/// Must be called from within a tokio runtime. The environment is
/// inherited. Dropping the returned handle kills the process.
pub fn spawn_test(executable: &Path, args: &[String]) -> Result<TestProcess> {
    tracing::debug!(executable = %executable.display(), ?args, "Spawning test executable");

    let mut child = Command::new(executable)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| {
            tracing::warn!(executable = %executable.display(), error = %source, "Failed to spawn test executable");
            Error::Spawn {
                path: executable.to_path_buf(),
                source,
            }
        })?;

    let id = child.id();
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Io(std::io::Error::other("stdout was not captured")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::Io(std::io::Error::other("stderr was not captured")))?;

    let (stderr_tx, stderr_rx) = mpsc::channel(STDERR_CHANNEL_CAPACITY);
    tokio::spawn(stream_stderr(stderr, stderr_tx));

    let (done_tx, done_rx) = oneshot::channel();
    let (kill_tx, mut kill_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let stdout_task = tokio::spawn(collect_stdout(stdout));

        let status = tokio::select! {
            status = child.wait() => status,
            // Fires on an explicit kill and when the handle is dropped
            _ = &mut kill_rx => {
                let _ = child.start_kill();
                child.wait().await
            }
        };

        let result: Result<RunOutput> = async {
            let status = status?;
            let stdout = stdout_task.await.map_err(std::io::Error::other)??;
            Ok(RunOutput {
                stdout,
                exit_code: status_code(status),
            })
        }
        .await;

        let _ = done_tx.send(result);
    });

    Ok(TestProcess {
        id,
        executable: executable.to_path_buf(),
        stderr: stderr_rx,
        done: done_rx,
        kill: Some(kill_tx),
    })
}

async fn stream_stderr(stderr: ChildStderr, tx: mpsc::Sender<String>) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    while let Some(line) = next_line_lossy(&mut reader, &mut buf).await {
        // Keep draining after the receiver is gone so the child never blocks on a full pipe
        let _ = tx.send(line).await;
    }
}

/// Read the next line, replacing invalid UTF-8 instead of failing
///
/// Returns `None` only at end of stream or on a read error, so a stray
/// non-UTF-8 byte never closes the pipe under a still-running child.
pub(crate) async fn next_line_lossy<R>(reader: &mut R, buf: &mut Vec<u8>) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    match reader.read_until(b'\n', buf).await {
        Ok(0) => None,
        Ok(_) => {
            if buf.last() == Some(&b'\n') {
                buf.pop();
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
            }
            Some(String::from_utf8_lossy(buf).into_owned())
        }
        Err(err) => {
            tracing::debug!(error = %err, "Stopped reading process output");
            None
        }
    }
}

async fn collect_stdout(mut stdout: ChildStdout) -> std::io::Result<String> {
    let mut buf = Vec::new();
    stdout.read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Exit code of a finished process
///
/// On Unix a process killed by a signal reports `128 + signal`.
pub(crate) fn status_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
