//! Build orchestration
//!
//! The test runtime may skip stale tests silently when its own implicit
//! rebuild fails, so the project is compiled explicitly first and the
//! build output is surfaced when it fails.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::config::BuildConfig;
use crate::error::spawn_exit_code;
use crate::executor::{next_line_lossy, status_code};

/// Placeholder in build arguments replaced with the build directory
pub const BUILD_DIR_PLACEHOLDER: &str = "{build_dir}";

/// Result of one build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub exit_code: i32,
    /// Captured stdout and stderr lines in arrival order
    pub output_lines: Vec<String>,
}

impl BuildOutcome {
    /// Outcome of a build that did not need to run
    pub fn skipped() -> Self {
        Self {
            exit_code: 0,
            output_lines: Vec::new(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Something that can compile a project
#[async_trait]
pub trait BuildTool: Send + Sync {
    /// Get the name of this build tool
    fn name(&self) -> &str;

    /// Compile everything in `build_dir`
    ///
    /// Never fails outright: a build command that cannot be started is
    /// reported as a failed outcome.
    async fn compile(&self, build_dir: &Path) -> BuildOutcome;
}

/// Build tool that runs an external command such as `make -C build`
#[derive(Debug, Clone)]
pub struct CommandBuild {
    command: String,
    args: Vec<String>,
}

impl CommandBuild {
    /// Create a build tool running `command` with `args`
    ///
    /// Occurrences of `{build_dir}` in `args` are substituted at compile time.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Create a build tool from configuration
    pub fn from_config(config: &BuildConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone())
    }

    fn build_command(&self, build_dir: &Path) -> Command {
        let dir = build_dir.to_string_lossy();
        let mut cmd = Command::new(&self.command);
        cmd.args(
            self.args
                .iter()
                .map(|arg| arg.replace(BUILD_DIR_PLACEHOLDER, &dir)),
        )
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl BuildTool for CommandBuild {
    fn name(&self) -> &str {
        &self.command
    }

    async fn compile(&self, build_dir: &Path) -> BuildOutcome {
        tracing::info!(command = %self.command, build_dir = %build_dir.display(), "Compiling");

        let mut child = match self.build_command(build_dir).spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(command = %self.command, error = %e, "Build command could not be started");
                return BuildOutcome {
                    exit_code: spawn_exit_code(&e),
                    output_lines: vec![format!("{}: {}", self.command, e)],
                };
            }
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        let mut output_lines = Vec::new();
        while let Some(line) = rx.recv().await {
            output_lines.push(line);
        }

        let exit_code = match child.wait().await {
            Ok(status) => status_code(status),
            Err(e) => {
                output_lines.push(format!("{}: {}", self.command, e));
                1
            }
        };

        if exit_code == 0 {
            tracing::info!(lines = output_lines.len(), "Build succeeded");
        } else {
            tracing::warn!(exit_code, lines = output_lines.len(), "Build failed");
        }

        BuildOutcome {
            exit_code,
            output_lines,
        }
    }
}

/// Send every line of `reader` until EOF
///
/// The pipe is drained to the end even if the receiver is gone, so the
/// build never dies writing to a closed pipe.
async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    while let Some(line) = next_line_lossy(&mut reader, &mut buf).await {
        let _ = tx.send(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(script: &str) -> CommandBuild {
        CommandBuild::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn test_successful_build() {
        let dir = TempDir::new().unwrap();
        let outcome = sh("echo compiling; echo done").compile(dir.path()).await;
        assert!(outcome.success());
        assert_eq!(outcome.output_lines, vec!["compiling", "done"]);
    }

    #[tokio::test]
    async fn test_failed_build_captures_both_streams() {
        let dir = TempDir::new().unwrap();
        let outcome = sh("echo 'error: foo.c:10' >&2; exit 1")
            .compile(dir.path())
            .await;
        assert!(!outcome.success());
        assert_eq!(outcome.exit_code, 1);
        assert_eq!(outcome.output_lines, vec!["error: foo.c:10"]);
    }

    #[tokio::test]
    async fn test_non_utf8_output_does_not_fail_build() {
        let dir = TempDir::new().unwrap();
        let outcome = sh("printf 'caf\\351\\n'; seq 1 2000 >&2; echo linked")
            .compile(dir.path())
            .await;
        assert!(outcome.success());
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.output_lines.len(), 2002);
        assert!(outcome.output_lines.contains(&"caf\u{FFFD}".to_string()));
        assert!(outcome.output_lines.contains(&"linked".to_string()));
        assert!(outcome.output_lines.contains(&"2000".to_string()));
    }

    #[tokio::test]
    async fn test_build_dir_is_substituted() {
        let dir = TempDir::new().unwrap();
        let build = CommandBuild::new(
            "sh",
            vec![
                "-c".to_string(),
                "echo \"$1\"".to_string(),
                "sh".to_string(),
                "{build_dir}".to_string(),
            ],
        );
        let outcome = build.compile(dir.path()).await;
        assert_eq!(
            outcome.output_lines,
            vec![dir.path().to_string_lossy().to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_build_command() {
        let dir = TempDir::new().unwrap();
        let build = CommandBuild::new("/nonexistent/pinpoint-build-12345", Vec::new());
        let outcome = build.compile(dir.path()).await;
        assert_eq!(outcome.exit_code, 127);
        assert_eq!(outcome.output_lines.len(), 1);
    }

    #[test]
    fn test_skipped_outcome_succeeds() {
        assert!(BuildOutcome::skipped().success());
    }
}
