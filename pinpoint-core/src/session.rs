//! Run pipeline: build, execute, parse, annotate
//!
//! A [`Session`] owns the state of one editor buffer's runs: the build
//! tool, runner arguments and the report of the most recent run. Runs on a
//! session never overlap; a second run while one is in flight is rejected.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::args::build_filter_args;
use crate::build::{BuildTool, CommandBuild};
use crate::config::Config;
use crate::diagnostics::{build_diagnostics, Diagnostic};
use crate::executor::spawn_test;
use crate::report::{parse_report, TestReport};
use crate::request::RunRequest;
use crate::{Error, Result};

/// One event of the diagnostic stream sent to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RunEvent {
    /// A line of build output or test stderr
    Stderr { text: String },
    /// Terminates every run that got past the "nothing to run" check
    Exit { code: i32 },
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The request had nothing runnable
    NothingToRun,
    /// The build failed, so no test process was spawned
    BuildFailed { exit_code: i32 },
    /// The test executable could not be started
    SpawnFailed { exit_code: i32 },
    /// The process ran but its stdout was not a report
    Undecodable { exit_code: i32 },
    /// The process ran and its report was decoded
    Completed {
        exit_code: i32,
        failures: usize,
        diagnostics: Vec<Diagnostic>,
    },
}

impl RunOutcome {
    /// Exit code carried by the terminal exit event, if one was sent
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RunOutcome::NothingToRun => None,
            RunOutcome::BuildFailed { exit_code }
            | RunOutcome::SpawnFailed { exit_code }
            | RunOutcome::Undecodable { exit_code }
            | RunOutcome::Completed { exit_code, .. } => Some(*exit_code),
        }
    }

    /// Diagnostics produced by the run (empty unless it completed)
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            RunOutcome::Completed { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}

/// Receives the events of a run as they happen
pub trait RunHandler: Send {
    /// Called for every build output line on build failure and every test stderr line
    fn on_stderr(&mut self, line: &str);

    /// Called exactly once when the run ends
    fn on_exit(&mut self, code: i32);

    /// Called instead of any other callback when the request is not runnable
    fn on_nothing_to_run(&mut self) {}

    /// Called with the full replacement diagnostic set after the process exits
    fn on_diagnostics(&mut self, _diagnostics: &[Diagnostic]) {}
}

/// Handler that prints run events to the terminal
pub struct PrintHandler {
    /// Buffer name used as the file part of printed diagnostics
    buffer: String,
    verbose: bool,
}

impl PrintHandler {
    /// Create a new print handler
    pub fn new(buffer: impl Into<String>, verbose: bool) -> Self {
        Self {
            buffer: buffer.into(),
            verbose,
        }
    }
}

impl RunHandler for PrintHandler {
    fn on_stderr(&mut self, line: &str) {
        eprintln!("{}", line);
    }

    fn on_exit(&mut self, code: i32) {
        if self.verbose {
            eprintln!("[exit: {}]", code);
        }
    }

    fn on_nothing_to_run(&mut self) {
        println!("Nothing to run: no test found near the cursor");
    }

    fn on_diagnostics(&mut self, diagnostics: &[Diagnostic]) {
        for d in diagnostics {
            println!("{}:{}: {}: {}", self.buffer, d.line + 1, d.severity, d.message);
        }
    }
}

/// Handler that records everything it receives
#[derive(Debug, Default)]
pub struct EventLog {
    pub events: Vec<RunEvent>,
    pub diagnostics: Vec<Diagnostic>,
    pub nothing_to_run: bool,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text of every stderr event, in order
    pub fn stderr_lines(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                RunEvent::Stderr { text } => Some(text.as_str()),
                RunEvent::Exit { .. } => None,
            })
            .collect()
    }

    /// Codes of every exit event, in order
    pub fn exit_codes(&self) -> Vec<i32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                RunEvent::Exit { code } => Some(*code),
                RunEvent::Stderr { .. } => None,
            })
            .collect()
    }
}

impl RunHandler for EventLog {
    fn on_stderr(&mut self, line: &str) {
        self.events.push(RunEvent::Stderr {
            text: line.to_string(),
        });
    }

    fn on_exit(&mut self, code: i32) {
        self.events.push(RunEvent::Exit { code });
    }

    fn on_nothing_to_run(&mut self) {
        self.nothing_to_run = true;
    }

    fn on_diagnostics(&mut self, diagnostics: &[Diagnostic]) {
        self.diagnostics = diagnostics.to_vec();
    }
}

/// Marks a run as in flight until dropped
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::RunInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Pipeline state for one buffer
pub struct Session {
    /// `None` when compiling is disabled
    build: Option<Box<dyn BuildTool>>,
    build_dir: PathBuf,
    runner_args: Vec<String>,
    source: String,
    last_report: Mutex<Option<TestReport>>,
    in_flight: AtomicBool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("build", &self.build.as_ref().map(|b| b.name().to_string()))
            .field("build_dir", &self.build_dir)
            .field("runner_args", &self.runner_args)
            .field("source", &self.source)
            .field("in_flight", &self.is_running())
            .finish()
    }
}

impl Session {
    /// Create a session that builds with the configured command
    pub fn new(config: &Config) -> Self {
        let build: Option<Box<dyn BuildTool>> = if config.build.enabled {
            Some(Box::new(CommandBuild::from_config(&config.build)))
        } else {
            None
        };
        Self::with_parts(config, build)
    }

    /// Create a session with a custom build tool
    pub fn with_build_tool(config: &Config, build: Box<dyn BuildTool>) -> Self {
        Self::with_parts(config, Some(build))
    }

    fn with_parts(config: &Config, build: Option<Box<dyn BuildTool>>) -> Self {
        Self {
            build,
            build_dir: config.build.directory.clone(),
            runner_args: config.runner.args.clone(),
            source: config.diagnostics.source.clone(),
            last_report: Mutex::new(None),
            in_flight: AtomicBool::new(false),
        }
    }

    /// True while a run is in flight
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Report of the most recent run that produced one
    pub fn last_report(&self) -> Option<TestReport> {
        self.report_slot().clone()
    }

    /// Diagnostics for `lines` computed from the most recent report
    pub fn diagnostics<S: AsRef<str>>(&self, lines: &[S]) -> Vec<Diagnostic> {
        match self.report_slot().as_ref() {
            Some(report) => build_diagnostics(lines, report, &self.source),
            None => Vec::new(),
        }
    }

    fn report_slot(&self) -> MutexGuard<'_, Option<TestReport>> {
        self.last_report.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `request` and report progress to `handler`
    ///
    /// `lines` is the full text of the request's buffer. Build, spawn and
    /// decode failures end the run with an exit event and are returned as
    /// a [`RunOutcome`]; `Err` is reserved for overlapping runs and I/O
    /// failures while waiting on the process.
    pub async fn run<S, H>(
        &self,
        request: &RunRequest,
        lines: &[S],
        handler: &mut H,
    ) -> Result<RunOutcome>
    where
        S: AsRef<str> + Sync,
        H: RunHandler,
    {
        let Some(executable) = request.executable() else {
            tracing::info!(buffer = %request.buffer(), "Nothing to run");
            handler.on_nothing_to_run();
            return Ok(RunOutcome::NothingToRun);
        };

        let _guard = RunGuard::acquire(&self.in_flight)?;

        if let Some(build) = &self.build {
            let outcome = build.compile(&self.build_dir).await;
            if !outcome.success() {
                for line in &outcome.output_lines {
                    handler.on_stderr(line);
                }
                handler.on_exit(outcome.exit_code);
                return Ok(RunOutcome::BuildFailed {
                    exit_code: outcome.exit_code,
                });
            }
        }

        let mut args = self.runner_args.clone();
        args.extend(build_filter_args(request.identifier()));
        tracing::info!(
            executable = %executable.display(),
            test = %request.identifier().map(ToString::to_string).unwrap_or_else(|| "*".to_string()),
            "Running tests"
        );

        let process = match spawn_test(executable, &args) {
            Ok(process) => process,
            Err(e) => {
                let exit_code = e.exit_code();
                handler.on_stderr(&e.to_string());
                handler.on_exit(exit_code);
                return Ok(RunOutcome::SpawnFailed { exit_code });
            }
        };

        let output = match process.run_to_end(|line| handler.on_stderr(line)).await {
            Ok(output) => output,
            Err(e) => {
                handler.on_stderr(&e.to_string());
                handler.on_exit(e.exit_code());
                return Err(e);
            }
        };
        handler.on_exit(output.exit_code);

        let report = match parse_report(&output.stdout) {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(error = %e, exit_code = output.exit_code, "No test results available");
                *self.report_slot() = None;
                handler.on_diagnostics(&[]);
                return Ok(RunOutcome::Undecodable {
                    exit_code: output.exit_code,
                });
            }
        };

        let diagnostics = build_diagnostics(lines, &report, &self.source);
        let failures = report.failed();
        tracing::info!(summary = %report.summary(), diagnostics = diagnostics.len(), "Run complete");
        *self.report_slot() = Some(report);
        handler.on_diagnostics(&diagnostics);

        Ok(RunOutcome::Completed {
            exit_code: output.exit_code,
            failures,
            diagnostics,
        })
    }
}
