//! Run command - Build and run the test nearest a line

use std::path::PathBuf;

use clap::Args;
use pinpoint_core::{
    BuildDirResolver, Config, CursorPosition, EventLog, ExecutableResolver, FixedExecutable,
    PrintHandler, RunEvent, RunOutcome, RunRequest, Session,
};
use serde::Serialize;

use super::{read_lines, zero_based};

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Source file containing the tests
    #[arg(required = true)]
    pub file: PathBuf,

    /// Cursor line (1-based)
    #[arg(short, long, default_value = "1")]
    pub line: usize,

    /// Cursor column (1-based)
    #[arg(short, long, default_value = "1")]
    pub column: usize,

    /// Test executable (defaults to a lookup in the build directory)
    #[arg(short = 'x', long)]
    pub executable: Option<PathBuf>,

    /// Print events and outcome as JSON instead of plain text
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct JsonRun<'a> {
    events: &'a [RunEvent],
    outcome: &'a RunOutcome,
}

impl RunArgs {
    /// Execute the run command, returning the exit code of the run
    pub async fn execute(&self, verbose: bool, config: &Config) -> anyhow::Result<i32> {
        let lines = read_lines(&self.file)?;
        let buffer = self.file.display().to_string();
        let cursor = CursorPosition::new(zero_based(self.line), zero_based(self.column));

        let resolver: Box<dyn ExecutableResolver> = match &self.executable {
            Some(path) => Box::new(FixedExecutable(path.clone())),
            None => Box::new(BuildDirResolver::new(&config.build.directory)),
        };
        let request = RunRequest::for_cursor(buffer.clone(), &lines, cursor, resolver.as_ref());

        if verbose {
            tracing::info!(
                file = %buffer,
                line = self.line,
                test = ?request.identifier(),
                executable = ?request.executable(),
                "Run request"
            );
        }
        if !request.can_run() && request.identifier().is_some() {
            tracing::warn!(
                build_dir = %config.build.directory.display(),
                "Found a test but no executable for it; pass --executable"
            );
        }

        let session = Session::new(config);

        let outcome = if self.json {
            let mut log = EventLog::new();
            let outcome = session.run(&request, &lines, &mut log).await?;
            let out = JsonRun {
                events: &log.events,
                outcome: &outcome,
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
            outcome
        } else {
            let mut handler = PrintHandler::new(buffer, verbose);
            let outcome = session.run(&request, &lines, &mut handler).await?;
            match &outcome {
                RunOutcome::Completed { .. } => {
                    if let Some(report) = session.last_report() {
                        println!("{}", report.summary());
                    }
                }
                RunOutcome::Undecodable { exit_code } => {
                    println!("No test results available (exit code {})", exit_code);
                }
                RunOutcome::BuildFailed { exit_code } => {
                    println!("Build failed (exit code {})", exit_code);
                }
                RunOutcome::SpawnFailed { .. } | RunOutcome::NothingToRun => {}
            }
            outcome
        };

        Ok(outcome.exit_code().unwrap_or(0))
    }
}
