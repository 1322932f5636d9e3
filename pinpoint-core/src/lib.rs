//! Pinpoint Core - Run the test nearest a cursor and annotate its failures
//!
//! The pipeline locates the nearest test declaration in raw source text,
//! compiles the project, runs the test executable with a suite/name filter
//! while streaming its stderr, decodes the JSON report it prints on stdout,
//! and maps failure messages back to source lines.

pub mod args;
pub mod build;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod locator;
pub mod report;
pub mod request;
pub mod session;

pub use args::build_filter_args;
pub use build::{BuildOutcome, BuildTool, CommandBuild};
pub use config::Config;
pub use diagnostics::{build_diagnostics, locate_line, Diagnostic, Severity};
pub use error::{Error, Result};
pub use executor::{spawn_test, RunOutput, TestProcess};
pub use locator::{extract_identifier, find_nearest_test, TestIdentifier};
pub use report::{parse_report, TestCase, TestReport};
pub use request::{BuildDirResolver, CursorPosition, ExecutableResolver, FixedExecutable, RunRequest};
pub use session::{EventLog, PrintHandler, RunEvent, RunHandler, RunOutcome, Session};
