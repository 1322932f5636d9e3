//! Mapping test failures back to source lines

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::report::TestReport;

/// `<file>:<line>:` as emitted by assertion messages, e.g. `foo.c:10: ...`
static LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)[^\s:]+:(?P<line>\d+):").expect("valid location regex")
});

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Editor-agnostic annotation for a failing test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// 0-based source line
    pub line: usize,
    pub severity: Severity,
    pub message: String,
    /// Tag identifying who produced the diagnostic
    pub source: String,
}

/// Find the 0-based source line a failure message points at
///
/// Uses the first `<file>:<line>:` location in the message whose line
/// exists in `lines`. Returns `None` when nothing can be correlated.
pub fn locate_line<S: AsRef<str>>(lines: &[S], message: &str) -> Option<usize> {
    LOCATION
        .captures_iter(message)
        .filter_map(|caps| caps["line"].parse::<usize>().ok())
        // Reported lines are 1-based
        .find(|&line| line >= 1 && line <= lines.len())
        .map(|line| line - 1)
}

/// Build one diagnostic per failing test whose message maps to a line
///
/// Failures that cannot be located are dropped.
pub fn build_diagnostics<S: AsRef<str>>(
    lines: &[S],
    report: &TestReport,
    source: &str,
) -> Vec<Diagnostic> {
    report
        .failures()
        .filter_map(|test| {
            let message = test.message.as_deref().unwrap_or_default();
            match locate_line(lines, message) {
                Some(line) => Some(Diagnostic {
                    line,
                    severity: Severity::Error,
                    message: message.to_string(),
                    source: source.to_string(),
                }),
                None => {
                    tracing::debug!(suite = %test.suite, test = %test.name, "Failure not mapped to a source line");
                    None
                }
            }
        })
        .collect()
}
