//! Structured test report decoding
//!
//! The test executable prints a single JSON document on stdout. Two shapes
//! are accepted:
//!
//! - the flat shape, `{"tests":[{"suite","name","passed","message"}]}`
//! - Criterion's `--json` shape, `{"test_suites":[{"name","tests":[{"name","status","messages"}]}]}`
//!
//! Both are normalized into a [`TestReport`].

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Outcome of one test case
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TestCase {
    #[serde(default)]
    pub suite: String,
    pub name: String,
    pub passed: bool,
    /// Free-text failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Decoded result of one test run, in the executable's own order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TestReport {
    pub tests: Vec<TestCase>,
}

impl TestReport {
    /// Failing test cases in report order
    pub fn failures(&self) -> impl Iterator<Item = &TestCase> {
        self.tests.iter().filter(|t| !t.passed)
    }

    /// One message per failing test, in report order
    ///
    /// A failure without a message yields an empty string.
    pub fn failure_messages(&self) -> Vec<String> {
        self.failures()
            .map(|t| t.message.clone().unwrap_or_default())
            .collect()
    }

    /// Number of passing tests
    pub fn passed(&self) -> usize {
        self.tests.iter().filter(|t| t.passed).count()
    }

    /// Number of failing tests
    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    /// Get a summary string
    pub fn summary(&self) -> String {
        if self.tests.is_empty() {
            return "No tests ran".to_string();
        }
        format!("{} passed, {} failed", self.passed(), self.failed())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReportDocument {
    Flat { tests: Vec<TestCase> },
    Criterion { test_suites: Vec<CriterionSuite> },
}

#[derive(Debug, Deserialize)]
struct CriterionSuite {
    name: String,
    #[serde(default)]
    tests: Vec<CriterionTest>,
}

#[derive(Debug, Deserialize)]
struct CriterionTest {
    name: String,
    status: String,
    #[serde(default)]
    messages: Vec<String>,
}

impl From<ReportDocument> for TestReport {
    fn from(doc: ReportDocument) -> Self {
        let tests = match doc {
            ReportDocument::Flat { tests } => tests,
            ReportDocument::Criterion { test_suites } => test_suites
                .into_iter()
                .flat_map(|suite| {
                    let suite_name = suite.name;
                    suite.tests.into_iter().map(move |test| {
                        // Skipped tests are not failures
                        let passed = matches!(test.status.as_str(), "PASSED" | "SKIPPED");
                        let message = (!test.messages.is_empty()).then(|| test.messages.join("\n"));
                        TestCase {
                            suite: suite_name.clone(),
                            name: test.name,
                            passed,
                            message,
                        }
                    })
                })
                .collect(),
        };
        Self { tests }
    }
}

/// Decode the complete stdout of a test run
///
/// Fails with [`Error::Decode`] when the buffer is empty, truncated or
/// otherwise not a report. That means "no results available", never
/// "zero failures".
pub fn parse_report(stdout: &str) -> Result<TestReport> {
    let value: serde_json::Value = serde_json::from_str(stdout).map_err(Error::Decode)?;
    let doc: ReportDocument = serde_json::from_value(value).map_err(Error::Decode)?;
    Ok(doc.into())
}
