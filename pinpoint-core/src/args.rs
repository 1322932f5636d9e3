//! Filter arguments for the test executable

use crate::locator::TestIdentifier;

/// Flag the test executable uses to restrict a run
pub const FILTER_FLAG: &str = "--filter";

/// Build the arguments that restrict a run to `identifier`
///
/// Suite and name select exactly one test, a suite alone selects every
/// test in that suite, and no suite runs the whole executable.
pub fn build_filter_args(identifier: Option<&TestIdentifier>) -> Vec<String> {
    let Some(identifier) = identifier else {
        return Vec::new();
    };

    match (&identifier.suite, &identifier.name) {
        (Some(suite), Some(name)) => vec![FILTER_FLAG.to_string(), format!("{}/{}", suite, name)],
        (Some(suite), None) => vec![FILTER_FLAG.to_string(), format!("{}/*", suite)],
        (None, _) => Vec::new(),
    }
}
