//! Test declaration locator
//!
//! Finds test declarations by scanning raw source lines. This is plain
//! pattern matching over line-tokenized text, not a language parser: a
//! declaration only counts when it starts a line and has the shape
//! `Test(suite, name, ...)`, `ParameterizedTest(params, suite, name, ...)`
//! or `Theory((params), suite, name, ...)`.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Matches any line that opens a test declaration
static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:Test|ParameterizedTest|Theory)\s*\(").expect("valid declaration regex")
});

/// `Test(suite, name, ...)`
static SIMPLE_TEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*Test\s*\(\s*(?P<suite>\w+)\s*(?:,\s*(?P<name>\w+)\s*)?[,)]")
        .expect("valid test regex")
});

/// `ParameterizedTest(type *param, suite, name, ...)` and `Theory((int a), suite, name, ...)`
static PARAMETERIZED_TEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:ParameterizedTest|Theory)\s*\(\s*(?:\([^)]*\)|[^,()]+)\s*,\s*(?P<suite>\w+)\s*(?:,\s*(?P<name>\w+)\s*)?[,)]",
    )
    .expect("valid parameterized test regex")
});

/// Identifies a single test case or a whole suite
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestIdentifier {
    /// Suite the test belongs to
    pub suite: Option<String>,
    /// Test name within the suite
    pub name: Option<String>,
}

impl TestIdentifier {
    /// Identifier for exactly one test
    pub fn new(suite: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            suite: Some(suite.into()),
            name: Some(name.into()),
        }
    }

    /// Identifier for a whole suite
    pub fn suite(suite: impl Into<String>) -> Self {
        Self {
            suite: Some(suite.into()),
            name: None,
        }
    }

    /// True when neither suite nor name is known
    pub fn is_empty(&self) -> bool {
        self.suite.is_none() && self.name.is_none()
    }
}

impl std::fmt::Display for TestIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.suite, &self.name) {
            (Some(suite), Some(name)) => write!(f, "{}/{}", suite, name),
            (Some(suite), None) => write!(f, "{}/*", suite),
            _ => write!(f, "*"),
        }
    }
}

/// Check whether a source line opens a test declaration
pub fn is_declaration(line: &str) -> bool {
    DECLARATION.is_match(line)
}

/// Find the declaration nearest to `cursor_line` (0-based)
///
/// Returns the line index and text of the last declaration at or before
/// the cursor. When the cursor precedes every declaration, the first
/// declaration in the buffer is returned instead.
pub fn find_nearest_declaration<S: AsRef<str>>(
    lines: &[S],
    cursor_line: usize,
) -> Option<(usize, &str)> {
    let mut first = None;
    let mut best = None;

    for (index, line) in lines.iter().enumerate() {
        let line = line.as_ref();
        if !is_declaration(line) {
            continue;
        }
        if first.is_none() {
            first = Some((index, line));
        }
        if index > cursor_line {
            break;
        }
        best = Some((index, line));
    }

    best.or(first)
}

/// Find the raw text of the declaration nearest to `cursor_line`
///
/// Returns an empty string when the buffer contains no declarations.
pub fn find_nearest_test<S: AsRef<str>>(lines: &[S], cursor_line: usize) -> String {
    match find_nearest_declaration(lines, cursor_line) {
        Some((index, line)) => {
            tracing::debug!(line = index, declaration = %line.trim(), "Found nearest test");
            line.to_string()
        }
        None => String::new(),
    }
}

/// Parse the suite and name out of a declaration line
///
/// A line that does not have the expected shape yields an empty
/// identifier, which means "run the whole executable".
pub fn extract_identifier(declaration: &str) -> TestIdentifier {
    let captures = SIMPLE_TEST
        .captures(declaration)
        .or_else(|| PARAMETERIZED_TEST.captures(declaration));

    let Some(captures) = captures else {
        return TestIdentifier::default();
    };

    TestIdentifier {
        suite: captures.name("suite").map(|m| m.as_str().to_string()),
        name: captures.name("name").map(|m| m.as_str().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> Vec<&'static str> {
        vec![
            "#include <criterion/criterion.h>", // 0
            "",                                 // 1
            "Test(math, add) {",                // 2
            "    cr_assert(add(1, 2) == 3);",   // 3
            "}",                                // 4
            "",                                 // 5
            "Test(math, sub, .timeout = 2) {",  // 6
            "    cr_assert(sub(3, 2) == 1);",   // 7
            "}",                                // 8
        ]
    }

    #[test]
    fn test_cursor_inside_test_body() {
        let lines = source();
        assert_eq!(find_nearest_test(&lines, 3), "Test(math, add) {");
        assert_eq!(find_nearest_test(&lines, 7), "Test(math, sub, .timeout = 2) {");
    }

    #[test]
    fn test_every_line_of_a_range_selects_its_declaration() {
        let lines = source();
        for cursor in 2..6 {
            assert_eq!(find_nearest_test(&lines, cursor), "Test(math, add) {");
        }
        for cursor in 6..20 {
            assert_eq!(
                find_nearest_test(&lines, cursor),
                "Test(math, sub, .timeout = 2) {"
            );
        }
    }

    #[test]
    fn test_nearest_preceding_not_nearest_absolute() {
        let lines = source();
        // Line 5 is one line above `sub` but belongs to `add`
        assert_eq!(find_nearest_test(&lines, 5), "Test(math, add) {");
    }

    #[test]
    fn test_cursor_before_first_declaration_falls_back_to_first() {
        let lines = source();
        assert_eq!(find_nearest_test(&lines, 0), "Test(math, add) {");
    }

    #[test]
    fn test_no_declarations() {
        let lines = vec!["int main(void) {", "    return 0;", "}"];
        assert_eq!(find_nearest_test(&lines, 1), "");
        assert!(find_nearest_declaration(&lines, 1).is_none());
    }

    #[test]
    fn test_commented_declaration_is_ignored() {
        let lines = vec!["// Test(math, old) {", "Test(math, new) {"];
        assert_eq!(find_nearest_test(&lines, 1), "Test(math, new) {");
        assert_eq!(find_nearest_declaration(&lines, 0), Some((1, "Test(math, new) {")));
    }

    #[test]
    fn test_extract_simple() {
        assert_eq!(
            extract_identifier("Test(math, add) {"),
            TestIdentifier::new("math", "add")
        );
        assert_eq!(
            extract_identifier("  Test( math ,add, .init = setup) {"),
            TestIdentifier::new("math", "add")
        );
    }

    #[test]
    fn test_extract_suite_only() {
        assert_eq!(extract_identifier("Test(math) {"), TestIdentifier::suite("math"));
    }

    #[test]
    fn test_extract_parameterized() {
        assert_eq!(
            extract_identifier("ParameterizedTest(struct pair *p, math, pairs) {"),
            TestIdentifier::new("math", "pairs")
        );
        assert_eq!(
            extract_identifier("Theory((int a, int b), math, commutes) {"),
            TestIdentifier::new("math", "commutes")
        );
    }

    #[test]
    fn test_extract_malformed_degrades_to_empty() {
        assert!(extract_identifier("Test(").is_empty());
        assert!(extract_identifier("void helper(void) {").is_empty());
        assert!(extract_identifier("").is_empty());
    }

    #[test]
    fn test_identifier_display() {
        assert_eq!(TestIdentifier::new("math", "add").to_string(), "math/add");
        assert_eq!(TestIdentifier::suite("math").to_string(), "math/*");
        assert_eq!(TestIdentifier::default().to_string(), "*");
    }
}
