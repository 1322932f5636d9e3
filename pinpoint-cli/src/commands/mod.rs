//! CLI command implementations

pub mod locate;
pub mod run;

pub use locate::LocateArgs;
pub use run::RunArgs;

use std::path::Path;

/// Read a source file as lines
///
/// The CLI is the caller that owns file access; the core only sees lines.
pub(crate) fn read_lines(path: &Path) -> anyhow::Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    Ok(contents.lines().map(str::to_string).collect())
}

/// Convert a 1-based line from the command line into a 0-based index
pub(crate) fn zero_based(line: usize) -> usize {
    line.saturating_sub(1)
}
