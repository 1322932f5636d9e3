//! Run requests: what to run and where the request came from

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::locator::{extract_identifier, find_nearest_test, TestIdentifier};

/// Cursor position in a buffer (0-based)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub line: usize,
    pub column: usize,
}

impl CursorPosition {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Maps a source file to the test executable built from it
pub trait ExecutableResolver {
    /// Resolve the executable for `source`, if one exists
    fn resolve(&self, source: &Path) -> Option<PathBuf>;
}

/// Resolves executables by naming convention inside a build directory
///
/// `tests/math.c` resolves to `<build_dir>/math`, falling back to
/// `<build_dir>/test_math`.
#[derive(Debug, Clone)]
pub struct BuildDirResolver {
    build_dir: PathBuf,
}

impl BuildDirResolver {
    /// Create a resolver rooted at `build_dir`
    pub fn new(build_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_dir: build_dir.into(),
        }
    }
}

impl ExecutableResolver for BuildDirResolver {
    fn resolve(&self, source: &Path) -> Option<PathBuf> {
        let stem = source.file_stem()?.to_str()?;
        [stem.to_string(), format!("test_{}", stem)]
            .into_iter()
            .map(|name| self.build_dir.join(name))
            .find(|candidate| candidate.is_file())
    }
}

/// Resolver that always returns the same executable
#[derive(Debug, Clone)]
pub struct FixedExecutable(pub PathBuf);

impl ExecutableResolver for FixedExecutable {
    fn resolve(&self, _source: &Path) -> Option<PathBuf> {
        Some(self.0.clone())
    }
}

/// A request to run the test nearest a cursor
///
/// A request with neither executable nor identifier means "nothing
/// runnable"; every stage treats it as a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    identifier: Option<TestIdentifier>,
    executable: Option<PathBuf>,
    buffer: String,
    cursor: CursorPosition,
}

impl RunRequest {
    /// Build a request from explicit parts
    pub fn new(
        identifier: Option<TestIdentifier>,
        executable: Option<PathBuf>,
        buffer: impl Into<String>,
        cursor: CursorPosition,
    ) -> Self {
        Self {
            identifier,
            executable,
            buffer: buffer.into(),
            cursor,
        }
    }

    /// The "nothing runnable" sentinel
    pub fn nothing(buffer: impl Into<String>, cursor: CursorPosition) -> Self {
        Self::new(None, None, buffer, cursor)
    }

    /// Build a request for the test nearest `cursor` in `lines`
    ///
    /// `buffer` names the source file and is handed to `resolver`. Returns
    /// the sentinel when the buffer has no test declarations. A declaration
    /// whose suite/name cannot be read still produces a request that runs
    /// the whole executable.
    pub fn for_cursor<S: AsRef<str>>(
        buffer: impl Into<String>,
        lines: &[S],
        cursor: CursorPosition,
        resolver: &dyn ExecutableResolver,
    ) -> Self {
        let buffer = buffer.into();
        let declaration = find_nearest_test(lines, cursor.line);
        if declaration.is_empty() {
            tracing::debug!(buffer = %buffer, "No test declaration in buffer");
            return Self::nothing(buffer, cursor);
        }

        let identifier = extract_identifier(&declaration);
        let identifier = (!identifier.is_empty()).then_some(identifier);
        let executable = resolver.resolve(Path::new(&buffer));
        if executable.is_none() {
            tracing::debug!(buffer = %buffer, "No executable resolved for buffer");
        }

        Self::new(identifier, executable, buffer, cursor)
    }

    /// True when there is an executable to run
    pub fn can_run(&self) -> bool {
        self.executable.is_some()
    }

    pub fn identifier(&self) -> Option<&TestIdentifier> {
        self.identifier.as_ref()
    }

    pub fn executable(&self) -> Option<&Path> {
        self.executable.as_deref()
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn cursor(&self) -> CursorPosition {
        self.cursor
    }
}
