//! Error types for Pinpoint

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Pinpoint operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Pinpoint operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The test executable's stdout was not a complete report
    #[error("Could not decode test report: {0}")]
    Decode(#[source] serde_json::Error),

    /// The test executable could not be started
    #[error("Failed to spawn '{}': {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A run is already in flight for this session
    #[error("A test run is already in progress")]
    RunInProgress,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Exit code reported to the caller when this error ends a run
    ///
    /// Follows the shell convention: 127 when the executable is missing,
    /// 126 when it exists but cannot be executed.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Spawn { source, .. } => spawn_exit_code(source),
            _ => 1,
        }
    }
}

/// Map a spawn failure to a shell-style exit code
pub(crate) fn spawn_exit_code(err: &std::io::Error) -> i32 {
    match err.kind() {
        std::io::ErrorKind::NotFound => 127,
        std::io::ErrorKind::PermissionDenied => 126,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn test_spawn_exit_codes() {
        let missing = Error::Spawn {
            path: PathBuf::from("/no/such/binary"),
            source: std::io::Error::from(ErrorKind::NotFound),
        };
        assert_eq!(missing.exit_code(), 127);

        let denied = Error::Spawn {
            path: PathBuf::from("/etc/passwd"),
            source: std::io::Error::from(ErrorKind::PermissionDenied),
        };
        assert_eq!(denied.exit_code(), 126);
    }

    #[test]
    fn test_spawn_message_names_path() {
        let err = Error::Spawn {
            path: PathBuf::from("build/test_math"),
            source: std::io::Error::from(ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("build/test_math"));
    }

    #[test]
    fn test_decode_error_message() {
        let source = serde_json::from_str::<serde_json::Value>("{\"tests\":").unwrap_err();
        let err = Error::Decode(source);
        assert!(err.to_string().starts_with("Could not decode test report: "));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_other_errors_exit_nonzero() {
        assert_eq!(Error::RunInProgress.exit_code(), 1);
        assert_eq!(Error::Config("bad".to_string()).exit_code(), 1);
    }
}
