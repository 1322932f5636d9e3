//! Configuration management for Pinpoint
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (PINPOINT_*)
//! 3. Config file (~/.config/pinpoint/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Build-related configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Whether to compile before running tests
    pub enabled: bool,

    /// Build command to run
    pub command: String,

    /// Arguments for the build command; `{build_dir}` is substituted
    pub args: Vec<String>,

    /// Build directory, also searched for test executables
    pub directory: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "make".to_string(),
            args: vec!["-C".to_string(), "{build_dir}".to_string()],
            directory: PathBuf::from("build"),
        }
    }
}

/// Test executable configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Arguments placed before the filter arguments, e.g. `["--json"]`
    pub args: Vec<String>,
}

/// Diagnostic output configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Source tag attached to every diagnostic
    pub source: String,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            source: "pinpoint".to_string(),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub build: BuildConfig,
    pub runner: RunnerConfig,
    pub diagnostics: DiagnosticsConfig,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/pinpoint/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("pinpoint").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - PINPOINT_BUILD_COMMAND: Build command to run
    /// - PINPOINT_BUILD_DIR: Build directory
    pub fn with_env_overrides(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    fn with_env_from<F>(self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        self.with_overrides(
            lookup("PINPOINT_BUILD_COMMAND"),
            lookup("PINPOINT_BUILD_DIR").map(PathBuf::from),
        )
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(
        self,
        build_command: Option<String>,
        build_dir: Option<PathBuf>,
        no_build: bool,
    ) -> Self {
        let mut config = self.with_overrides(build_command, build_dir);
        if no_build {
            config.build.enabled = false;
        }
        config
    }

    fn with_overrides(mut self, build_command: Option<String>, build_dir: Option<PathBuf>) -> Self {
        if let Some(command) = build_command {
            self.build.command = command;
        }
        if let Some(dir) = build_dir {
            self.build.directory = dir;
        }
        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(
        build_command: Option<String>,
        build_dir: Option<PathBuf>,
        no_build: bool,
    ) -> Result<Self> {
        Ok(Self::load()?
            .with_env_overrides()
            .with_cli_overrides(build_command, build_dir, no_build))
    }
}
