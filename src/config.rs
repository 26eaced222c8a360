//! Configuration loading and validation.
//!
//! The configuration names the watched source directory, the ordered list of
//! destination directories with the extensions they accept, and the idle tick
//! of the loop. It is read once at startup; restart the process to pick up
//! changes.
//!
//! # Configuration File Format
//!
//! JSON (`.json`) or TOML (any other extension) with this structure:
//!
//! ```json
//! {
//!   "source_dir": { "path": "/home/me/Downloads", "create": false },
//!   "directories": [
//!     { "path": "/home/me/Documents", "extensions": ["pdf", "txt"], "padding_number": 3, "create": true },
//!     { "path": "/home/me/Pictures", "extensions": ["jpg", "png"] }
//!   ],
//!   "sleep_time": 10,
//!   "ignore": ["*.part", "*.crdownload"]
//! }
//! ```

use crate::routing::{DEFAULT_PADDING_WIDTH, MAX_PADDING_WIDTH, RoutingRule, RoutingTable};
use glob::Pattern;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "./config.json";

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    ConfigNotFound(PathBuf),
    /// Invalid syntax, missing fields or values that fail validation.
    ConfigInvalid(String),
    /// Invalid glob pattern in the `ignore` list.
    InvalidGlobPattern(String),
    /// IO error while reading configuration.
    IoError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ConfigNotFound(path) => {
                write!(f, "The file {} does not exist", path.display())
            }
            ConfigError::ConfigInvalid(msg) => write!(f, "Invalid configuration: {}", msg),
            ConfigError::InvalidGlobPattern(pattern) => {
                write!(f, "Invalid ignore pattern '{}'", pattern)
            }
            ConfigError::IoError(msg) => write!(f, "IO error reading configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Root of the configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct OrganizerConfig {
    pub source_dir: SourceDirConfig,

    /// Destination rules, matched in this order.
    #[serde(default)]
    pub directories: Vec<DirectoryConfig>,

    /// Seconds between idle ticks of the loop, also the polling interval.
    #[serde(default = "default_sleep_time")]
    pub sleep_time: u64,

    /// Glob patterns for source file names that are never routed.
    #[serde(default)]
    pub ignore: Vec<String>,
}

/// The watched directory.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceDirConfig {
    pub path: PathBuf,

    /// Create the directory at startup when it is missing.
    #[serde(default)]
    pub create: bool,
}

/// One destination rule.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    pub path: PathBuf,
    pub extensions: Vec<String>,

    #[serde(default = "default_padding_number")]
    pub padding_number: usize,

    #[serde(default)]
    pub create: bool,
}

fn default_sleep_time() -> u64 {
    10
}

fn default_padding_number() -> usize {
    DEFAULT_PADDING_WIDTH
}

/// Removes trailing separators so `/data/docs/` and `/data/docs` compare equal.
fn normalize_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    let trimmed = raw.trim_end_matches('/');
    if trimmed.is_empty() && !raw.is_empty() {
        PathBuf::from("/")
    } else {
        PathBuf::from(trimmed)
    }
}

impl OrganizerConfig {
    /// Loads and validates the configuration at `path`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if the file does not exist,
    /// `ConfigError::IoError` if it cannot be read and
    /// `ConfigError::ConfigInvalid` if it fails to parse or validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))?;
        config.normalized().validated()
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))?;
        config.normalized().validated()
    }

    fn normalized(mut self) -> Self {
        self.source_dir.path = normalize_path(&self.source_dir.path);
        for directory in &mut self.directories {
            directory.path = normalize_path(&directory.path);
        }
        self
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.source_dir.path.as_os_str().is_empty() {
            return Err(ConfigError::ConfigInvalid(
                "source_dir.path must not be empty".to_string(),
            ));
        }

        if self.sleep_time == 0 {
            return Err(ConfigError::ConfigInvalid(
                "sleep_time must be at least 1 second".to_string(),
            ));
        }

        for (index, directory) in self.directories.iter().enumerate() {
            if directory.path.as_os_str().is_empty() {
                return Err(ConfigError::ConfigInvalid(format!(
                    "directories[{}].path must not be empty",
                    index
                )));
            }
            if directory.extensions.is_empty() {
                return Err(ConfigError::ConfigInvalid(format!(
                    "directories[{}] ({}) lists no extensions",
                    index,
                    directory.path.display()
                )));
            }
            if directory.padding_number > MAX_PADDING_WIDTH {
                return Err(ConfigError::ConfigInvalid(format!(
                    "directories[{}].padding_number must be at most {}, got {}",
                    index, MAX_PADDING_WIDTH, directory.padding_number
                )));
            }
        }

        self.ignore_patterns()?;
        Ok(self)
    }

    pub fn source_path(&self) -> &Path {
        &self.source_dir.path
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.sleep_time)
    }

    /// Converts the directory entries into routing rules, in order.
    pub fn rules(&self) -> Vec<RoutingRule> {
        self.directories
            .iter()
            .map(|directory| {
                RoutingRule::new(&directory.path, &directory.extensions)
                    .with_padding_width(directory.padding_number)
                    .with_create_if_missing(directory.create)
            })
            .collect()
    }

    pub fn routing_table(&self) -> RoutingTable {
        RoutingTable::new(self.rules())
    }

    /// Compiles the `ignore` globs.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidGlobPattern` for the first bad pattern.
    pub fn ignore_patterns(&self) -> Result<IgnoreRules, ConfigError> {
        let patterns = self
            .ignore
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(IgnoreRules { patterns })
    }
}

/// Compiled `ignore` globs, matched against bare file names.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    patterns: Vec<Pattern>,
}

impl IgnoreRules {
    pub fn is_ignored(&self, file_name: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(file_name))
    }
}
