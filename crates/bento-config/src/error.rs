//! Error types for configuration loading and option resolution.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Coarse classification used by callers that report or recover from errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Conflicting or invalid options. Fatal before any build starts.
    Configuration,
    /// Entry patterns that match nothing or disagree on their base directory.
    /// Fatal for the owning logical config only.
    EntryResolution,
    /// A wrong-shaped value, such as an old and a new option set together.
    Type,
    /// Filesystem failure while reading configuration inputs.
    Io,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    // Loading
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error(
        "Function should not be nested within multiple configurations. It must be at the top level.\n\nHint: export a single function that returns the list of configs"
    )]
    NestedFunction,

    #[error("config function failed: {0}")]
    Function(String),

    #[error("No valid configuration found.")]
    NoValidConfig,

    // Workspace
    #[error("No workspace packages found in {root}\n\nHint: check `workspace.include` and `workspace.exclude`")]
    NoWorkspacePackages { root: PathBuf },

    // Options
    #[error("`{old}` is deprecated. Cannot be used with `{new}`.")]
    DeprecatedConflict { old: &'static str, new: &'static str },

    #[error("invalid value for `{option}`: {message}")]
    InvalidOption { option: String, message: String },

    #[error("invalid pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("`deps.skipNodeModulesBundle` and `deps.alwaysBundle` are mutually exclusive")]
    SkipNodeModulesWithAlwaysBundle,

    #[error("Cannot clean the current working directory. Please specify a different path to clean option.")]
    CleanCwd,

    #[error("`{0}` option requires a package.json file")]
    PackageJsonRequired(&'static str),

    #[error("{0}")]
    Executable(String),

    #[error("tsconfig not found: {0}")]
    TsconfigNotFound(PathBuf),

    #[error("failed to read env file {path}: {message}")]
    EnvFile { path: PathBuf, message: String },

    // Entries
    #[error("No input files, try \"bento <your-file>\" or create src/index.ts")]
    NoInputFiles,

    #[error("Cannot find entry: {0}")]
    EntryNotFound(String),

    #[error("No files matched the glob pattern \"{pattern}\" for entry \"{key}\"")]
    EntryNoMatches { key: String, pattern: String },

    #[error("Object entry \"{key}\" cannot have an array value when the key is not a glob pattern.")]
    EntryArrayValue { key: String },

    #[error(
        "Cannot determine base directory for glob entry \"{key}\".\n\nHint: use patterns with a static prefix, such as `src/**/*.ts`"
    )]
    EntryBaseUnknown { key: String },

    #[error(
        "All positive patterns of glob entry \"{key}\" must share the same base directory, found: {}",
        bases.join(", ")
    )]
    EntryBaseMismatch { key: String, bases: Vec<String> },

    // Logging
    #[error("{0}")]
    Warning(String),

    // I/O errors
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::EntryNoMatches { .. }
            | ConfigError::EntryBaseUnknown { .. }
            | ConfigError::EntryBaseMismatch { .. }
            | ConfigError::EntryNotFound(_)
            | ConfigError::NoInputFiles => ErrorKind::EntryResolution,
            ConfigError::DeprecatedConflict { .. } | ConfigError::EntryArrayValue { .. } => {
                ErrorKind::Type
            }
            ConfigError::Io { .. } => ErrorKind::Io,
            _ => ErrorKind::Configuration,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(option: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidOption {
            option: option.into(),
            message: message.into(),
        }
    }
}
