//! Error types for building.
//!
//! Resolution errors come from `bento-config` and are fatal for the whole
//! invocation. Everything here is scoped to one build task: a failing config
//! never takes its siblings down with it.

use std::path::PathBuf;

use bento_config::ConfigError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    /// Options could not be resolved, or resolution failed on restart.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A node_modules package was bundled without being allowed to.
    ///
    /// The message lists every offending dependency with its importers.
    #[error("{0}")]
    ExternalizationViolation(String),

    /// The bundling engine failed.
    #[error("Build failed: {0}")]
    Engine(String),

    /// A `build:*` hook handler returned an error.
    #[error("Hook `{event}` failed: {source}")]
    Hook {
        event: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Copy, executable packaging or another step after a successful build.
    #[error("Post-build step failed: {0}")]
    PostBuild(String),

    /// Sibling formats asked for different export maps for one package.
    #[error("Conflicting exports options for package at {path}. Please merge them:\n{}", configs.join("\n"))]
    ConflictingExports { path: PathBuf, configs: Vec<String> },

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A build task panicked or was cancelled.
    #[error("Build task failed: {0}")]
    Task(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn engine(message: impl std::fmt::Display) -> Self {
        BuildError::Engine(message.to_string())
    }
}
