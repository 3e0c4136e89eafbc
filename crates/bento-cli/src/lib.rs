//! The `bento` command.
//!
//! - [`cli`] - argument definitions
//! - [`config`] - flags and `BENTO_*` variables as an inline config
//! - [`commands`] - the build command and its watch loop
//! - [`shortcuts`] - watch-mode keyboard shortcuts
//! - [`logger`] - `tracing` subscriber setup
//! - [`error`] - error type and miette conversion

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logger;
pub mod shortcuts;

pub use error::{CliError, Result};
