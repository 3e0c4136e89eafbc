//! Errors of the `bento` command.
//!
//! Library errors convert through `#[from]`; [`cli_error_to_miette`] turns
//! the result into a diagnostic at the binary edge.

use bento_build::BuildError;
use bento_config::{ConfigError, ErrorKind};
use miette::Report;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    /// Config files or options could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] BuildError),

    /// Flags or `BENTO_*` variables that do not form a valid config.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The build finished, but something was logged as an error or the
    /// success command exited with a non-zero code.
    #[error("Build failed with exit code {0}")]
    Failed(i32),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Failed(code) => *code,
            _ => 1,
        }
    }
}

/// Convert a [`CliError`] to a miette report.
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Config(e) => config_error_to_miette(e),
        CliError::Build(BuildError::ExternalizationViolation(message)) => {
            miette::miette!(
                help = "Allow the dependency in deps.onlyAllowBundle, or list it in package.json dependencies",
                "{message}"
            )
        }
        _ => miette::miette!("{}", err),
    }
}

fn config_error_to_miette(err: ConfigError) -> Report {
    match err.kind() {
        ErrorKind::EntryResolution => miette::miette!(
            help = "Check the entry option, or pass entry files on the command line",
            "{err}"
        ),
        ErrorKind::Io => miette::miette!("{err}"),
        ErrorKind::Configuration | ErrorKind::Type => miette::miette!("Configuration error: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(CliError::Failed(3).exit_code(), 3);
        assert_eq!(CliError::InvalidArgument("x".into()).exit_code(), 1);
    }

    #[test]
    fn violations_carry_help() {
        let report = cli_error_to_miette(CliError::Build(BuildError::ExternalizationViolation(
            "lodash is bundled".into(),
        )));
        assert_eq!(report.to_string(), "lodash is bundled");
        assert!(report.help().is_some());
    }
}
