//! External tools the orchestrator drives after a build.
//!
//! None of these are implemented here. The orchestrator skips a step when no
//! collaborator is installed for it.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bento_config::{Logger, OpaqueOptions, ResolvedConfig};

use crate::bundler::Chunk;

/// Packs a package directory into an npm tarball.
#[async_trait]
pub trait Packer: Send + Sync {
    async fn pack(&self, package_json: &Path) -> anyhow::Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LintTool {
    /// Checks `package.json` fields against what the tarball contains.
    Publint,
    /// Checks that types resolve under every module resolution mode.
    Attw,
}

impl LintTool {
    pub fn name(self) -> &'static str {
        match self {
            LintTool::Publint => "publint",
            LintTool::Attw => "attw",
        }
    }
}

impl fmt::Display for LintTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Suggestion,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

/// Lints a packed tarball.
#[async_trait]
pub trait PackageLinter: Send + Sync {
    fn tool(&self) -> LintTool;

    async fn lint(
        &self,
        tarball: &[u8],
        package_json: &Path,
        options: &OpaqueOptions,
    ) -> anyhow::Result<Vec<Diagnostic>>;
}

/// Report lint findings through the package's logger.
///
/// Errors always fail the run; warnings do when `failOnWarn` is set.
pub fn report_diagnostics(logger: &Logger, tool: LintTool, diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        let message = format!("[{tool}] {}", diagnostic.message);
        match diagnostic.severity {
            Severity::Error => logger.error(message),
            Severity::Warning => logger.warn(message),
            Severity::Suggestion => logger.info(message),
        }
    }
}

/// Turns a bundled entry into a standalone executable.
#[async_trait]
pub trait ExecutablePackager: Send + Sync {
    /// Returns the path of the written executable.
    async fn package(&self, config: &ResolvedConfig, chunks: &[Chunk]) -> anyhow::Result<PathBuf>;
}

/// Opens the devtools UI for a finished build.
#[async_trait]
pub trait DevtoolsLauncher: Send + Sync {
    async fn launch(&self, config: &ResolvedConfig) -> anyhow::Result<()>;
}
