//! Package-level steps that run once every format of a package is built.

use std::sync::Arc;

use bento_config::{ExportsOptions, Logger, OpaqueOptions, ResolvedConfig};

use crate::collaborators::{LintTool, PackageLinter, Packer, report_diagnostics};
use crate::error::{BuildError, Result};
use crate::exports::{ChunksByFormat, generate_exports, write_package_json};
use crate::group::{Arrival, BuildSnapshot, PackageBuildGroup};

/// Packing and linting collaborators.
#[derive(Clone, Default)]
pub struct PackageTools {
    pub packer: Option<Arc<dyn Packer>>,
    pub linters: Vec<Arc<dyn PackageLinter>>,
}

impl PackageTools {
    fn linter(&self, tool: LintTool) -> Option<&Arc<dyn PackageLinter>> {
        self.linters.iter().find(|linter| linter.tool() == tool)
    }
}

/// Report one finished build to its package group.
///
/// All but the last sibling wait for the package steps to finish. The last
/// one runs them and opens the gate, whether they succeed or not.
pub async fn bundle_done(
    group: &PackageBuildGroup,
    snapshot: BuildSnapshot,
    tools: &PackageTools,
) -> Result<()> {
    match group.arrive(snapshot) {
        Arrival::Waiting(gate) => {
            PackageBuildGroup::wait(gate).await;
            Ok(())
        }
        Arrival::Last(snapshots) => {
            let result = package_steps(group, &snapshots, tools).await;
            group.resolve();
            result
        }
    }
}

async fn package_steps(
    group: &PackageBuildGroup,
    snapshots: &[BuildSnapshot],
    tools: &PackageTools,
) -> Result<()> {
    let Some(first) = snapshots.first() else {
        return Ok(());
    };
    let logger = &first.config.logger;

    let exports = dedupe(snapshots, |config| config.exports.clone(), |options| {
        *options == ExportsOptions::default()
    });
    if exports.len() > 1 {
        return Err(BuildError::ConflictingExports {
            path: group.path().to_path_buf(),
            configs: exports.iter().map(|(config, _)| config.name_or_cwd()).collect(),
        });
    }
    if let Some((config, options)) = exports.first() {
        write_exports(group, snapshots, config, options).await?;
    }

    let publint = dedupe(snapshots, |config| config.publint.clone(), OpaqueOptions::is_empty);
    let attw = dedupe(snapshots, |config| config.attw.clone(), OpaqueOptions::is_empty);
    if publint.len() > 1 || attw.len() > 1 {
        logger.warn(format!(
            "Multiple publint or attw configurations found for package at {}. Consider merging them for better consistency and performance.",
            group.path().display()
        ));
    }
    if publint.is_empty() && attw.is_empty() {
        return Ok(());
    }

    let Some(packer) = &tools.packer else {
        tracing::debug!("No packer installed, skipping publint and attw");
        return Ok(());
    };
    let tarball = match packer.pack(group.path()).await {
        Ok(tarball) => tarball,
        Err(e) => {
            logger.error(format!("Pack failed: {e}"));
            return Ok(());
        }
    };

    for (tool, configs) in [(LintTool::Publint, &publint), (LintTool::Attw, &attw)] {
        let Some((config, options)) = configs.first() else {
            continue;
        };
        let Some(linter) = tools.linter(tool) else {
            tracing::debug!("No {tool} linter installed");
            continue;
        };
        lint(linter.as_ref(), &config.logger, &tarball, group, options).await;
    }
    Ok(())
}

async fn lint(
    linter: &dyn PackageLinter,
    logger: &Logger,
    tarball: &[u8],
    group: &PackageBuildGroup,
    options: &OpaqueOptions,
) {
    let tool = linter.tool();
    match linter.lint(tarball, group.path(), options).await {
        Ok(diagnostics) if diagnostics.is_empty() => {
            logger.success(format!("No {tool} issues found"));
        }
        Ok(diagnostics) => report_diagnostics(logger, tool, &diagnostics),
        Err(e) => logger.error(format!("{tool} failed: {e}")),
    }
}

async fn write_exports(
    group: &PackageBuildGroup,
    snapshots: &[BuildSnapshot],
    config: &ResolvedConfig,
    options: &ExportsOptions,
) -> Result<()> {
    let mut chunks = ChunksByFormat::new();
    for snapshot in snapshots.iter().filter(|snapshot| snapshot.config.exports.is_some()) {
        chunks
            .entry(snapshot.config.format)
            .or_default()
            .extend(snapshot.chunks.iter().cloned());
    }

    let name = config
        .pkg
        .as_deref()
        .and_then(|pkg| pkg.name.clone())
        .unwrap_or_else(|| config.name_or_cwd());
    let generated = generate_exports(group.path(), &name, &chunks, options, &config.logger)?;
    write_package_json(group.path(), &generated).await?;
    Ok(())
}

/// Distinct option sets by identity, each with the first config that brought it.
///
/// Empty option sets only count when nothing else is configured.
fn dedupe<T>(
    snapshots: &[BuildSnapshot],
    options: impl Fn(&ResolvedConfig) -> Option<Arc<T>>,
    is_empty: impl Fn(&T) -> bool,
) -> Vec<(ResolvedConfig, Arc<T>)> {
    let mut seen: Vec<(ResolvedConfig, Arc<T>)> = Vec::new();
    for snapshot in snapshots {
        let Some(value) = options(&snapshot.config) else {
            continue;
        };
        if !seen.iter().any(|(_, known)| Arc::ptr_eq(known, &value)) {
            seen.push((snapshot.config.clone(), value));
        }
    }
    if seen.len() > 1 {
        let first = seen[0].clone();
        seen.retain(|(_, value)| !is_empty(value));
        if seen.is_empty() {
            seen.push(first);
        }
    }
    seen
}
