//! The full resolution pipeline: load, expand workspaces, resolve options.

use std::path::PathBuf;
use std::sync::Arc;

use path_clean::PathClean;

use crate::context::RunContext;
use crate::discovery::ConfigLoader;
use crate::error::{ConfigError, Result};
use crate::options::resolve_user_config;
use crate::resolved::ResolvedConfig;
use crate::types::{ConfigExport, InlineConfig};
use crate::workspace::expand_workspace;

#[derive(Debug, Clone)]
pub struct Resolution {
    pub configs: Vec<ResolvedConfig>,
    /// Every config file read on the way. A change to any of them restarts watch mode.
    pub files: Vec<PathBuf>,
}

/// Resolve `inline` into build plans.
///
/// `export` stands in for a config file, as when configs are built
/// programmatically.
pub fn resolve_config(
    inline: &InlineConfig,
    ctx: &Arc<RunContext>,
    export: Option<ConfigExport>,
) -> Result<Resolution> {
    tracing::debug!("inline config {:?}", inline);

    let mut inline = inline.clone();
    let cwd = match &inline.user.cwd {
        Some(cwd) => ctx.cwd().join(cwd).clean(),
        None => ctx.cwd().to_path_buf(),
    };
    if inline.user.cwd.is_some() {
        inline.user.cwd = Some(cwd.clone());
    }

    let mut loader = ConfigLoader::new(&cwd);
    if let Some(export) = export {
        loader = loader.with_export(export);
    }
    let root = loader.load(&inline, ctx)?;

    let mut files = Vec::new();
    match &root.file {
        Some(file) => {
            tracing::debug!("loaded root user config file {}", file.display());
            files.push(file.clone());
        }
        None => tracing::debug!("no root user config file found"),
    }

    let mut configs = Vec::new();
    for root_config in &root.configs {
        let expanded = expand_workspace(root_config, &inline, ctx)?;
        files.extend(expanded.files);
        for config in expanded
            .configs
            .iter()
            .filter(|config| !config.workspace.as_ref().is_some_and(|w| w.is_truthy()) || config.entry.is_some())
        {
            configs.extend(resolve_user_config(config, &inline, ctx)?);
        }
    }
    tracing::debug!("resolved {} configs", configs.len());

    if configs.is_empty() {
        return Err(ConfigError::NoValidConfig);
    }

    Ok(Resolution { configs, files })
}
