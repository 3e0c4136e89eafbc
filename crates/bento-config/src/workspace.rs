//! Workspace expansion: one logical config per matched package directory.

use std::path::PathBuf;

use crate::context::RunContext;
use crate::discovery::ConfigLoader;
use crate::error::{ConfigError, Result};
use crate::glob::{GlobOptions, glob_paths, relative_slash};
use crate::types::{InlineConfig, OneOrMany, UserConfig};

/// Directories never treated as workspace packages.
pub const DEFAULT_WORKSPACE_EXCLUDE: &[&str] = &[
    "**/node_modules/**",
    "**/dist/**",
    "**/test/**",
    "**/tests/**",
    "**/temp/**",
    "**/tmp/**",
];

#[derive(Debug, Clone, Default)]
pub struct ExpandedWorkspace {
    pub configs: Vec<UserConfig>,
    /// Per-package config files that were loaded.
    pub files: Vec<PathBuf>,
}

/// Expand `config` over its workspace packages.
///
/// Inline options are layered over `config` first. Without a truthy
/// `workspace` the layered config is returned as the only result. Otherwise
/// every package directory is loaded with [`ConfigLoader`] confined to that
/// directory and each loaded config is layered over the parent.
pub fn expand_workspace(config: &UserConfig, inline: &InlineConfig, ctx: &RunContext) -> Result<ExpandedWorkspace> {
    let normalized = config.layer(&inline.user)?;
    let root = normalized.cwd.clone().unwrap_or_else(|| ctx.cwd().to_path_buf());

    let Some(workspace) = normalized.workspace.as_ref().and_then(|w| w.normalize()) else {
        return Ok(ExpandedWorkspace {
            configs: vec![normalized],
            files: Vec::new(),
        });
    };

    let exclude = workspace
        .exclude
        .as_ref()
        .map(OneOrMany::to_vec)
        .unwrap_or_else(|| DEFAULT_WORKSPACE_EXCLUDE.iter().map(|s| s.to_string()).collect());

    let include = workspace.include.as_ref().map(OneOrMany::to_vec);
    let packages: Vec<PathBuf> = match include {
        Some(patterns) if patterns != ["auto"] => glob_paths(
            &patterns,
            &root,
            &GlobOptions {
                ignore: exclude,
                only_directories: true,
                ..GlobOptions::default()
            },
        )?,
        _ => glob_paths(
            &["**/package.json".to_string()],
            &root,
            &GlobOptions {
                ignore: exclude,
                only_files: true,
                ..GlobOptions::default()
            },
        )?
        .into_iter()
        .filter(|file| relative_slash(file, &root) != "package.json")
        .filter_map(|file| file.parent().map(PathBuf::from))
        .collect(),
    };

    if packages.is_empty() {
        return Err(ConfigError::NoWorkspacePackages { root });
    }

    let mut expanded = ExpandedWorkspace::default();
    for dir in packages {
        tracing::debug!("loading workspace config {}", dir.display());
        let child_inline = InlineConfig {
            user: UserConfig {
                cwd: Some(dir.clone()),
                ..inline.user.clone()
            },
            config: workspace.config.clone(),
            filter: inline.filter.clone(),
        };

        let loaded = ConfigLoader::new(&dir)
            .scoped_to(&dir)
            .load(&child_inline, ctx)?;
        match loaded.file {
            Some(file) => {
                tracing::debug!("loaded workspace config file {}", file.display());
                expanded.files.push(file);
            }
            None => tracing::debug!("no workspace config file found in {}", dir.display()),
        }

        for child in &loaded.configs {
            expanded.configs.push(normalized.layer(child)?);
        }
    }

    Ok(expanded)
}
