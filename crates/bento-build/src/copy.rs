//! Copying static files next to the build output.

use std::path::{Component, Path, PathBuf};

use bento_config::{CopyEntry, CopyItem, GlobOptions, OneOrMany, ResolvedConfig, glob_paths};
use bento_config::glob::is_dynamic_pattern;
use walkdir::WalkDir;

use crate::error::{BuildError, Result};

/// One resolved copy operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTask {
    pub from: PathBuf,
    pub to: PathBuf,
    pub verbose: bool,
}

/// Expand the copy options of `config` into concrete source and destination paths.
pub fn resolve_copy(config: &ResolvedConfig) -> Result<Vec<CopyTask>> {
    let Some(copy) = config.run_once().and_then(|run_once| run_once.copy.as_ref()) else {
        return Ok(Vec::new());
    };

    let mut tasks = Vec::new();
    for item in copy.to_vec() {
        let entry = match item {
            CopyItem::Path(path) => CopyEntry {
                from: OneOrMany::One(path),
                ..CopyEntry::default()
            },
            CopyItem::Entry(entry) => entry,
        };

        let mut from: Vec<PathBuf> = entry.from.to_vec().into_iter().map(PathBuf::from).collect();
        let patterns = entry.from.to_vec();
        if patterns.iter().any(|pattern| is_dynamic_pattern(pattern)) {
            from = glob_paths(&patterns, &config.cwd, &GlobOptions::files())?;
        }

        for file in from {
            tasks.push(resolve_entry(config, &entry, &file));
        }
    }
    Ok(tasks)
}

fn resolve_entry(config: &ResolvedConfig, entry: &CopyEntry, file: &Path) -> CopyTask {
    let from = config.cwd.join(file);
    let to = match &entry.to {
        Some(to) => config.cwd.join(to),
        None => config.out_dir.clone(),
    };

    let relative = pathdiff::diff_paths(&from, &config.cwd).unwrap_or_else(|| from.clone());
    let base = relative.file_name().map(PathBuf::from).unwrap_or_default();
    let dir = relative.parent().filter(|dir| !dir.as_os_str().is_empty());

    // Without flattening, the first directory of the source is replaced by the destination.
    let dest_dir = match dir {
        Some(dir) if entry.flatten == Some(false) => {
            let mut components = dir.components();
            let _ = components.next();
            let rest: PathBuf = components
                .filter(|component| matches!(component, Component::Normal(_)))
                .collect();
            to.join(rest)
        }
        _ => to,
    };

    let name = entry.rename.as_ref().map(PathBuf::from).unwrap_or(base);
    CopyTask {
        from,
        to: dest_dir.join(name),
        verbose: entry.verbose.unwrap_or(false),
    }
}

/// Copy the static files of `config`. Only the first format of a fan-out copies.
pub async fn copy(config: &ResolvedConfig) -> Result<()> {
    if config.run_once().and_then(|run_once| run_once.copy.as_ref()).is_none() {
        return Ok(());
    }

    let tasks = resolve_copy(config)?;
    if tasks.is_empty() {
        config.logger.warn("No files matched for copying.");
        return Ok(());
    }

    for task in tasks {
        if task.verbose {
            config.logger.info(format!(
                "Copying files from {} to {}",
                display_relative(&task.from, &config.cwd),
                display_relative(&task.to, &config.cwd),
            ));
        }
        let (from, to) = (task.from.clone(), task.to.clone());
        tokio::task::spawn_blocking(move || copy_recursive(&from, &to))
            .await
            .map_err(|e| BuildError::Task(e.to_string()))??;
    }
    Ok(())
}

fn display_relative(path: &Path, cwd: &Path) -> String {
    pathdiff::diff_paths(path, cwd)
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}

/// Copy a file, or a directory with everything below it.
fn copy_recursive(from: &Path, to: &Path) -> Result<()> {
    if from.is_file() {
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
        std::fs::copy(from, to).map_err(|e| BuildError::io(from, e))?;
        return Ok(());
    }

    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|e| BuildError::io(from, std::io::Error::other(e.to_string())))?;
        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| BuildError::io(&target, e))?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
            }
            std::fs::copy(entry.path(), &target).map_err(|e| BuildError::io(entry.path(), e))?;
        }
    }
    Ok(())
}
