//! Removing stale output.
//!
//! All configs of an invocation are cleaned together the first time any of
//! them asks, so a directory shared by several formats is only cleaned once and
//! never after a sibling already started writing into it.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bento_config::{GlobOptions, Logger, ResolvedConfig, glob_paths};
use tokio::sync::OnceCell;

use crate::bundler::Chunk;
use crate::error::{BuildError, Result};

/// Shared, run-once cleaning for one invocation.
#[derive(Debug, Clone)]
pub struct CleanOnce {
    configs: Arc<Vec<ResolvedConfig>>,
    cell: Arc<OnceCell<()>>,
}

impl CleanOnce {
    pub fn new(configs: Arc<Vec<ResolvedConfig>>) -> Self {
        Self {
            configs,
            cell: Arc::new(OnceCell::new()),
        }
    }

    /// Clean every config's patterns, unless an earlier call already did.
    pub async fn run(&self) -> Result<()> {
        self.cell
            .get_or_try_init(|| async {
                clean_out_dirs(&self.configs).await?;
                Ok::<_, BuildError>(())
            })
            .await?;
        Ok(())
    }
}

/// Remove everything matched by the configs' clean patterns.
///
/// The output directory itself is kept so watchers on it survive; only its
/// contents go. Returns the number of removed paths.
pub async fn clean_out_dirs(configs: &[ResolvedConfig]) -> Result<usize> {
    let mut removes = BTreeSet::new();
    let options = GlobOptions {
        dot: true,
        expand_directories: true,
        ..GlobOptions::default()
    };

    for config in configs {
        let patterns = config.clean_patterns();
        if patterns.is_empty() {
            continue;
        }
        let out_dir = trim_trailing_slash(&config.out_dir);
        for file in glob_paths(&patterns, &config.cwd, &options)? {
            if trim_trailing_slash(&file) != out_dir {
                removes.insert(file);
            }
        }
    }

    if removes.is_empty() {
        return Ok(0);
    }

    if let Some(config) = configs.first() {
        let logger = Logger::new(
            config.logger.context().clone(),
            config.logger.level(),
            config.logger.fail_on_warn(),
        );
        logger.info(format!("Cleaning {} files", removes.len()));
    }

    // Children of a removed directory may already be gone.
    for file in &removes {
        tracing::debug!("Removing {}", file.display());
        remove(file).await?;
    }
    tracing::debug!("Removed {} files", removes.len());
    Ok(removes.len())
}

/// Remove previously emitted chunks before a watch rebuild.
pub async fn clean_chunks(chunks: &[Chunk]) -> Result<()> {
    for chunk in chunks {
        let path = chunk.path();
        tracing::debug!("Removing chunk file {}", path.display());
        remove(&path).await?;
    }
    Ok(())
}

/// `rm -rf` for one path. Missing paths are fine.
async fn remove(path: &Path) -> Result<()> {
    let result = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BuildError::io(path, e)),
    }
}

fn trim_trailing_slash(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    PathBuf::from(text.trim_end_matches(['/', '\\']))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use bento_config::test_utils::plan;
    use tempfile::TempDir;

    use super::*;

    fn write(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, "x").expect("write");
    }

    #[tokio::test]
    async fn keeps_out_dir_but_removes_contents() {
        let dir = TempDir::new().expect("tempdir");
        write(dir.path(), "dist/index.mjs");
        write(dir.path(), "dist/nested/chunk.mjs");
        write(dir.path(), "dist/.hidden");
        write(dir.path(), "src/index.ts");

        let mut config = plan(dir.path());
        config.clean = vec![dir.path().join("dist").to_string_lossy().into_owned()];

        let removed = clean_out_dirs(&[config]).await.expect("clean");
        assert!(removed >= 3);
        assert!(dir.path().join("dist").is_dir());
        assert!(!dir.path().join("dist/index.mjs").exists());
        assert!(!dir.path().join("dist/.hidden").exists());
        assert!(dir.path().join("src/index.ts").exists());
    }

    #[tokio::test]
    async fn shared_directories_are_cleaned_once() {
        let dir = TempDir::new().expect("tempdir");
        write(dir.path(), "dist/old.js");

        let mut config = plan(dir.path());
        config.clean = vec!["dist/**".into()];
        let once = CleanOnce::new(Arc::new(vec![config.clone(), config]));

        once.run().await.expect("first clean");
        write(dir.path(), "dist/fresh.js");
        once.run().await.expect("second call is a no-op");
        assert!(dir.path().join("dist/fresh.js").exists());
        assert!(!dir.path().join("dist/old.js").exists());
    }

    #[tokio::test]
    async fn chunk_cleanup_ignores_missing_files() {
        let dir = TempDir::new().expect("tempdir");
        write(dir.path(), "dist/index.mjs");
        let chunks = [
            Chunk::entry("index.mjs", dir.path().join("dist")),
            Chunk::entry("gone.mjs", dir.path().join("dist")),
        ];
        clean_chunks(&chunks).await.expect("clean chunks");
        assert!(!dir.path().join("dist/index.mjs").exists());
    }
}
