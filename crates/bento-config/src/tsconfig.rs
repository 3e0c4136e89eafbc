use std::path::{Path, PathBuf};

use path_clean::PathClean;

use crate::glob::relative_slash;
use crate::logger::Logger;
use crate::package::find_up;
use crate::types::TsconfigOption;

const TSCONFIG: &str = "tsconfig.json";

/// Locate the tsconfig to compile with. `None` means no tsconfig.
///
/// Only a missing tsconfig that was explicitly asked for is warned about.
pub fn resolve_tsconfig(option: Option<&TsconfigOption>, cwd: &Path, logger: &Logger) -> Option<PathBuf> {
    let resolved = match option {
        Some(TsconfigOption::Flag(false)) => return None,
        Some(TsconfigOption::Flag(true)) => {
            let found = find_up(cwd, TSCONFIG);
            if found.is_none() {
                logger.warn(format!("No tsconfig found in {}", cwd.display()));
            }
            found
        }
        None => find_up(cwd, TSCONFIG),
        Some(TsconfigOption::Path(path)) => {
            let candidate = cwd.join(path).clean();
            if candidate.is_file() {
                Some(candidate)
            } else if candidate.is_dir() {
                let found = find_up(&candidate, TSCONFIG);
                if found.is_none() {
                    logger.warn(format!("No tsconfig found in {}", candidate.display()));
                }
                found
            } else {
                let found = find_up(cwd, path);
                if found.is_none() {
                    logger.warn(format!("tsconfig {path} doesn't exist"));
                }
                found
            }
        }
    };

    if let Some(path) = &resolved {
        logger.info(format!("tsconfig: {}", relative_slash(path, cwd)));
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunContext;
    use crate::logger::LogLevel;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn logger(ctx: &Arc<RunContext>) -> Logger {
        Logger::new(ctx.clone(), LogLevel::Silent, false)
    }

    #[test]
    fn finds_nearest_ancestor() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("tsconfig.json"), "{}").expect("write");
        let nested = dir.path().join("packages/a");
        fs::create_dir_all(&nested).expect("mkdir");

        let ctx = Arc::new(RunContext::new("/"));
        assert_eq!(
            resolve_tsconfig(None, &nested, &logger(&ctx)),
            Some(dir.path().join("tsconfig.json"))
        );
    }

    #[test]
    fn explicit_file_and_bare_name() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("tsconfig.build.json"), "{}").expect("write");
        let ctx = Arc::new(RunContext::new("/"));

        let explicit = TsconfigOption::Path("tsconfig.build.json".into());
        assert_eq!(
            resolve_tsconfig(Some(&explicit), dir.path(), &logger(&ctx)),
            Some(dir.path().join("tsconfig.build.json"))
        );
        assert_eq!(resolve_tsconfig(Some(&TsconfigOption::Flag(false)), dir.path(), &logger(&ctx)), None);
    }

    #[test]
    fn warns_only_when_requested() {
        let dir = TempDir::new().expect("tempdir");
        let ctx = Arc::new(RunContext::new("/"));

        // Nothing on disk and nothing asked for: silent.
        let implicit = resolve_tsconfig(None, dir.path(), &logger(&ctx));
        let message = format!("No tsconfig found in {}", dir.path().display());
        if implicit.is_none() {
            assert!(!ctx.was_warned(&message));
            resolve_tsconfig(Some(&TsconfigOption::Flag(true)), dir.path(), &logger(&ctx));
            assert!(ctx.was_warned(&message));
        }
    }
}
