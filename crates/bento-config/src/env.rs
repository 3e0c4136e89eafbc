//! Build-time environment variables.
//!
//! Precedence, lowest first: env file, process environment, the `env` option.
//! Only variables matching one of the prefixes are taken from the file and the
//! process; the `env` option is always taken as written.

use std::path::Path;

use indexmap::IndexMap;
use path_clean::PathClean;
use serde_json::Value;

use crate::error::{ConfigError, Result};
use crate::logger::Logger;

pub const DEFAULT_ENV_PREFIX: &str = "BENTO_";

pub type EnvMap = IndexMap<String, Value>;

pub fn resolve_env(
    env: Option<&EnvMap>,
    env_file: Option<&str>,
    prefixes: &[String],
    cwd: &Path,
    logger: &Logger,
) -> Result<EnvMap> {
    resolve_env_with(env, env_file, prefixes, cwd, logger, std::env::vars())
}

/// [`resolve_env`] with an explicit process environment.
pub fn resolve_env_with(
    env: Option<&EnvMap>,
    env_file: Option<&str>,
    prefixes: &[String],
    cwd: &Path,
    logger: &Logger,
    process_vars: impl IntoIterator<Item = (String, String)>,
) -> Result<EnvMap> {
    if prefixes.iter().any(String::is_empty) {
        logger.warn(
            "`envPrefix` includes an empty string; filtering is disabled. All environment variables from the env file and process.env will be injected into the build. Ensure this is intended to avoid accidental leakage of sensitive information.",
        );
    }

    let mut resolved = EnvMap::new();

    if let Some(env_file) = env_file {
        let path = cwd.join(env_file).clean();
        logger.info(format!("env file: {}", path.display()));
        let iter = dotenvy::from_path_iter(&path).map_err(|e| ConfigError::EnvFile {
            path: path.clone(),
            message: e.to_string(),
        })?;
        for item in iter {
            let (key, value) = item.map_err(|e| ConfigError::EnvFile {
                path: path.clone(),
                message: e.to_string(),
            })?;
            if matches_prefix(&key, prefixes) {
                resolved.insert(key, Value::String(value));
            }
        }
    }

    let mut from_process: Vec<(String, String)> = process_vars
        .into_iter()
        .filter(|(key, _)| matches_prefix(key, prefixes))
        .collect();
    from_process.sort();
    for (key, value) in from_process {
        resolved.insert(key, Value::String(value));
    }

    if let Some(env) = env {
        for (key, value) in env {
            resolved.insert(key.clone(), value.clone());
        }
    }

    tracing::debug!("Environment variables: {:?}", resolved);
    Ok(resolved)
}

fn matches_prefix(key: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| key.starts_with(prefix.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunContext;
    use crate::logger::LogLevel;
    use serde_json::json;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn logger(ctx: &Arc<RunContext>) -> Logger {
        Logger::new(ctx.clone(), LogLevel::Silent, false)
    }

    #[test]
    fn option_beats_process_beats_file() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(
            dir.path().join(".env"),
            "BENTO_A=file\nBENTO_B=file\nBENTO_C=file\nOTHER=file\n",
        )
        .expect("write");
        let ctx = Arc::new(RunContext::new("/"));

        let option: EnvMap = [("BENTO_A".to_string(), json!("option"))].into_iter().collect();
        let process = vec![
            ("BENTO_A".to_string(), "process".to_string()),
            ("BENTO_B".to_string(), "process".to_string()),
            ("HOME".to_string(), "/root".to_string()),
        ];

        let env = resolve_env_with(
            Some(&option),
            Some(".env"),
            &[DEFAULT_ENV_PREFIX.to_string()],
            dir.path(),
            &logger(&ctx),
            process,
        )
        .expect("env");

        assert_eq!(env.get("BENTO_A"), Some(&json!("option")));
        assert_eq!(env.get("BENTO_B"), Some(&json!("process")));
        assert_eq!(env.get("BENTO_C"), Some(&json!("file")));
        assert!(!env.contains_key("OTHER"));
        assert!(!env.contains_key("HOME"));
    }

    #[test]
    fn empty_prefix_warns_and_keeps_everything() {
        let ctx = Arc::new(RunContext::new("/"));
        let env = resolve_env_with(
            None,
            None,
            &[String::new()],
            Path::new("/"),
            &logger(&ctx),
            vec![("HOME".to_string(), "/root".to_string())],
        )
        .expect("env");
        assert_eq!(env.get("HOME"), Some(&json!("/root")));
        assert!(ctx.was_warned(
            "`envPrefix` includes an empty string; filtering is disabled. All environment variables from the env file and process.env will be injected into the build. Ensure this is intended to avoid accidental leakage of sensitive information."
        ));
    }

    #[test]
    fn missing_env_file_is_an_error() {
        let dir = TempDir::new().expect("tempdir");
        let ctx = Arc::new(RunContext::new("/"));
        let err = resolve_env_with(None, Some("missing.env"), &[], dir.path(), &logger(&ctx), Vec::new())
            .expect_err("missing");
        assert!(matches!(err, ConfigError::EnvFile { .. }));
    }
}
