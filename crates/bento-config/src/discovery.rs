//! Config file discovery and loading.
//!
//! Finds `bento.config.{toml,json,yaml,yml}` or the `bento` field of
//! `package.json`, walking up from the working directory, and turns whatever
//! it exports into an ordered list of [`UserConfig`]s.

use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use serde_json::Value;

use crate::context::RunContext;
use crate::error::{ConfigError, Result};
use crate::types::{ConfigEnv, ConfigExport, ConfigFileOption, ConfigItem, InlineConfig, UserConfig};

pub const CONFIG_PREFIX: &str = "bento.config";
pub const CONFIG_EXTENSIONS: &[&str] = &["toml", "json", "yaml", "yml"];
pub const PACKAGE_JSON_FIELD: &str = "bento";

/// Output of one loader run.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfigs {
    /// Logical configs in declaration order, each with an absolute `cwd`.
    pub configs: Vec<UserConfig>,
    /// The file the configs came from, if any.
    pub file: Option<PathBuf>,
}

/// File-based configuration discovery
///
/// # Example
///
/// ```no_run
/// use bento_config::{ConfigLoader, InlineConfig, RunContext};
///
/// let ctx = RunContext::new(".");
/// let loaded = ConfigLoader::new(".").load(&InlineConfig::default(), &ctx).unwrap();
/// println!("{} configs", loaded.configs.len());
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    cwd: PathBuf,
    stop_at: Option<PathBuf>,
    export: Option<ConfigExport>,
}

impl ConfigLoader {
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            stop_at: None,
            export: None,
        }
    }

    /// Do not search above `dir`.
    pub fn scoped_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.stop_at = Some(dir.into());
        self
    }

    /// Use an in-memory config module instead of searching the filesystem.
    pub fn with_export(mut self, export: ConfigExport) -> Self {
        self.export = Some(export);
        self
    }

    /// Find a config file, starting at the working directory.
    ///
    /// In each directory the `bento.config.*` files are tried in extension
    /// order, then `package.json` if it has a `bento` field.
    pub fn find(&self) -> Option<PathBuf> {
        for dir in self.cwd.ancestors() {
            for ext in CONFIG_EXTENSIONS {
                let candidate = dir.join(format!("{CONFIG_PREFIX}.{ext}"));
                if candidate.is_file() {
                    return Some(candidate);
                }
            }

            let pkg_path = dir.join("package.json");
            if pkg_path.is_file() && package_json_has_field(&pkg_path) {
                return Some(pkg_path);
            }

            if self.stop_at.as_deref() == Some(dir) {
                break;
            }
        }
        None
    }

    /// Load configs for `inline`.
    ///
    /// `config: false` yields one empty config. An explicit file is loaded
    /// without searching; an explicit directory becomes the search root.
    pub fn load(&self, inline: &InlineConfig, ctx: &RunContext) -> Result<LoadedConfigs> {
        let mut cwd = self.cwd.clone();
        let mut explicit_file = None;

        match &inline.config {
            Some(ConfigFileOption::Enabled(false)) => {
                return Ok(LoadedConfigs {
                    configs: vec![UserConfig {
                        cwd: Some(cwd),
                        ..UserConfig::default()
                    }],
                    file: None,
                });
            }
            Some(ConfigFileOption::Path(path)) => {
                let resolved = self.cwd.join(path).clean();
                if resolved.is_file() {
                    cwd = resolved.parent().map(Path::to_path_buf).unwrap_or_default();
                    explicit_file = Some(resolved);
                } else if resolved.is_dir() {
                    cwd = resolved;
                } else {
                    return Err(ConfigError::NotFound(resolved));
                }
            }
            Some(ConfigFileOption::Enabled(true)) | None => {}
        }

        let (export, file) = match (explicit_file, &self.export) {
            (Some(file), _) => (Some(read_config_file(&file)?), Some(file)),
            (None, Some(export)) => (Some(export.clone()), None),
            (None, None) => {
                let loader = Self {
                    cwd: cwd.clone(),
                    stop_at: self.stop_at.clone(),
                    export: None,
                };
                match loader.find() {
                    Some(file) => (Some(read_config_file(&file)?), Some(file)),
                    None => (None, None),
                }
            }
        };

        if let Some(file) = &file {
            tracing::info!(target: "bento", "config file: {}", file.display());
        }

        let mut configs = match export {
            Some(export) => flatten_export(export, inline, ctx)?,
            None => Vec::new(),
        };
        if configs.is_empty() {
            configs.push(UserConfig::default());
        }

        for config in &mut configs {
            config.cwd = Some(match &config.cwd {
                Some(own) => cwd.join(own).clean(),
                None => cwd.clone(),
            });
        }

        Ok(LoadedConfigs { configs, file })
    }
}

fn flatten_export(export: ConfigExport, inline: &InlineConfig, ctx: &RunContext) -> Result<Vec<UserConfig>> {
    let export = match export {
        ConfigExport::Function(f) => f(inline, ConfigEnv { ci: ctx.is_ci() }).map_err(ConfigError::Function)?,
        other => other,
    };

    match export {
        ConfigExport::Single(config) => Ok(vec![config]),
        ConfigExport::Many(items) => items
            .into_iter()
            .map(|item| match item {
                ConfigItem::Config(config) => Ok(config),
                ConfigItem::Function(_) => Err(ConfigError::NestedFunction),
            })
            .collect(),
        ConfigExport::Function(_) => Err(ConfigError::NestedFunction),
    }
}

/// Parse a config file into its export. `package.json` yields its `bento` field.
pub fn read_config_file(path: &Path) -> Result<ConfigExport> {
    let value = parse_config_value(path)?;
    value_to_export(path, value)
}

fn parse_config_value(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    let parse_err = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    if path.file_name().and_then(|n| n.to_str()) == Some("package.json") {
        let parsed: Value = serde_json::from_str(&content).map_err(|e| parse_err(e.to_string()))?;
        return Ok(parsed.get(PACKAGE_JSON_FIELD).cloned().unwrap_or(Value::Null));
    }

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|e| parse_err(e.to_string())),
        Some("toml") => {
            let parsed: toml::Value = toml::from_str(&content).map_err(|e| parse_err(e.to_string()))?;
            serde_json::to_value(parsed).map_err(|e| parse_err(e.to_string()))
        }
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content).map_err(|e| parse_err(e.to_string())),
        other => Err(ConfigError::UnsupportedFormat(
            other.unwrap_or_default().to_string(),
        )),
    }
}

fn value_to_export(path: &Path, value: Value) -> Result<ConfigExport> {
    let parse = |value: Value| {
        serde_json::from_value::<UserConfig>(value).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    };

    let many = |items: Vec<Value>| {
        items
            .into_iter()
            .map(|item| parse(item).map(ConfigItem::Config))
            .collect::<Result<Vec<_>>>()
            .map(ConfigExport::Many)
    };

    match value {
        Value::Null => Ok(ConfigExport::Many(Vec::new())),
        Value::Array(items) => many(items),
        // TOML has no top-level arrays; `[[config]]` tables stand in for them.
        Value::Object(mut map) => match map.remove("config") {
            Some(Value::Array(items)) if map.is_empty() => many(items),
            Some(other) => {
                map.insert("config".to_string(), other);
                parse(Value::Object(map)).map(ConfigExport::Single)
            }
            None => parse(Value::Object(map)).map(ConfigExport::Single),
        },
        other => parse(other).map(ConfigExport::Single),
    }
}

fn package_json_has_field(path: &Path) -> bool {
    fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str::<Value>(&content).ok())
        .is_some_and(|parsed| parsed.get(PACKAGE_JSON_FIELD).is_some_and(|v| !v.is_null()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OneOrMany;
    use tempfile::TempDir;

    fn ctx() -> RunContext {
        RunContext::new("/").with_ci(false)
    }

    #[test]
    fn toml_wins_over_json_in_same_directory() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("bento.config.json"), r#"{"outDir":"json"}"#).expect("write");
        fs::write(dir.path().join("bento.config.toml"), "outDir = \"toml\"").expect("write");

        let found = ConfigLoader::new(dir.path()).find().expect("found");
        assert!(found.ends_with("bento.config.toml"));
    }

    #[test]
    fn package_json_without_field_is_skipped() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("package.json"), r#"{"name":"x"}"#).expect("write");
        assert_eq!(ConfigLoader::new(dir.path()).scoped_to(dir.path()).find(), None);
    }

    #[test]
    fn toml_config_tables_form_a_list() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(
            dir.path().join("bento.config.toml"),
            "[[config]]\nentry = \"src/a.ts\"\n\n[[config]]\nentry = \"src/b.ts\"\n",
        )
        .expect("write");

        let loaded = ConfigLoader::new(dir.path())
            .load(&InlineConfig::default(), &ctx())
            .expect("load");
        assert_eq!(loaded.configs.len(), 2);
        assert_eq!(
            loaded.configs[1].entry,
            Some(OneOrMany::One(crate::types::EntryItem::Path("src/b.ts".into())))
        );
    }

    #[test]
    fn function_returning_function_is_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let export = ConfigExport::function(|_, _| Ok(ConfigExport::function(|_, _| Ok(UserConfig::default().into()))));
        let err = ConfigLoader::new(dir.path())
            .with_export(export)
            .load(&InlineConfig::default(), &ctx())
            .expect_err("nested");
        assert!(matches!(err, ConfigError::NestedFunction));
    }
}
