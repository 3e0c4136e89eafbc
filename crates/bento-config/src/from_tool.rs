//! Import aliases and plugins from another build tool's config file.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ConfigError, Result};
use crate::logger::Logger;
use crate::types::FromTool;

const DEFAULT_TOOL: &str = "vite";
const TOOL_CONFIG_EXTENSIONS: &[&str] = &["json", "toml", "yaml", "yml"];

#[derive(Debug, Clone, Default, Deserialize)]
struct ToolConfig {
    #[serde(default)]
    resolve: Option<ToolResolve>,
    #[serde(default)]
    plugins: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ToolResolve {
    #[serde(default)]
    alias: Option<Value>,
}

/// What a tool config contributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolContribution {
    pub alias: IndexMap<String, String>,
    pub plugins: Vec<Value>,
    pub file: Option<PathBuf>,
}

/// Look for `<prefix>.config.*` in `cwd` and read its aliases and plugins.
///
/// Returns `None` when the option is off or no file exists.
pub fn load_tool_config(option: Option<&FromTool>, cwd: &Path, logger: &Logger) -> Result<Option<ToolContribution>> {
    let prefix = match option {
        None | Some(FromTool::Flag(false)) => return Ok(None),
        Some(FromTool::Flag(true)) => DEFAULT_TOOL,
        Some(FromTool::Prefix(prefix)) => prefix.as_str(),
    };

    let Some(file) = TOOL_CONFIG_EXTENSIONS
        .iter()
        .map(|ext| cwd.join(format!("{prefix}.config.{ext}")))
        .find(|path| path.is_file())
    else {
        tracing::debug!("no {prefix} config found in {}", cwd.display());
        return Ok(None);
    };

    logger.info(format!("Using {prefix} config: {}", file.display()));
    let config = parse_tool_config(&file)?;

    let alias = match config.resolve.and_then(|r| r.alias) {
        None | Some(Value::Null) => IndexMap::new(),
        Some(Value::Array(_)) => {
            return Err(ConfigError::invalid(
                "resolve.alias",
                format!("Unsupported resolve.alias in {prefix} config. Use object instead of array"),
            ));
        }
        Some(Value::Object(map)) => map
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(target) => Some((key, target)),
                _ => None,
            })
            .collect(),
        Some(other) => {
            return Err(ConfigError::invalid(
                "resolve.alias",
                format!("expected an object, found {other}"),
            ));
        }
    };

    Ok(Some(ToolContribution {
        alias,
        plugins: config.plugins.unwrap_or_default(),
        file: Some(file),
    }))
}

fn parse_tool_config(path: &Path) -> Result<ToolConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    let parse_error = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Some("toml") => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Some("yaml" | "yml") => serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string())),
        other => Err(ConfigError::UnsupportedFormat(other.unwrap_or_default().to_string())),
    }
}
