//! `package.json` lookup and the fields resolution cares about.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typings: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exports: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_dependencies: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engines: Option<IndexMap<String, String>>,

    /// Absolute path of the file this was read from.
    #[serde(skip)]
    pub path: PathBuf,
}

impl PackageJson {
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let mut pkg: PackageJson =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        pkg.path = path.to_path_buf();
        Ok(pkg)
    }

    /// Read the nearest `package.json` at or above `dir`.
    pub fn find(dir: &Path) -> Result<Option<Self>> {
        match find_up(dir, "package.json") {
            Some(path) => {
                tracing::debug!("Reading package.json: {}", path.display());
                Self::read(&path).map(Some)
            }
            None => Ok(None),
        }
    }

    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(&self.path)
    }

    /// Production and peer dependency names.
    pub fn production_deps(&self) -> Vec<String> {
        self.dependencies
            .iter()
            .chain(self.peer_dependencies.iter())
            .flat_map(|deps| deps.keys().cloned())
            .collect()
    }

    /// Whether `exports` declares a `types` condition anywhere.
    pub fn has_exports_types(&self) -> bool {
        fn walk(value: &Value) -> bool {
            match value {
                Value::Object(map) => map
                    .iter()
                    .any(|(key, value)| key == "types" || walk(value)),
                Value::Array(items) => items.iter().any(walk),
                _ => false,
            }
        }
        self.exports.as_ref().is_some_and(walk)
    }

    pub fn declares_types(&self) -> bool {
        self.types.is_some() || self.typings.is_some() || self.has_exports_types()
    }
}

/// Walk from `dir` up to the filesystem root looking for `name`.
pub fn find_up(dir: &Path, name: &str) -> Option<PathBuf> {
    dir.ancestors()
        .map(|ancestor| ancestor.join(name))
        .find(|candidate| candidate.is_file())
}
