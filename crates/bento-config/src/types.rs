//! User-facing configuration types.
//!
//! Every field is optional so that configs can be layered key by key: CLI
//! overrides over a config file over a workspace parent. Field names are
//! camelCase on the wire, matching `package.json` conventions.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::feature::{EnabledFlag, WithEnabled};
use crate::logger::LogLevel;

/// `T | T[]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone> OneOrMany<T> {
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value.clone()],
            OneOrMany::Many(values) => values.clone(),
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(value: T) -> Self {
        OneOrMany::One(value)
    }
}

/// Opaque options handed to an external collaborator untouched.
pub type OpaqueOptions = Map<String, Value>;

/// One element of the `entry` option: a path/glob, or a map of output name to
/// path/glob(s).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryItem {
    Path(String),
    Map(IndexMap<String, OneOrMany<String>>),
}

pub type EntryInput = OneOrMany<EntryItem>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Node,
    Neutral,
    Browser,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormatInput {
    One(String),
    Many(Vec<String>),
    Overrides(IndexMap<String, FormatOverride>),
}

/// Per-format overrides, applied after resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minify: Option<Minify>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sourcemap: Option<Sourcemap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_extension: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetOption {
    /// Only `false` is meaningful; `true` behaves like unset.
    Flag(bool),
    Targets(OneOrMany<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TsconfigOption {
    Flag(bool),
    Path(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CleanOption {
    Flag(bool),
    Paths(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourcemapMode {
    Inline,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sourcemap {
    Flag(bool),
    Mode(SourcemapMode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MinifyMode {
    #[serde(rename = "dce-only")]
    DceOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Minify {
    Flag(bool),
    Mode(MinifyMode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeProtocolMode {
    Strip,
}

/// `nodeProtocol`: `true` adds the `node:` prefix to builtins, `"strip"`
/// removes it, `false` leaves imports alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeProtocol {
    Flag(bool),
    Mode(NodeProtocolMode),
}

impl Default for NodeProtocol {
    fn default() -> Self {
        NodeProtocol::Flag(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WatchOption {
    Flag(bool),
    Paths(OneOrMany<String>),
}

impl WatchOption {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, WatchOption::Flag(false))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FromTool {
    Flag(bool),
    Prefix(String),
}

/// `config`: `false` disables config files, a string selects a file or directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigFileOption {
    Enabled(bool),
    Path(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    /// Package directory globs, or `"auto"` to discover every `package.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<OneOrMany<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<OneOrMany<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigFileOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkspaceOption {
    Flag(bool),
    Include(OneOrMany<String>),
    Config(WorkspaceConfig),
}

impl WorkspaceOption {
    pub fn is_truthy(&self) -> bool {
        !matches!(self, WorkspaceOption::Flag(false))
    }

    /// Normalize every accepted shape to a [`WorkspaceConfig`].
    pub fn normalize(&self) -> Option<WorkspaceConfig> {
        match self {
            WorkspaceOption::Flag(false) => None,
            WorkspaceOption::Flag(true) => Some(WorkspaceConfig::default()),
            WorkspaceOption::Include(include) => Some(WorkspaceConfig {
                include: Some(include.clone()),
                ..WorkspaceConfig::default()
            }),
            WorkspaceOption::Config(config) => Some(config.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllowBundleOption {
    /// `false` disables the check. `true` is treated like unset.
    Flag(bool),
    Patterns(OneOrMany<String>),
}

/// Dependency externalization policy as written by the user.
///
/// Pattern strings are exact package ids, globs, or `/regex/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub never_bundle: Option<OneOrMany<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub always_bundle: Option<OneOrMany<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_allow_bundle: Option<AllowBundleOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_node_modules_bundle: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyEntry {
    pub from: OneOrMany<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Drop the source directory structure. Defaults to `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flatten: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CopyItem {
    Path(String),
    Entry(CopyEntry),
}

pub type CopyOptions = OneOrMany<CopyItem>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecksOptions {
    /// Advise against CommonJS output when the target Node can `require(esm)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_cjs: Option<bool>,
    #[serde(flatten)]
    pub rest: OpaqueOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DevExports {
    All(bool),
    Condition(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportsOptions {
    /// Point exports at source files. A string names a condition instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_exports: Option<DevExports>,
    /// Add a `./*` wildcard and export non-entry chunks too.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_exports: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevtoolsOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<bool>,
    /// Remove `node_modules/.rolldown` together with the output directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean: Option<bool>,
    #[serde(flatten)]
    pub rest: OpaqueOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExeOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sea_config: Option<OpaqueOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gzip: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brotli: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_compress_size: Option<u64>,
}

/// One user-authored configuration unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfig {
    // Input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<EntryInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deps: Option<DepsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tsconfig: Option<TsconfigOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<IndexMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_prefix: Option<OneOrMany<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub define: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shims: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treeshake: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_protocol: Option<NodeProtocol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checks: Option<ChecksOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugins: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_options: Option<OpaqueOptions>,

    // Output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<FormatInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sourcemap: Option<Sourcemap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean: Option<CleanOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minify: Option<Minify>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unbundle: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_extension: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cjs_default: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_options: Option<OpaqueOptions>,

    // Run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_on_warn: Option<EnabledFlag>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "fromVite")]
    pub from_tool: Option<FromTool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch: Option<WatchOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_watch: Option<OneOrMany<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devtools: Option<WithEnabled<DevtoolsOptions>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<WorkspaceOption>,

    // Addons
    /// Shell command run after every successful build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dts: Option<WithEnabled<OpaqueOptions>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unused: Option<WithEnabled<OpaqueOptions>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publint: Option<WithEnabled<OpaqueOptions>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attw: Option<WithEnabled<OpaqueOptions>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<WithEnabled<ReportOptions>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glob_import: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exports: Option<WithEnabled<ExportsOptions>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy: Option<CopyOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exe: Option<WithEnabled<ExeOptions>>,

    // Deprecated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_node_protocol: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_dir: Option<CopyOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<OneOrMany<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_external: Option<OneOrMany<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_only: Option<AllowBundleOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_node_modules_bundle: Option<bool>,
}

impl UserConfig {
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| crate::error::ConfigError::invalid("config", e.to_string()))
    }

    /// Shallow layering: every key set in `overrides` replaces the same key here.
    pub fn layer(&self, overrides: &UserConfig) -> Result<UserConfig> {
        crate::merge::layer_config(self, overrides)
    }

    pub fn is_watch(&self) -> bool {
        self.watch.as_ref().is_some_and(WatchOption::is_enabled)
    }
}

/// Config-name / relative-cwd filter. `/regex/` strings are regexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterOption {
    One(String),
    Many(Vec<String>),
}

/// Options given on the command line or programmatically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineConfig {
    #[serde(flatten)]
    pub user: UserConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigFileOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterOption>,
}

/// Environment handed to a config function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigEnv {
    pub ci: bool,
}

pub type ConfigFn =
    Arc<dyn Fn(&InlineConfig, ConfigEnv) -> std::result::Result<ConfigExport, String> + Send + Sync>;

/// An item inside a config list. Functions are only legal at the top level.
#[derive(Clone)]
pub enum ConfigItem {
    Config(UserConfig),
    Function(ConfigFn),
}

/// What a config module exports.
#[derive(Clone)]
pub enum ConfigExport {
    Single(UserConfig),
    Many(Vec<ConfigItem>),
    Function(ConfigFn),
}

impl ConfigExport {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&InlineConfig, ConfigEnv) -> std::result::Result<ConfigExport, String>
            + Send
            + Sync
            + 'static,
    {
        ConfigExport::Function(Arc::new(f))
    }
}

impl From<UserConfig> for ConfigExport {
    fn from(config: UserConfig) -> Self {
        ConfigExport::Single(config)
    }
}

impl From<Vec<UserConfig>> for ConfigExport {
    fn from(configs: Vec<UserConfig>) -> Self {
        ConfigExport::Many(configs.into_iter().map(ConfigItem::Config).collect())
    }
}

impl fmt::Debug for ConfigItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigItem::Config(config) => f.debug_tuple("Config").field(config).finish(),
            ConfigItem::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl fmt::Debug for ConfigExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigExport::Single(config) => f.debug_tuple("Single").field(config).finish(),
            ConfigExport::Many(items) => f.debug_tuple("Many").field(items).finish(),
            ConfigExport::Function(_) => f.write_str("Function(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_every_entry_shape() {
        let config = UserConfig::from_value(json!({
            "entry": ["src/index.ts", { "hooks/*": ["src/hooks/*.ts", "!src/hooks/index.ts"] }],
        }))
        .expect("config");
        let Some(OneOrMany::Many(items)) = config.entry else {
            panic!("expected entry list");
        };
        assert_eq!(items[0], EntryItem::Path("src/index.ts".into()));
        assert!(matches!(&items[1], EntryItem::Map(map) if map.contains_key("hooks/*")));
    }

    #[test]
    fn parses_format_overrides() {
        let config = UserConfig::from_value(json!({
            "format": { "esm": { "target": "es2020" }, "cjs": {} },
        }))
        .expect("config");
        let Some(FormatInput::Overrides(map)) = config.format else {
            panic!("expected override object");
        };
        assert_eq!(map.keys().collect::<Vec<_>>(), ["esm", "cjs"]);
    }

    #[test]
    fn workspace_shapes_normalize() {
        let flag: WorkspaceOption = serde_json::from_value(json!(true)).expect("flag");
        assert_eq!(flag.normalize(), Some(WorkspaceConfig::default()));

        let include: WorkspaceOption = serde_json::from_value(json!("packages/*")).expect("include");
        assert_eq!(
            include.normalize().and_then(|w| w.include),
            Some(OneOrMany::One("packages/*".into()))
        );
    }

    #[test]
    fn inline_config_flattens_user_fields() {
        let inline: InlineConfig = serde_json::from_value(json!({
            "outDir": "lib",
            "config": false,
            "filter": ["a", "b"],
        }))
        .expect("inline");
        assert_eq!(inline.user.out_dir, Some(PathBuf::from("lib")));
        assert_eq!(inline.config, Some(ConfigFileOption::Enabled(false)));
    }

    #[test]
    fn from_vite_is_accepted_as_alias() {
        let config = UserConfig::from_value(json!({ "fromVite": "vitest" })).expect("config");
        assert_eq!(config.from_tool, Some(FromTool::Prefix("vitest".into())));
    }

    #[test]
    fn layering_replaces_whole_keys() {
        let base = UserConfig::from_value(json!({ "outDir": "dist", "deps": { "neverBundle": "a" } }))
            .expect("base");
        let over = UserConfig::from_value(json!({ "deps": { "alwaysBundle": "b" } })).expect("over");
        let layered = base.layer(&over).expect("layer");
        assert_eq!(layered.out_dir, Some(PathBuf::from("dist")));
        assert_eq!(layered.deps.and_then(|d| d.never_bundle), None);
    }
}
