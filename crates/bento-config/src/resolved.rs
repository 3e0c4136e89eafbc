//! The fully resolved, single-format build plan.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::deps::ResolvedDepsConfig;
use crate::entry::EntryMap;
use crate::env::EnvMap;
use crate::error::{ConfigError, Result};
use crate::logger::Logger;
use crate::package::PackageJson;
use crate::pattern::Pattern;
use crate::types::{
    ChecksOptions, CopyOptions, DevtoolsOptions, EntryInput, ExeOptions, ExportsOptions, Minify,
    NodeProtocol, OpaqueOptions, Platform, ReportOptions, Sourcemap,
};

/// Output module format after alias normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Es,
    Cjs,
    Iife,
    Umd,
}

impl Format {
    /// `es`, `esm` and `module` are ES modules; `cjs` and `commonjs` are CommonJS.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim() {
            "es" | "esm" | "module" => Ok(Format::Es),
            "cjs" | "commonjs" => Ok(Format::Cjs),
            "iife" => Ok(Format::Iife),
            "umd" => Ok(Format::Umd),
            other => Err(ConfigError::invalid("format", format!("unknown format `{other}`"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Format::Es => "es",
            Format::Cjs => "cjs",
            Format::Iife => "iife",
            Format::Umd => "umd",
        }
    }

    /// Label used in build output.
    pub fn label(self) -> &'static str {
        match self {
            Format::Es => "ESM",
            Format::Cjs => "CJS",
            Format::Iife => "IIFE",
            Format::Umd => "UMD",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side effects that must run once per logical config, not once per format.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOnceOptions {
    pub copy: Option<CopyOptions>,
    pub on_success: Option<String>,
}

/// One immutable build plan: a logical config resolved for a single format.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub name: Option<String>,
    pub cwd: PathBuf,
    pub pkg: Option<Arc<PackageJson>>,
    pub logger: Logger,

    pub format: Format,
    /// Position of this format in its logical config's fan-out.
    pub fanout_index: usize,
    pub(crate) run_once: Arc<RunOnceOptions>,

    // Input
    pub entry: EntryMap,
    /// The entry option as written, kept to re-expand glob entries in watch mode.
    pub raw_entry: Option<EntryInput>,
    pub platform: Platform,
    pub target: Option<Vec<String>>,
    pub tsconfig: Option<PathBuf>,
    pub alias: IndexMap<String, String>,
    pub define: IndexMap<String, String>,
    pub env: EnvMap,
    pub deps: ResolvedDepsConfig,
    pub node_protocol: NodeProtocol,
    pub checks: ChecksOptions,
    pub plugins: Vec<Value>,
    pub shims: bool,
    pub treeshake: bool,
    pub input_options: Option<OpaqueOptions>,

    // Output
    pub out_dir: PathBuf,
    /// Patterns relative to `cwd` removed before the first build.
    pub clean: Vec<String>,
    pub sourcemap: Sourcemap,
    pub minify: Option<Minify>,
    pub global_name: Option<String>,
    pub unbundle: bool,
    pub fixed_extension: bool,
    pub hash: bool,
    pub cjs_default: bool,
    pub glob_import: bool,
    pub write: bool,
    pub output_options: Option<OpaqueOptions>,

    // Features
    pub dts: Option<OpaqueOptions>,
    pub unused: Option<OpaqueOptions>,
    pub report: Option<ReportOptions>,
    /// Shared between the formats of one logical config.
    pub exports: Option<Arc<ExportsOptions>>,
    pub publint: Option<Arc<OpaqueOptions>>,
    pub attw: Option<Arc<OpaqueOptions>>,
    pub exe: Option<ExeOptions>,
    pub devtools: Option<DevtoolsOptions>,

    // Watch
    pub watch: bool,
    /// Extra paths to watch besides the module graph.
    pub watch_paths: Vec<PathBuf>,
    pub ignore_watch: Vec<Pattern>,
}

impl ResolvedConfig {
    /// Copy and success command, present only on the first format.
    pub fn run_once(&self) -> Option<&RunOnceOptions> {
        (self.fanout_index == 0).then_some(&*self.run_once)
    }

    pub fn package_json_path(&self) -> Option<&Path> {
        self.pkg.as_deref().map(|pkg| pkg.path.as_path())
    }

    pub fn name_or_cwd(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.cwd.display().to_string())
    }

    pub fn dts_enabled(&self) -> bool {
        self.dts.is_some()
    }

    /// Clean patterns including the devtools cache when devtools ask for it.
    pub fn clean_patterns(&self) -> Vec<String> {
        let mut patterns = self.clean.clone();
        if self.devtools.as_ref().is_some_and(|d| d.clean.unwrap_or(true)) {
            patterns.push("node_modules/.rolldown".to_string());
        }
        patterns
    }

    /// Output file extension for JavaScript chunks of this format.
    pub fn js_extension(&self) -> &'static str {
        let module = self.pkg.as_deref().and_then(|p| p.kind.as_deref()) == Some("module");
        match (self.format, self.fixed_extension, module) {
            (Format::Es, true, _) => "mjs",
            (Format::Cjs, true, _) => "cjs",
            (Format::Es, false, false) => "mjs",
            (Format::Cjs, false, true) => "cjs",
            _ => "js",
        }
    }

    /// Whether this config wants a watcher.
    pub fn is_watch(&self) -> bool {
        self.watch
    }
}
