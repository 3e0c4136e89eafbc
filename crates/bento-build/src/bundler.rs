//! The contract between the orchestrator and a bundling engine.
//!
//! The engine itself is a black box: it receives [`BuildOptions`] and either
//! compiles once, returning the emitted [`Chunk`]s, or starts a
//! [`WatchSession`] that streams lifecycle and file-change events until it is
//! closed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bento_config::{
    EntryMap, Format, Minify, NodeProtocol, OpaqueOptions, Pattern, Platform, ReportOptions,
    Sourcemap,
};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::deps::DependencyClassifier;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Chunk,
    Asset,
}

/// A module that ended up inside a chunk, with the modules importing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkModule {
    pub id: String,
    pub importers: Vec<String>,
}

/// One emitted output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub kind: ChunkKind,
    /// Path relative to `out_dir`.
    pub file_name: String,
    pub name: String,
    pub is_entry: bool,
    /// The module a chunk re-exports as its public face, if any.
    pub facade_module_id: Option<String>,
    pub modules: Vec<ChunkModule>,
    pub out_dir: PathBuf,
}

impl Chunk {
    /// An entry chunk named after its file.
    pub fn entry(file_name: impl Into<String>, out_dir: impl Into<PathBuf>) -> Self {
        let file_name = file_name.into();
        let name = strip_js_extension(&file_name).to_string();
        Self {
            kind: ChunkKind::Chunk,
            file_name,
            name,
            is_entry: true,
            facade_module_id: None,
            modules: Vec::new(),
            out_dir: out_dir.into(),
        }
    }

    pub fn asset(file_name: impl Into<String>, out_dir: impl Into<PathBuf>) -> Self {
        let file_name = file_name.into();
        Self {
            kind: ChunkKind::Asset,
            name: file_name.clone(),
            file_name,
            is_entry: false,
            facade_module_id: None,
            modules: Vec::new(),
            out_dir: out_dir.into(),
        }
    }

    pub fn with_facade(mut self, id: impl Into<String>) -> Self {
        self.facade_module_id = Some(id.into());
        self
    }

    pub fn with_modules(mut self, modules: Vec<ChunkModule>) -> Self {
        self.modules = modules;
        self
    }

    pub fn non_entry(mut self) -> Self {
        self.is_entry = false;
        self
    }

    pub fn is_asset(&self) -> bool {
        self.kind == ChunkKind::Asset
    }

    /// Declaration output such as `index.d.ts`, `index.d.mts` or `index.d.cts`.
    pub fn is_dts(&self) -> bool {
        is_dts_file(&self.file_name)
    }

    /// Absolute path of the emitted file.
    pub fn path(&self) -> PathBuf {
        self.out_dir.join(self.file_name.replace('\\', "/"))
    }
}

pub fn is_dts_file(path: &str) -> bool {
    [".d.ts", ".d.mts", ".d.cts"].iter().any(|ext| path.ends_with(ext))
}

fn strip_js_extension(file_name: &str) -> &str {
    for ext in [".d.mts", ".d.cts", ".d.ts", ".mjs", ".cjs", ".js"] {
        if let Some(stem) = file_name.strip_suffix(ext) {
            return stem;
        }
    }
    file_name
}

/// Declaration emit for one pass.
#[derive(Debug, Clone, PartialEq)]
pub enum DtsPass {
    /// Declarations next to the code.
    Emit(OpaqueOptions),
    /// Declarations only, for the extra CommonJS pass.
    Only(OpaqueOptions),
}

#[derive(Clone)]
pub struct InputOptions {
    pub entry: EntryMap,
    pub cwd: PathBuf,
    pub platform: Platform,
    pub target: Option<Vec<String>>,
    pub tsconfig: Option<PathBuf>,
    pub alias: IndexMap<String, String>,
    /// User defines plus `process.env.*` and `import.meta.env.*` for every env entry.
    pub define: IndexMap<String, String>,
    pub never_bundle: Vec<Pattern>,
    /// Externalization predicate the engine consults on every resolution.
    pub classifier: Option<Arc<DependencyClassifier>>,
    pub node_protocol: NodeProtocol,
    pub treeshake: bool,
    pub shims: bool,
    pub glob_import: bool,
    pub plugins: Vec<Value>,
    pub dts: Option<DtsPass>,
    pub unused: Option<OpaqueOptions>,
    /// Size report, only when the logger prints info lines.
    pub report: Option<ReportOptions>,
    /// Whether sibling formats of the same package exist, for labels in engine output.
    pub dual_format: bool,
    /// Files watched besides the module graph: config files, tsconfig, package.json.
    pub watch_files: Vec<PathBuf>,
    pub ignore_watch: Vec<Pattern>,
    pub extra: Option<OpaqueOptions>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputOptions {
    pub format: Format,
    pub dir: PathBuf,
    pub entry_file_names: String,
    pub chunk_file_names: String,
    pub sourcemap: Sourcemap,
    pub minify: Option<Minify>,
    pub global_name: Option<String>,
    pub preserve_modules: bool,
    pub preserve_modules_root: Option<PathBuf>,
    /// `auto` export mode when the CommonJS default export should be unwrapped.
    pub cjs_default: bool,
    pub code_splitting: bool,
    pub extra: Option<OpaqueOptions>,
}

#[derive(Clone)]
pub struct BuildOptions {
    pub input: InputOptions,
    pub output: OutputOptions,
    pub write: bool,
}

impl BuildOptions {
    pub fn is_dts_only(&self) -> bool {
        matches!(self.input.dts, Some(DtsPass::Only(_)))
    }
}

impl std::fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildOptions")
            .field("entry", &self.input.entry)
            .field("format", &self.output.format)
            .field("dir", &self.output.dir)
            .field("dts", &self.input.dts)
            .field("write", &self.write)
            .finish_non_exhaustive()
    }
}

/// Where an id resolved to, as reported by the engine's own resolver chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedId {
    pub id: String,
    pub external: bool,
}

/// The engine's normal resolution chain.
pub trait ModuleResolver: Send + Sync {
    fn resolve(&self, id: &str, importer: &str) -> Option<ResolvedId>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    Start,
    BundleStart,
    BundleEnd { duration: Duration, chunks: Vec<Chunk> },
    Error(String),
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Lifecycle(Lifecycle),
    Change { path: PathBuf, kind: ChangeKind },
}

/// Something that can stop a running watch session.
#[async_trait]
pub trait WatchHandle: Send {
    async fn close(&mut self) -> Result<()>;
}

/// A persistent build session.
pub struct WatchSession {
    pub events: mpsc::Receiver<EngineEvent>,
    pub handle: Box<dyn WatchHandle>,
}

impl WatchSession {
    pub fn new(events: mpsc::Receiver<EngineEvent>, handle: Box<dyn WatchHandle>) -> Self {
        Self { events, handle }
    }
}

/// A bundling engine.
///
/// Engines must consult `input.classifier` for every bare import, and report
/// each bundled module with its importers so bundled dependencies can be
/// checked after the build.
#[async_trait]
pub trait Bundler: Send + Sync {
    /// Compile once and return the emitted chunks.
    async fn build(&self, options: &BuildOptions) -> Result<Vec<Chunk>>;

    /// Start watching. Every option set is rebuilt when its inputs change.
    async fn watch(&self, options: Vec<BuildOptions>) -> Result<WatchSession>;
}

/// Output file name templates for a format and extension.
pub fn chunk_file_names(format: Format, js_extension: &str, hash: bool) -> (String, String) {
    let suffix = match format {
        Format::Iife | Format::Umd => format!(".{format}"),
        Format::Es | Format::Cjs => String::new(),
    };
    let entry = format!("[name]{suffix}.{js_extension}");
    let chunk = if hash {
        format!("[name]{suffix}-[hash].{js_extension}")
    } else {
        entry.clone()
    };
    (entry, chunk)
}

/// Declaration extension matching a JavaScript extension.
pub fn dts_extension(js_extension: &str) -> &'static str {
    match js_extension {
        "mjs" => "d.mts",
        "cjs" => "d.cts",
        _ => "d.ts",
    }
}
