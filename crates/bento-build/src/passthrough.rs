//! A bundling engine that copies each entry to its output name.
//!
//! It resolves no imports and transforms nothing. The CLI uses it when no
//! real engine is linked in, and the tests use it to exercise the full
//! orchestration against a real filesystem.

use std::hash::Hasher;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bento_config::pattern::matches_any;
use bento_config::Pattern;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHasher;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bundler::{
    BuildOptions, Bundler, ChangeKind, Chunk, ChunkModule, DtsPass, EngineEvent, Lifecycle,
    WatchHandle, WatchSession, dts_extension,
};
use crate::error::{BuildError, Result};

/// Changes arriving within this window after the first one share a rebuild.
const SETTLE: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughBundler;

impl PassthroughBundler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Bundler for PassthroughBundler {
    async fn build(&self, options: &BuildOptions) -> Result<Vec<Chunk>> {
        let options = options.clone();
        tokio::task::spawn_blocking(move || emit(&options))
            .await
            .map_err(|e| BuildError::Task(e.to_string()))?
    }

    async fn watch(&self, options: Vec<BuildOptions>) -> Result<WatchSession> {
        let Some(first) = options.first() else {
            return Err(BuildError::engine("nothing to watch"));
        };
        let filter = WatchFilter {
            root: first.input.cwd.clone(),
            out_dirs: options.iter().map(|o| o.output.dir.clone()).collect(),
            ignore: first.input.ignore_watch.clone(),
        };

        let (changes_tx, changes) = mpsc::channel(100);
        let mut watcher = notify::recommended_watcher({
            let filter = filter.clone();
            move |res: notify::Result<Event>| {
                let Ok(event) = res else {
                    return;
                };
                let kind = match event.kind {
                    EventKind::Create(_) => ChangeKind::Create,
                    EventKind::Modify(_) => ChangeKind::Update,
                    EventKind::Remove(_) => ChangeKind::Delete,
                    _ => return,
                };
                for path in event.paths {
                    if !filter.should_ignore(&path) {
                        let _ = changes_tx.blocking_send(EngineEvent::Change { path, kind });
                    }
                }
            }
        })?;

        watcher.watch(&filter.root, RecursiveMode::Recursive)?;
        for file in &first.input.watch_files {
            if !file.starts_with(&filter.root) && file.exists() {
                watcher.watch(file, RecursiveMode::NonRecursive)?;
            }
        }

        let (events_tx, events) = mpsc::channel(100);
        let task = tokio::spawn(rebuild_loop(options, changes, events_tx));
        Ok(WatchSession::new(
            events,
            Box::new(PassthroughWatch {
                watcher: Some(watcher),
                task,
            }),
        ))
    }
}

struct PassthroughWatch {
    watcher: Option<RecommendedWatcher>,
    task: JoinHandle<()>,
}

#[async_trait]
impl WatchHandle for PassthroughWatch {
    async fn close(&mut self) -> Result<()> {
        self.watcher.take();
        self.task.abort();
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct WatchFilter {
    root: PathBuf,
    out_dirs: Vec<PathBuf>,
    ignore: Vec<Pattern>,
}

impl WatchFilter {
    fn should_ignore(&self, path: &Path) -> bool {
        if self.out_dirs.iter().any(|dir| path.starts_with(dir)) {
            return true;
        }
        if let Ok(rel) = path.strip_prefix(&self.root) {
            let hidden_or_deps = rel.components().any(|component| {
                let name = component.as_os_str().to_string_lossy();
                name == "node_modules" || (name.starts_with('.') && name != "." && name != "..")
            });
            if hidden_or_deps {
                return true;
            }
        }
        matches_any(&self.ignore, &path.to_string_lossy().replace('\\', "/"))
    }
}

async fn rebuild_loop(
    options: Vec<BuildOptions>,
    mut changes: mpsc::Receiver<EngineEvent>,
    events: mpsc::Sender<EngineEvent>,
) {
    loop {
        if build_cycle(&options, &events).await.is_err() {
            return;
        }
        let Some(change) = changes.recv().await else {
            return;
        };
        if events.send(change).await.is_err() {
            return;
        }
        tokio::time::sleep(SETTLE).await;
        while let Ok(change) = changes.try_recv() {
            if events.send(change).await.is_err() {
                return;
            }
        }
    }
}

async fn build_cycle(
    options: &[BuildOptions],
    events: &mpsc::Sender<EngineEvent>,
) -> std::result::Result<(), mpsc::error::SendError<EngineEvent>> {
    events.send(EngineEvent::Lifecycle(Lifecycle::Start)).await?;
    for set in options {
        events.send(EngineEvent::Lifecycle(Lifecycle::BundleStart)).await?;
        let started = Instant::now();
        let set = set.clone();
        let result = tokio::task::spawn_blocking(move || emit(&set))
            .await
            .map_err(|e| BuildError::Task(e.to_string()))
            .and_then(|result| result);
        let event = match result {
            Ok(chunks) => Lifecycle::BundleEnd {
                duration: started.elapsed(),
                chunks,
            },
            Err(e) => Lifecycle::Error(e.to_string()),
        };
        events.send(EngineEvent::Lifecycle(event)).await?;
    }
    events.send(EngineEvent::Lifecycle(Lifecycle::End)).await
}

/// Copy every entry to `out_dir`, plus a declaration stub when asked for.
fn emit(options: &BuildOptions) -> Result<Vec<Chunk>> {
    let dir = &options.output.dir;
    let template = &options.output.entry_file_names;
    let js_extension = template.rsplit('.').next().unwrap_or("js");
    let dts_only = options.is_dts_only();

    let mut chunks = Vec::new();
    for (name, source) in &options.input.entry {
        let contents = std::fs::read(source).map_err(|e| BuildError::io(source, e))?;
        let facade = source.to_string_lossy().into_owned();

        if !dts_only {
            let file_name = template
                .replace("[name]", name)
                .replace("[hash]", &content_hash(&contents));
            write(options, dir, &file_name, &contents)?;
            chunks.push(
                Chunk::entry(file_name, dir.clone())
                    .with_facade(facade.clone())
                    .with_modules(vec![ChunkModule {
                        id: facade.clone(),
                        importers: Vec::new(),
                    }]),
            );
        }

        if matches!(options.input.dts, Some(DtsPass::Emit(_) | DtsPass::Only(_))) {
            let file_name = format!("{name}.{}", dts_extension(js_extension));
            write(options, dir, &file_name, b"export {};\n")?;
            chunks.push(Chunk::entry(file_name, dir.clone()).with_facade(facade));
        }
    }
    Ok(chunks)
}

fn write(options: &BuildOptions, dir: &Path, file_name: &str, contents: &[u8]) -> Result<()> {
    if !options.write {
        return Ok(());
    }
    let path = dir.join(file_name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }
    std::fs::write(&path, contents).map_err(|e| BuildError::io(&path, e))
}

fn content_hash(contents: &[u8]) -> String {
    let mut hasher = FxHasher::default();
    hasher.write(contents);
    format!("{:08x}", hasher.finish() as u32)
}
