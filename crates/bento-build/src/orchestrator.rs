//! Running every resolved config of an invocation.
//!
//! Each config builds in its own task. Configs of one package meet at their
//! [`PackageBuildGroup`] before the package-level steps. In watch mode every
//! task keeps a driver that feeds engine events through a
//! [`WatchCoordinator`] until the session is disposed.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use bento_config::{
    ConfigExport, InlineConfig, Logger, ResolvedConfig, RunContext, is_glob_entry,
    resolve_config, to_object_entry,
};
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::bundler::{Bundler, Chunk, WatchSession};
use crate::cjs::warn_legacy_cjs;
use crate::clean::{CleanOnce, clean_chunks};
use crate::collaborators::{DevtoolsLauncher, ExecutablePackager, PackageLinter, Packer};
use crate::copy::copy;
use crate::debounce::Debouncer;
use crate::deps::DependencyClassifier;
use crate::error::{BuildError, Result};
use crate::group::{BuildGroups, BuildSnapshot, PackageBuildGroup};
use crate::hooks::{BeforeContext, DoneContext, HookSetup, Hooks, PrepareContext};
use crate::options::build_option_sets;
use crate::pkg::{PackageTools, bundle_done};
use crate::success::{SuccessAbort, SuccessCallback, run_on_success};
use crate::watch::{WatchAction, WatchCoordinator, WatchInput, rebuilding_message};

/// Drives the bundling engine for resolved configs.
#[derive(Clone)]
pub struct Orchestrator {
    bundler: Arc<dyn Bundler>,
    hook_setup: Option<HookSetup>,
    on_success: Option<SuccessCallback>,
    package_tools: PackageTools,
    exe_packager: Option<Arc<dyn ExecutablePackager>>,
    devtools: Option<Arc<dyn DevtoolsLauncher>>,
}

impl Orchestrator {
    pub fn new(bundler: Arc<dyn Bundler>) -> Self {
        Self {
            bundler,
            hook_setup: None,
            on_success: None,
            package_tools: PackageTools::default(),
            exe_packager: None,
            devtools: None,
        }
    }

    /// Register hook handlers for every config.
    pub fn with_hooks(mut self, setup: HookSetup) -> Self {
        self.hook_setup = Some(setup);
        self
    }

    /// Run `callback` after each successful build of configs without an
    /// `onSuccess` command.
    pub fn with_on_success(mut self, callback: SuccessCallback) -> Self {
        self.on_success = Some(callback);
        self
    }

    pub fn with_packer(mut self, packer: Arc<dyn Packer>) -> Self {
        self.package_tools.packer = Some(packer);
        self
    }

    pub fn with_linter(mut self, linter: Arc<dyn PackageLinter>) -> Self {
        self.package_tools.linters.push(linter);
        self
    }

    pub fn with_exe_packager(mut self, packager: Arc<dyn ExecutablePackager>) -> Self {
        self.exe_packager = Some(packager);
        self
    }

    pub fn with_devtools(mut self, launcher: Arc<dyn DevtoolsLauncher>) -> Self {
        self.devtools = Some(launcher);
        self
    }

    /// Resolve `inline` and build everything it describes.
    pub async fn build(
        &self,
        inline: &InlineConfig,
        ctx: &Arc<RunContext>,
        export: Option<ConfigExport>,
    ) -> Result<BuildSession> {
        let resolution = resolve_config(inline, ctx, export)?;
        self.build_with_configs(resolution.configs, resolution.files).await
    }

    /// Build already resolved configs.
    ///
    /// A failing config is logged and does not stop its siblings. The run
    /// context records the failure.
    pub async fn build_with_configs(
        &self,
        configs: Vec<ResolvedConfig>,
        config_files: Vec<PathBuf>,
    ) -> Result<BuildSession> {
        let (control, events) = mpsc::unbounded_channel();
        let controller = SessionController {
            sender: control,
            restarting: Arc::new(AtomicBool::new(false)),
        };

        let configs = Arc::new(configs);
        let shared = Arc::new(Shared {
            orchestrator: self.clone(),
            config_files,
            clean: CleanOnce::new(configs.clone()),
            groups: BuildGroups::new(&configs),
            controller: controller.clone(),
        });

        if let Some(first) = configs.first() {
            unlabeled(&first.logger).info("Build start");
        }

        let tasks: Vec<(ResolvedConfig, JoinHandle<Result<Bundle>>)> = configs
            .iter()
            .map(|config| {
                let task = tokio::spawn(build_single(shared.clone(), config.clone()));
                (config.clone(), task)
            })
            .collect();

        let mut bundles = Vec::with_capacity(tasks.len());
        for (config, task) in tasks {
            let result = task
                .await
                .unwrap_or_else(|e| Err(BuildError::Task(e.to_string())));
            match result {
                Ok(bundle) => bundles.push(bundle),
                Err(e) => {
                    config.logger.error(&e);
                    tracing::debug!("Build of {} failed: {e:?}", config.name_or_cwd());
                }
            }
        }

        let watching = configs.iter().any(ResolvedConfig::is_watch);
        if !watching {
            let devtools_config = configs
                .iter()
                .find(|config| config.devtools.as_ref().is_some_and(|d| d.ui == Some(true)));
            if let (Some(config), Some(launcher)) = (devtools_config, &self.devtools) {
                if let Err(e) = launcher.launch(config).await {
                    config.logger.error(format!("Failed to start devtools: {e}"));
                }
            }
        }

        Ok(BuildSession {
            bundles,
            watching,
            controller,
            events,
        })
    }
}

/// Invocation-wide state shared by every config task.
struct Shared {
    orchestrator: Orchestrator,
    config_files: Vec<PathBuf>,
    clean: CleanOnce,
    groups: BuildGroups,
    controller: SessionController,
}

/// What a session is asked to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Dispose everything, resolve the configs again and rebuild.
    Restart,
    Quit,
}

/// Sends restart and quit requests to a [`BuildSession`].
#[derive(Debug, Clone)]
pub struct SessionController {
    sender: mpsc::UnboundedSender<SessionEvent>,
    restarting: Arc<AtomicBool>,
}

impl SessionController {
    /// Request a restart. Only the first request of a session counts.
    pub fn restart(&self) {
        if !self.restarting.swap(true, Ordering::SeqCst) {
            let _ = self.sender.send(SessionEvent::Restart);
        }
    }

    pub fn quit(&self) {
        let _ = self.sender.send(SessionEvent::Quit);
    }
}

/// Everything one invocation built.
pub struct BuildSession {
    bundles: Vec<Bundle>,
    watching: bool,
    controller: SessionController,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl BuildSession {
    pub fn bundles(&self) -> &[Bundle] {
        &self.bundles
    }

    /// Whether any config is still watching for changes.
    pub fn is_watching(&self) -> bool {
        self.watching
    }

    pub fn controller(&self) -> SessionController {
        self.controller.clone()
    }

    /// Wait for the next restart or quit request.
    pub async fn next_event(&mut self) -> SessionEvent {
        self.events.recv().await.unwrap_or(SessionEvent::Quit)
    }

    /// Stop every watcher, pending post-build and success command.
    pub async fn dispose(self) {
        for bundle in self.bundles {
            bundle.dispose().await;
        }
    }
}

/// One config's build.
pub struct Bundle {
    post: Arc<PostBuild>,
    watch: Option<WatchTask>,
}

impl Bundle {
    pub fn config(&self) -> &ResolvedConfig {
        &self.post.config
    }

    /// Chunks of the most recent build.
    pub fn chunks(&self) -> Vec<Chunk> {
        self.post.chunks.lock().clone()
    }

    pub async fn dispose(self) {
        self.post.debouncer.cancel();
        self.post.success.abort();
        if let Some(watch) = self.watch {
            let _ = watch.stop.send(());
            if let Err(e) = watch.task.await {
                tracing::debug!("Watch driver ended abnormally: {e}");
            }
        }
    }
}

struct WatchTask {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// A logger for invocation-wide lines, without the config's name label.
fn unlabeled(logger: &Logger) -> Logger {
    Logger::new(logger.context().clone(), logger.level(), logger.fail_on_warn())
}

async fn build_single(shared: Arc<Shared>, config: ResolvedConfig) -> Result<Bundle> {
    let group = shared.groups.get(&config);
    let result = build_config(shared, config).await;
    if result.is_err() {
        if let Some(group) = group {
            group.abandon();
        }
    }
    result
}

async fn build_config(shared: Arc<Shared>, config: ResolvedConfig) -> Result<Bundle> {
    let orchestrator = &shared.orchestrator;
    let hooks = Hooks::new(&config, orchestrator.hook_setup.as_ref());

    warn_legacy_cjs(&config);

    let started = Instant::now();
    hooks
        .prepare(&mut PrepareContext {
            config: config.clone(),
        })
        .await?;

    shared.clean.run().await?;

    let dual_format = shared.groups.is_dual_format(&config);
    let mut option_sets = build_option_sets(&config, &shared.config_files, dual_format)?;
    for options in &mut option_sets {
        let mut ctx = BeforeContext {
            config: config.clone(),
            build_options: options.clone(),
        };
        hooks.before(&mut ctx).await?;
        *options = ctx.build_options;
    }

    let post = Arc::new(PostBuild {
        group: shared.groups.get(&config),
        classifier: DependencyClassifier::is_needed(&config)
            .then(|| DependencyClassifier::new(&config)),
        config,
        hooks,
        shared: shared.clone(),
        chunks: Mutex::new(Vec::new()),
        has_built: AtomicBool::new(false),
        success: SuccessAbort::new(),
        debouncer: Debouncer::default(),
    });

    if post.config.watch {
        let session = orchestrator.bundler.watch(option_sets).await?;
        let (stop, stopped) = oneshot::channel();
        let task = tokio::spawn(drive_watch(session, post.clone(), stopped));
        return Ok(Bundle {
            post,
            watch: Some(WatchTask { stop, task }),
        });
    }

    let mut chunks = Vec::new();
    for options in &option_sets {
        chunks.extend(orchestrator.bundler.build(options).await?);
    }
    if let Some(classifier) = &post.classifier {
        classifier.check_bundle(&chunks)?;
    }
    *post.chunks.lock() = chunks;

    let elapsed = format!("{}ms", started.elapsed().as_millis());
    let elapsed = if post.config.logger.context().color_enabled() {
        elapsed.green().to_string()
    } else {
        elapsed
    };
    post.config.logger.success(format!("Build complete in {elapsed}"));

    post.run().await?;
    Ok(Bundle { post, watch: None })
}

/// Steps after a successful build of one config.
struct PostBuild {
    config: ResolvedConfig,
    hooks: Hooks,
    shared: Arc<Shared>,
    group: Option<Arc<PackageBuildGroup>>,
    classifier: Option<DependencyClassifier>,
    chunks: Mutex<Vec<Chunk>>,
    has_built: AtomicBool,
    success: SuccessAbort,
    debouncer: Debouncer,
}

impl PostBuild {
    async fn run(&self) -> Result<()> {
        let orchestrator = &self.shared.orchestrator;
        let chunks = self.chunks.lock().clone();

        copy(&self.config).await?;

        if self.config.exe.is_some() {
            match &orchestrator.exe_packager {
                Some(packager) => {
                    let path = packager
                        .package(&self.config, &chunks)
                        .await
                        .map_err(|e| BuildError::PostBuild(format!("Failed to build executable: {e}")))?;
                    self.config.logger.success(format!("Built executable {}", path.display()));
                }
                None => tracing::debug!("No executable packager installed"),
            }
        }

        if !self.has_built.load(Ordering::SeqCst) {
            if let Some(group) = &self.group {
                let snapshot = BuildSnapshot {
                    config: self.config.clone(),
                    chunks: chunks.clone(),
                };
                bundle_done(group, snapshot, &orchestrator.package_tools).await?;
            }
        }

        let mut ctx = DoneContext {
            config: self.config.clone(),
            chunks,
        };
        self.hooks.done(&mut ctx).await?;
        self.has_built.store(true, Ordering::SeqCst);

        self.success.abort();
        run_on_success(&self.config, orchestrator.on_success.as_ref(), &self.success).await
    }
}

/// Apply engine events to one config's watch state until stopped.
async fn drive_watch(mut session: WatchSession, post: Arc<PostBuild>, mut stopped: oneshot::Receiver<()>) {
    let config = &post.config;
    let mut coordinator = WatchCoordinator::new(
        post.shared.config_files.clone(),
        !config.clean.is_empty(),
        is_glob_entry(config.raw_entry.as_ref()),
    );

    loop {
        let event = tokio::select! {
            event = session.events.recv() => match event {
                Some(event) => event,
                None => break,
            },
            _ = &mut stopped => break,
        };

        let mut actions = std::collections::VecDeque::from(coordinator.handle(event));
        while let Some(action) = actions.pop_front() {
            match action {
                WatchAction::CancelPostBuild => post.debouncer.cancel(),
                WatchAction::AbortSuccess => post.success.abort(),
                WatchAction::Restart { message } => {
                    unlabeled(&config.logger).info(message);
                    post.shared.controller.restart();
                }
                WatchAction::RecheckEntries => {
                    if entries_changed(config) {
                        unlabeled(&config.logger).info("Entry files changed, restarting...");
                        post.shared.controller.restart();
                    }
                }
                WatchAction::CleanChunks(chunks) => {
                    if let Err(e) = clean_chunks(&chunks).await {
                        config.logger.error(e);
                    }
                }
                WatchAction::Rebuilding { files } => config.logger.info(rebuilding_message(&files)),
                WatchAction::CheckBundle(chunks) => {
                    let checked = post
                        .classifier
                        .as_ref()
                        .map_or(Ok(()), |classifier| classifier.check_bundle(&chunks));
                    if let Err(e) = checked {
                        actions.retain(|action| !matches!(action, WatchAction::Rebuilt { .. }));
                        for action in coordinator.handle(WatchInput::CheckFailed(e.to_string())).into_iter().rev() {
                            actions.push_front(action);
                        }
                    }
                }
                WatchAction::Rebuilt { duration } => {
                    config
                        .logger
                        .success(format!("Rebuilt in {}ms.", duration.as_millis()));
                }
                WatchAction::Error(message) => config.logger.error(message),
                WatchAction::SchedulePostBuild => {
                    *post.chunks.lock() = coordinator.chunks().to_vec();
                    let task = post.clone();
                    post.debouncer.schedule(async move {
                        if let Err(e) = task.run().await {
                            task.config.logger.error(e);
                        }
                    });
                }
            }
        }
    }

    post.debouncer.cancel();
    post.success.abort();
    if let Err(e) = session.handle.close().await {
        config.logger.error(e);
    }
}

/// Whether the entry glob now matches a different set of names.
fn entries_changed(config: &ResolvedConfig) -> bool {
    let Some(raw) = &config.raw_entry else {
        return false;
    };
    match to_object_entry(raw, &config.cwd) {
        Ok(entry) => {
            let mut current: Vec<&String> = config.entry.keys().collect();
            let mut next: Vec<&String> = entry.keys().collect();
            current.sort();
            next.sort();
            current != next
        }
        Err(e) => {
            tracing::debug!("Failed to re-resolve entries: {e}");
            false
        }
    }
}
