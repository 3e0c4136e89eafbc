//! Watch-mode coordination for one config.
//!
//! [`WatchCoordinator`] is a plain state machine: it takes engine events and
//! file changes as [`WatchInput`]s and answers with the [`WatchAction`]s the
//! driver has to carry out. Nothing here touches the filesystem or the clock,
//! so every transition can be tested directly.
//!
//! ```text
//! Idle --Start--> Building --BundleEnd--> Built --End--> Idle
//!                    |                                    ^
//!                    +-------------Error/End--------------+
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bundler::{ChangeKind, Chunk, EngineEvent, Lifecycle};

/// Whether the last segment of `path` is a bento config file, `package.json`
/// or `tsconfig.json`. Both separators count, whatever the host platform.
fn ends_with_config(path: &str) -> bool {
    let Some((_, name)) = path.rsplit_once(['/', '\\']) else {
        return false;
    };
    name.starts_with("bento.config") || name == "package.json" || name == "tsconfig.json"
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Building,
    Built,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WatchInput {
    Engine(EngineEvent),
    /// The emitted chunks failed the bundled-dependency check.
    CheckFailed(String),
}

impl From<EngineEvent> for WatchInput {
    fn from(event: EngineEvent) -> Self {
        WatchInput::Engine(event)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WatchAction {
    /// Drop the debounced post-build if it has not started.
    CancelPostBuild,
    /// Abort the running success command.
    AbortSuccess,
    /// Log `message` and restart the whole invocation.
    Restart { message: String },
    /// The entry glob may match a different file set now.
    RecheckEntries,
    /// Remove the chunks of the previous build.
    CleanChunks(Vec<Chunk>),
    /// Log which files changed.
    Rebuilding { files: Vec<PathBuf> },
    /// Check what got bundled from `node_modules`.
    CheckBundle(Vec<Chunk>),
    Rebuilt { duration: Duration },
    Error(String),
    /// Run copy, packaging, hooks and the success command after the debounce delay.
    SchedulePostBuild,
}

#[derive(Debug)]
pub struct WatchCoordinator {
    state: WatchState,
    config_files: Vec<PathBuf>,
    clean: bool,
    glob_entry: bool,
    changed: Vec<PathBuf>,
    chunks: Vec<Chunk>,
    has_error: bool,
}

impl WatchCoordinator {
    /// `clean` removes old chunks before each rebuild; `glob_entry` makes
    /// created and deleted files re-check the entry set.
    pub fn new(config_files: Vec<PathBuf>, clean: bool, glob_entry: bool) -> Self {
        Self {
            state: WatchState::Idle,
            config_files,
            clean,
            glob_entry,
            changed: Vec::new(),
            chunks: Vec::new(),
            has_error: false,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Chunks emitted by the current build cycle.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn has_error(&self) -> bool {
        self.has_error
    }

    pub fn is_config_file(&self, path: &Path) -> bool {
        self.config_files.iter().any(|file| file == path)
            || ends_with_config(&path.to_string_lossy())
    }

    pub fn handle(&mut self, input: impl Into<WatchInput>) -> Vec<WatchAction> {
        match input.into() {
            WatchInput::Engine(EngineEvent::Change { path, kind }) => self.on_change(path, kind),
            WatchInput::Engine(EngineEvent::Lifecycle(event)) => self.on_lifecycle(event),
            WatchInput::CheckFailed(message) => {
                self.has_error = true;
                vec![WatchAction::Error(message)]
            }
        }
    }

    fn on_change(&mut self, path: PathBuf, kind: ChangeKind) -> Vec<WatchAction> {
        let mut actions = Vec::new();
        if kind == ChangeKind::Update {
            // Cancel before the next cycle starts so rapid saves run the
            // success command once.
            actions.push(WatchAction::CancelPostBuild);
            actions.push(WatchAction::AbortSuccess);
        }
        if self.is_config_file(&path) {
            actions.push(WatchAction::Restart {
                message: format!("Reload config: {}, restarting...", path.display()),
            });
        }
        if matches!(kind, ChangeKind::Create | ChangeKind::Delete) && self.glob_entry {
            actions.push(WatchAction::RecheckEntries);
        }
        if kind == ChangeKind::Update {
            self.changed.push(path);
        }
        actions
    }

    fn on_lifecycle(&mut self, event: Lifecycle) -> Vec<WatchAction> {
        match event {
            Lifecycle::Start => {
                self.state = WatchState::Building;
                self.has_error = false;
                let mut actions = vec![WatchAction::CancelPostBuild];
                let previous = std::mem::take(&mut self.chunks);
                if self.clean && !previous.is_empty() {
                    actions.push(WatchAction::CleanChunks(previous));
                }
                actions
            }
            Lifecycle::BundleStart => {
                let files = std::mem::take(&mut self.changed);
                if files.is_empty() {
                    Vec::new()
                } else {
                    vec![WatchAction::Rebuilding { files }]
                }
            }
            Lifecycle::BundleEnd { duration, chunks } => {
                self.state = WatchState::Built;
                self.chunks.extend(chunks.iter().cloned());
                vec![
                    WatchAction::CheckBundle(chunks),
                    WatchAction::Rebuilt { duration },
                ]
            }
            Lifecycle::Error(message) => {
                self.has_error = true;
                vec![WatchAction::Error(message)]
            }
            Lifecycle::End => {
                let built = self.state == WatchState::Built;
                self.state = WatchState::Idle;
                if built && !self.has_error {
                    vec![WatchAction::SchedulePostBuild]
                } else {
                    Vec::new()
                }
            }
        }
    }
}

/// The line logged when a rebuild starts.
pub fn rebuilding_message(files: &[PathBuf]) -> String {
    let files: Vec<String> = files.iter().map(|file| file.display().to_string()).collect();
    format!("Found {} changed, rebuilding...", files.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator() -> WatchCoordinator {
        WatchCoordinator::new(vec![PathBuf::from("/pkg/bento.json")], true, false)
    }

    fn change(path: &str, kind: ChangeKind) -> EngineEvent {
        EngineEvent::Change {
            path: PathBuf::from(path),
            kind,
        }
    }

    fn lifecycle(event: Lifecycle) -> EngineEvent {
        EngineEvent::Lifecycle(event)
    }

    fn bundle_end(files: &[&str]) -> EngineEvent {
        lifecycle(Lifecycle::BundleEnd {
            duration: Duration::from_millis(12),
            chunks: files.iter().map(|file| Chunk::entry(*file, "/pkg/dist")).collect(),
        })
    }

    #[test]
    fn successful_cycle_schedules_post_build() {
        let mut watch = coordinator();
        assert_eq!(watch.handle(lifecycle(Lifecycle::Start)), [WatchAction::CancelPostBuild]);
        assert_eq!(watch.state(), WatchState::Building);
        assert!(watch.handle(lifecycle(Lifecycle::BundleStart)).is_empty());

        let actions = watch.handle(bundle_end(&["index.mjs"]));
        assert!(matches!(actions[0], WatchAction::CheckBundle(ref chunks) if chunks.len() == 1));
        assert_eq!(actions[1], WatchAction::Rebuilt { duration: Duration::from_millis(12) });
        assert_eq!(watch.state(), WatchState::Built);

        assert_eq!(watch.handle(lifecycle(Lifecycle::End)), [WatchAction::SchedulePostBuild]);
        assert_eq!(watch.state(), WatchState::Idle);
    }

    #[test]
    fn errors_suppress_post_build_until_next_start() {
        let mut watch = coordinator();
        watch.handle(lifecycle(Lifecycle::Start));
        assert_eq!(
            watch.handle(lifecycle(Lifecycle::Error("boom".into()))),
            [WatchAction::Error("boom".into())]
        );
        assert!(watch.handle(lifecycle(Lifecycle::End)).is_empty());

        watch.handle(lifecycle(Lifecycle::Start));
        assert!(!watch.has_error());
        watch.handle(bundle_end(&["index.mjs"]));
        assert_eq!(watch.handle(lifecycle(Lifecycle::End)), [WatchAction::SchedulePostBuild]);
    }

    #[test]
    fn failed_bundle_check_counts_as_error() {
        let mut watch = coordinator();
        watch.handle(lifecycle(Lifecycle::Start));
        watch.handle(bundle_end(&["index.mjs"]));
        watch.handle(WatchInput::CheckFailed("lodash is bundled".into()));
        assert!(watch.handle(lifecycle(Lifecycle::End)).is_empty());
    }

    #[test]
    fn updates_cancel_pending_work_and_are_reported() {
        let mut watch = coordinator();
        assert_eq!(
            watch.handle(change("/pkg/src/a.ts", ChangeKind::Update)),
            [WatchAction::CancelPostBuild, WatchAction::AbortSuccess]
        );
        watch.handle(change("/pkg/src/b.ts", ChangeKind::Update));
        watch.handle(lifecycle(Lifecycle::Start));

        let actions = watch.handle(lifecycle(Lifecycle::BundleStart));
        let [WatchAction::Rebuilding { files }] = actions.as_slice() else {
            panic!("expected a rebuilding action, got {actions:?}");
        };
        assert_eq!(
            rebuilding_message(files),
            "Found /pkg/src/a.ts, /pkg/src/b.ts changed, rebuilding..."
        );
        assert!(watch.handle(lifecycle(Lifecycle::BundleStart)).is_empty());
    }

    #[test]
    fn previous_chunks_are_cleaned_on_restart_of_cycle() {
        let mut watch = coordinator();
        watch.handle(lifecycle(Lifecycle::Start));
        watch.handle(bundle_end(&["index.mjs", "index.d.mts"]));
        watch.handle(lifecycle(Lifecycle::End));

        let actions = watch.handle(lifecycle(Lifecycle::Start));
        assert!(matches!(actions[1], WatchAction::CleanChunks(ref chunks) if chunks.len() == 2));
        assert!(watch.chunks().is_empty());
    }

    #[test]
    fn config_changes_restart() {
        let mut watch = coordinator();
        for path in [
            "/pkg/bento.json",
            "/pkg/bento.config.ts",
            "/pkg/package.json",
            r"C:\pkg\tsconfig.json",
        ] {
            let actions = watch.handle(change(path, ChangeKind::Update));
            assert!(
                actions.iter().any(|action| matches!(action, WatchAction::Restart { .. })),
                "{path} should restart"
            );
        }
        let actions = watch.handle(change("/pkg/src/package.json.ts", ChangeKind::Update));
        assert!(!actions.iter().any(|action| matches!(action, WatchAction::Restart { .. })));
    }

    #[test]
    fn created_files_recheck_glob_entries() {
        let mut watch = WatchCoordinator::new(Vec::new(), false, true);
        assert_eq!(
            watch.handle(change("/pkg/src/new.ts", ChangeKind::Create)),
            [WatchAction::RecheckEntries]
        );
        let mut watch = WatchCoordinator::new(Vec::new(), false, false);
        assert!(watch.handle(change("/pkg/src/new.ts", ChangeKind::Delete)).is_empty());
    }
}
