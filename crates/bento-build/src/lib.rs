//! Build orchestration for bento.
//!
//! [`Orchestrator`] takes the [`ResolvedConfig`]s produced by `bento-config`
//! and drives a [`Bundler`] for each of them:
//!
//! 1. `build:prepare` hooks, then one shared clean of every output directory.
//! 2. One set of engine options per config, plus a declaration-only pass for
//!    CommonJS with declarations. `build:before` hooks may edit each set.
//! 3. A one-shot build, or a watch session whose events go through a
//!    [`WatchCoordinator`].
//! 4. Post-build: copy, executable packaging, the package-level steps once
//!    per package (exports, pack, publint, attw), `build:done` hooks and the
//!    `onSuccess` command.
//!
//! The engine is a trait object. [`PassthroughBundler`] is the built-in one.
//!
//! [`ResolvedConfig`]: bento_config::ResolvedConfig

pub mod bundler;
pub mod cjs;
pub mod clean;
pub mod collaborators;
pub mod copy;
pub mod debounce;
pub mod deps;
pub mod error;
pub mod exports;
pub mod group;
pub mod hooks;
pub mod options;
pub mod orchestrator;
pub mod passthrough;
pub mod pkg;
pub mod success;
pub mod watch;

pub use bundler::{
    BuildOptions, Bundler, ChangeKind, Chunk, ChunkKind, ChunkModule, DtsPass, EngineEvent,
    InputOptions, Lifecycle, OutputOptions, WatchHandle, WatchSession,
};
pub use collaborators::{
    DevtoolsLauncher, Diagnostic, ExecutablePackager, LintTool, PackageLinter, Packer, Severity,
};
pub use deps::{Decision, DependencyClassifier};
pub use error::{BuildError, Result};
pub use exports::{GeneratedExports, generate_exports, write_package_json};
pub use hooks::{BeforeContext, DoneContext, HookSetup, Hooks, PrepareContext};
pub use options::{build_option_sets, build_options};
pub use orchestrator::{Bundle, BuildSession, Orchestrator, SessionController, SessionEvent};
pub use passthrough::PassthroughBundler;
pub use success::{AbortSignal, SuccessAbort, SuccessCallback};
pub use watch::{WatchAction, WatchCoordinator, WatchInput, WatchState};
