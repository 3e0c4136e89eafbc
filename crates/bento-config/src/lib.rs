//! Configuration loading and resolution for bento.
//!
//! The pipeline runs in four stages:
//!
//! 1. [`ConfigLoader`] finds and parses `bento.config.*` (or the `bento` field
//!    of `package.json`) into one or more [`UserConfig`]s.
//! 2. [`expand_workspace`] turns a config with `workspace` into one config per
//!    package directory.
//! 3. [`resolve_user_config`] applies defaults and shims and fans a logical
//!    config out into one [`ResolvedConfig`] per output format.
//! 4. [`resolve_config`] ties the stages together for an invocation.
//!
//! Everything takes an explicit [`RunContext`] holding per-invocation caches.

pub mod context;
pub mod deps;
pub mod discovery;
pub mod entry;
pub mod env;
pub mod error;
pub mod feature;
pub mod from_tool;
pub mod glob;
pub mod logger;
pub mod merge;
pub mod options;
pub mod package;
pub mod pattern;
pub mod resolve;
pub mod resolved;
pub mod target;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod tsconfig;
pub mod types;
pub mod workspace;

pub use context::{RunContext, is_ci};
pub use deps::{AllowBundle, ResolvedDepsConfig, resolve_deps};
pub use discovery::{ConfigLoader, LoadedConfigs, read_config_file};
pub use entry::{EntryMap, is_glob_entry, resolve_entry, to_object_entry};
pub use error::{ConfigError, ErrorKind, Result};
pub use feature::{CiOption, Enabled, EnabledFlag, WithEnabled, resolve_feature};
pub use glob::{GlobOptions, glob_paths, static_base};
pub use logger::{LogLevel, Logger};
pub use merge::{merge_config, merge_values};
pub use options::resolve_user_config;
pub use package::PackageJson;
pub use pattern::Pattern;
pub use resolve::{Resolution, resolve_config};
pub use resolved::{Format, ResolvedConfig, RunOnceOptions};
pub use target::{min_version, satisfies};
pub use types::*;
pub use workspace::{ExpandedWorkspace, expand_workspace};
