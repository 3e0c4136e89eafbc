//! Builders for tests in this crate and downstream crates.
//!
//! Compiled for this crate's tests and behind the `test-utils` feature.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::context::RunContext;
use crate::deps::ResolvedDepsConfig;
use crate::entry::EntryMap;
use crate::env::EnvMap;
use crate::logger::{LogLevel, Logger};
use crate::resolved::{Format, ResolvedConfig, RunOnceOptions};
use crate::types::{ChecksOptions, NodeProtocol, Platform, Sourcemap};

/// A minimal ESM plan rooted at `cwd` writing to `cwd/dist`, logging nothing.
pub fn plan(cwd: &Path) -> ResolvedConfig {
    plan_with_context(Arc::new(RunContext::new(cwd).with_color(false)), cwd)
}

pub fn plan_with_context(ctx: Arc<RunContext>, cwd: &Path) -> ResolvedConfig {
    ResolvedConfig {
        name: None,
        cwd: cwd.to_path_buf(),
        pkg: None,
        logger: Logger::new(ctx, LogLevel::Silent, false),
        format: Format::Es,
        fanout_index: 0,
        run_once: Arc::new(RunOnceOptions::default()),
        entry: EntryMap::new(),
        raw_entry: None,
        platform: Platform::Node,
        target: None,
        tsconfig: None,
        alias: IndexMap::new(),
        define: IndexMap::new(),
        env: EnvMap::new(),
        deps: ResolvedDepsConfig::default(),
        node_protocol: NodeProtocol::default(),
        checks: ChecksOptions::default(),
        plugins: Vec::new(),
        shims: false,
        treeshake: true,
        input_options: None,
        out_dir: cwd.join("dist"),
        clean: Vec::new(),
        sourcemap: Sourcemap::Flag(false),
        minify: None,
        global_name: None,
        unbundle: false,
        fixed_extension: true,
        hash: true,
        cjs_default: true,
        glob_import: true,
        write: true,
        output_options: None,
        dts: None,
        unused: None,
        report: None,
        exports: None,
        publint: None,
        attw: None,
        exe: None,
        devtools: None,
        watch: false,
        watch_paths: Vec::new(),
        ignore_watch: Vec::new(),
    }
}

/// Replace the run-once options shared by a fan-out.
pub fn with_run_once(mut config: ResolvedConfig, options: RunOnceOptions) -> ResolvedConfig {
    config.run_once = Arc::new(options);
    config
}
