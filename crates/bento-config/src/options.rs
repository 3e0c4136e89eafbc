//! Option resolution: one expanded user config to one build plan per format.
//!
//! Order matters and follows the documented pipeline: filter, logger,
//! deprecation shims, output directory and clean list, entry, target,
//! tsconfig, feature flags, env, tool config import, watch ignores,
//! dependency policy, devtools, executable checks, and finally the per-format
//! fan-out.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use path_clean::PathClean;
use serde_json::Map;

use crate::context::RunContext;
use crate::deps::resolve_deps;
use crate::entry::resolve_entry;
use crate::env::{DEFAULT_ENV_PREFIX, resolve_env};
use crate::error::{ConfigError, Result};
use crate::feature::{EnabledFlag, WithEnabled, resolve_feature};
use crate::from_tool::load_tool_config;
use crate::glob::relative_slash;
use crate::logger::Logger;
use crate::package::PackageJson;
use crate::pattern::{Pattern, regex_body};
use crate::resolved::{Format, ResolvedConfig, RunOnceOptions};
use crate::target::resolve_target;
use crate::tsconfig::resolve_tsconfig;
use crate::types::{
    CleanOption, DevtoolsOptions, ExeOptions, ExportsOptions, FilterOption, FormatInput, FormatOverride,
    InlineConfig, NodeProtocol, NodeProtocolMode, OneOrMany, Platform, ReportOptions, Sourcemap, UserConfig,
    WatchOption,
};

/// Resolve one expanded logical config.
///
/// Returns an empty list when `inline.filter` excludes the config.
pub fn resolve_user_config(
    config: &UserConfig,
    inline: &InlineConfig,
    ctx: &Arc<RunContext>,
) -> Result<Vec<ResolvedConfig>> {
    let ci = ctx.is_ci();
    let cwd = config.cwd.clone().unwrap_or_else(|| ctx.cwd().to_path_buf());

    let pkg = PackageJson::find(&cwd)?.map(Arc::new);
    let mut name = config.name.clone();
    if config.workspace.as_ref().is_some_and(|w| w.is_truthy()) && name.is_none() {
        name = pkg.as_ref().and_then(|pkg| pkg.name.clone());
    }

    if !filter_config(inline.filter.as_ref(), &cwd, name.as_deref(), ctx.cwd())? {
        tracing::debug!("[filter] skipping config {}", cwd.display());
        return Ok(Vec::new());
    }

    let fail_on_warn = config.fail_on_warn.unwrap_or(EnabledFlag::Bool(false)).resolve(ci);
    let logger = Logger::new(ctx.clone(), config.log_level.unwrap_or_default(), fail_on_warn)
        .with_label(name.as_deref());

    // Deprecated spellings
    if config.bundle.is_some() {
        logger.warn("`bundle` option is deprecated. Use `unbundle` instead.");
    }
    let unbundle = config.unbundle.or(config.bundle.map(|bundle| !bundle)).unwrap_or(false);

    if config.remove_node_protocol == Some(true) {
        if config.node_protocol.is_some() {
            return Err(ConfigError::DeprecatedConflict {
                old: "removeNodeProtocol",
                new: "nodeProtocol",
            });
        }
        logger.warn("`removeNodeProtocol` is deprecated. Use `nodeProtocol: \"strip\"` instead.");
    }
    let node_protocol = config.node_protocol.unwrap_or(if config.remove_node_protocol == Some(true) {
        NodeProtocol::Mode(NodeProtocolMode::Strip)
    } else {
        NodeProtocol::Flag(false)
    });

    let out_dir = cwd.join(config.out_dir.as_deref().unwrap_or(Path::new("dist"))).clean();
    let clean = resolve_clean(config.clean.as_ref(), &out_dir, &cwd)?;

    let entry = resolve_entry(config.entry.as_ref(), &cwd, &logger)?;
    let target = resolve_target(config.target.as_ref(), pkg.as_deref(), &logger);
    let tsconfig = resolve_tsconfig(config.tsconfig.as_ref(), &cwd, &logger);

    // Features
    let publint = resolve_feature(config.publint.as_ref(), ci, Map::new()).map(Arc::new);
    let attw = resolve_feature(config.attw.as_ref(), ci, Map::new()).map(Arc::new);
    let exports = resolve_feature(config.exports.as_ref(), ci, ExportsOptions::default()).map(Arc::new);
    let unused = resolve_feature(config.unused.as_ref(), ci, Map::new());
    let report = resolve_feature(
        Some(config.report.as_ref().unwrap_or(&WithEnabled::Bool(true))),
        ci,
        ReportOptions::default(),
    );
    let exe = resolve_feature(config.exe.as_ref(), ci, ExeOptions::default());

    let dts_default = WithEnabled::Bool(exe.is_none() && pkg.as_deref().is_some_and(PackageJson::declares_types));
    let dts = resolve_feature(Some(config.dts.as_ref().unwrap_or(&dts_default)), ci, Map::new());

    if pkg.is_none() {
        if exports.is_some() {
            return Err(ConfigError::PackageJsonRequired("exports"));
        }
        if publint.is_some() {
            logger.warn("publint is enabled but package.json is not found");
        }
        if attw.is_some() {
            logger.warn("attw is enabled but package.json is not found");
        }
    }

    let copy = match (&config.public_dir, &config.copy) {
        (Some(_), Some(_)) => {
            return Err(ConfigError::DeprecatedConflict {
                old: "publicDir",
                new: "copy",
            });
        }
        (Some(public_dir), None) => {
            logger.warn("`publicDir` is deprecated. Use `copy` instead.");
            Some(public_dir.clone())
        }
        (None, copy) => copy.clone(),
    };

    let env_prefix = config
        .env_prefix
        .as_ref()
        .map(OneOrMany::to_vec)
        .unwrap_or_else(|| vec![DEFAULT_ENV_PREFIX.to_string()]);
    let env = resolve_env(config.env.as_ref(), config.env_file.as_deref(), &env_prefix, &cwd, &logger)?;

    let mut alias = config.alias.clone().unwrap_or_default();
    let mut plugins = config.plugins.clone().unwrap_or_default();
    if let Some(tool) = load_tool_config(config.from_tool.as_ref(), &cwd, &logger)? {
        alias.extend(tool.alias);
        plugins = tool.plugins.into_iter().chain(plugins).collect();
    }

    let ignore_watch = config
        .ignore_watch
        .as_ref()
        .map(OneOrMany::to_vec)
        .unwrap_or_default()
        .iter()
        .map(|ignore| {
            if regex_body(ignore).is_some() {
                Pattern::parse(ignore)
            } else {
                Pattern::parse(&cwd.join(ignore).clean().to_string_lossy())
            }
        })
        .collect::<Result<Vec<_>>>()?;

    let deps = resolve_deps(config, &logger)?;

    let watch = config.is_watch();
    let watch_paths = match &config.watch {
        Some(WatchOption::Paths(paths)) => paths.to_vec().iter().map(|p| cwd.join(p).clean()).collect(),
        _ => Vec::new(),
    };

    let mut devtools = resolve_feature(config.devtools.as_ref(), ci, DevtoolsOptions::default());
    if let Some(devtools) = devtools.as_mut() {
        if watch && devtools.ui == Some(true) {
            logger.warn("Devtools UI is not supported in watch mode, disabling it.");
        }
        if watch || devtools.ui.is_none() {
            devtools.ui = Some(false);
        }
    }

    if exe.is_some() {
        validate_executable(&entry, dts.is_some(), &logger)?;
    }

    let platform = config.platform.unwrap_or_default();
    let base = ResolvedConfig {
        name,
        cwd: cwd.clone(),
        pkg,
        logger,
        format: Format::Es,
        fanout_index: 0,
        run_once: Arc::new(RunOnceOptions {
            copy,
            on_success: config.on_success.clone(),
        }),
        entry,
        raw_entry: config.entry.clone(),
        platform,
        target,
        tsconfig,
        alias,
        define: config.define.clone().unwrap_or_default(),
        env,
        deps,
        node_protocol,
        checks: config.checks.clone().unwrap_or_default(),
        plugins,
        shims: config.shims.unwrap_or(false),
        treeshake: config.treeshake.unwrap_or(true),
        input_options: config.input_options.clone(),
        out_dir,
        clean,
        sourcemap: config.sourcemap.unwrap_or(Sourcemap::Flag(false)),
        minify: config.minify,
        global_name: config.global_name.clone(),
        unbundle,
        fixed_extension: config.fixed_extension.unwrap_or(platform == Platform::Node),
        hash: config.hash.unwrap_or(true),
        cjs_default: config.cjs_default.unwrap_or(true),
        glob_import: config.glob_import.unwrap_or(true),
        write: config.write.unwrap_or(true),
        output_options: config.output_options.clone(),
        dts,
        unused,
        report,
        exports,
        publint,
        attw,
        exe,
        devtools,
        watch,
        watch_paths,
        ignore_watch,
    };

    let default_format = if base.exe.is_some() { Format::Cjs } else { Format::Es };
    let formats = normalize_formats(config.format.as_ref(), default_format)?;

    formats
        .into_iter()
        .enumerate()
        .map(|(index, (format, overrides))| {
            let mut resolved = base.clone();
            resolved.format = format;
            resolved.fanout_index = index;
            if let Some(overrides) = overrides {
                apply_overrides(&mut resolved, &overrides);
            }
            Ok(resolved)
        })
        .collect()
}

/// Expand the `format` option to `(format, overrides)` pairs in order.
///
/// Comma-separated strings are split. Duplicates after alias normalization
/// are kept once.
pub fn normalize_formats(
    format: Option<&FormatInput>,
    default: Format,
) -> Result<Vec<(Format, Option<FormatOverride>)>> {
    let mut formats: Vec<(Format, Option<FormatOverride>)> = Vec::new();
    let mut push = |format: Format, overrides: Option<FormatOverride>| {
        if !formats.iter().any(|(existing, _)| *existing == format) {
            formats.push((format, overrides));
        }
    };

    match format {
        None => push(default, None),
        Some(FormatInput::One(value)) => {
            for part in value.split(',').filter(|p| !p.trim().is_empty()) {
                push(Format::parse(part)?, None);
            }
        }
        Some(FormatInput::Many(values)) => {
            for value in values {
                for part in value.split(',').filter(|p| !p.trim().is_empty()) {
                    push(Format::parse(part)?, None);
                }
            }
        }
        Some(FormatInput::Overrides(map)) => {
            for (key, overrides) in map {
                push(Format::parse(key)?, Some(overrides.clone()));
            }
        }
    }

    if formats.is_empty() {
        formats.push((default, None));
    }
    Ok(formats)
}

fn apply_overrides(config: &mut ResolvedConfig, overrides: &FormatOverride) {
    if let Some(out_dir) = &overrides.out_dir {
        config.out_dir = config.cwd.join(out_dir).clean();
    }
    if let Some(target) = &overrides.target {
        config.target = resolve_target(Some(target), config.pkg.as_deref(), &config.logger);
    }
    if let Some(platform) = overrides.platform {
        config.platform = platform;
    }
    if let Some(minify) = overrides.minify {
        config.minify = Some(minify);
    }
    if let Some(sourcemap) = overrides.sourcemap {
        config.sourcemap = sourcemap;
    }
    if let Some(fixed_extension) = overrides.fixed_extension {
        config.fixed_extension = fixed_extension;
    }
    if let Some(hash) = overrides.hash {
        config.hash = hash;
    }
    if let Some(global_name) = &overrides.global_name {
        config.global_name = Some(global_name.clone());
    }
}

/// `true` cleans the output directory, `false` nothing. Listing the working
/// directory itself is refused.
pub fn resolve_clean(clean: Option<&CleanOption>, out_dir: &Path, cwd: &Path) -> Result<Vec<String>> {
    let clean = match clean {
        None | Some(CleanOption::Flag(true)) => vec![out_dir.to_string_lossy().replace('\\', "/")],
        Some(CleanOption::Flag(false)) => Vec::new(),
        Some(CleanOption::Paths(paths)) => paths.clone(),
    };

    if clean.iter().any(|item| cwd.join(item).clean() == cwd) {
        return Err(ConfigError::CleanCwd);
    }
    Ok(clean)
}

/// Whether the config at `config_cwd` named `name` passes `filter`.
///
/// Plain strings match the name or the cwd relative to the invocation
/// directory (`.` for the root). `/regex/` strings test both.
pub fn filter_config(
    filter: Option<&FilterOption>,
    config_cwd: &Path,
    name: Option<&str>,
    invocation_cwd: &Path,
) -> Result<bool> {
    let Some(filter) = filter else {
        return Ok(true);
    };

    let mut relative = relative_slash(config_cwd, invocation_cwd);
    if relative.is_empty() {
        relative = ".".to_string();
    }

    let values = match filter {
        FilterOption::One(value) => vec![value.clone()],
        FilterOption::Many(values) => values.clone(),
    };

    for value in &values {
        if regex_body(value).is_some() {
            let pattern = Pattern::parse(value)?;
            if name.is_some_and(|name| pattern.matches(name)) || pattern.matches(&relative) {
                return Ok(true);
            }
        } else if name == Some(value.as_str()) || relative == *value {
            return Ok(true);
        }
    }
    Ok(false)
}

fn validate_executable(entry: &IndexMap<String, PathBuf>, dts: bool, logger: &Logger) -> Result<()> {
    if entry.len() > 1 {
        let names: Vec<&str> = entry.keys().map(String::as_str).collect();
        return Err(ConfigError::Executable(format!(
            "The `exe` feature currently only supports single entry points. Found entries: {}",
            names.join(", ")
        )));
    }
    if dts {
        logger.warn(
            "Generating .d.ts files with `exe` option is not recommended since they won't be included in the executable. Consider separating your library and executable targets if you need type declarations.",
        );
    }
    logger.info("`exe` option is experimental and may change in future releases.");
    Ok(())
}
