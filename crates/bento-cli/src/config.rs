//! Inline config from flags and environment.
//!
//! Priority: command-line flags > `BENTO_*` environment variables. Both land
//! in an [`InlineConfig`], which `bento-config` then layers over the config
//! file.

use bento_config::InlineConfig;
use figment::Figment;
use figment::providers::{Env, Serialized};
use figment::value::Uncased;
use serde_json::{Map, Value, json};

use crate::cli::BuildArgs;
use crate::error::{CliError, Result};

/// Environment variable prefix for inline options, as in `BENTO_OUT_DIR=lib`.
pub const ENV_PREFIX: &str = "BENTO_";

/// Options that may come from the environment, in `snake_case` after the prefix.
const ENV_OPTIONS: &[&str] = &[
    "attw", "clean", "cwd", "dts", "env_file", "exports", "fail_on_warn", "format",
    "log_level", "minify", "name", "on_success", "out_dir", "platform", "publint", "report",
    "shims", "sourcemap", "target", "tsconfig", "unbundle",
];

/// Build the inline config for `args`, reading `BENTO_*` from the process
/// environment.
pub fn inline_config(args: &BuildArgs) -> Result<InlineConfig> {
    layer(args, env_provider())
}

fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX)
        .only(ENV_OPTIONS)
        .map(|key| Uncased::from_owned(camel_case(key.as_str())))
}

fn layer(args: &BuildArgs, env: Env) -> Result<InlineConfig> {
    let flags = Value::Object(flag_values(args));
    tracing::debug!("command line options {flags}");

    Figment::new()
        .merge(env)
        .merge(Serialized::defaults(flags))
        .extract()
        .map_err(|e| CliError::InvalidArgument(e.to_string()))
}

/// Only flags the user gave, keyed like the config file.
fn flag_values(args: &BuildArgs) -> Map<String, Value> {
    let mut flags = Map::new();
    let mut set = |key: &str, value: Value| {
        flags.insert(key.to_string(), value);
    };

    if !args.files.is_empty() {
        set("entry", json!(args.files));
    }
    if let Some(config) = &args.config {
        set("config", json!(config));
    } else if args.no_config {
        set("config", json!(false));
    }
    match args.format.as_slice() {
        [] => {}
        [format] => set("format", json!(format)),
        formats => set("format", json!(formats)),
    }
    if let Some(out_dir) = &args.out_dir {
        set("outDir", json!(out_dir));
    }
    if args.clean {
        set("clean", json!(true));
    } else if args.no_clean {
        set("clean", json!(false));
    }
    if !args.never_bundle.is_empty() {
        set("deps", json!({ "neverBundle": args.never_bundle }));
    }
    if !args.target.is_empty() {
        set("target", json!(args.target));
    }
    if let Some(level) = &args.log_level {
        set("logLevel", json!(level));
    }
    if let Some(when) = &args.fail_on_warn {
        let value = match when.as_str() {
            "true" => json!(true),
            "false" => json!(false),
            other => json!(other),
        };
        set("failOnWarn", value);
    }
    if args.no_write {
        set("write", json!(false));
    }
    if args.no_treeshake {
        set("treeshake", json!(false));
    }
    if let Some(platform) = &args.platform {
        set("platform", json!(platform));
    }
    if let Some(paths) = &args.watch {
        if paths.is_empty() {
            set("watch", json!(true));
        } else {
            set("watch", json!(paths));
        }
    }
    if !args.ignore_watch.is_empty() {
        set("ignoreWatch", json!(args.ignore_watch));
    }
    if let Some(prefix) = &args.from_vite {
        let value = if prefix.is_empty() { json!(true) } else { json!(prefix) };
        set("fromTool", value);
    }
    if args.no_report {
        set("report", json!(false));
    }
    if !args.env.is_empty() {
        let env: Map<String, Value> = args
            .env
            .iter()
            .map(|(key, value)| (key.clone(), json!(value)))
            .collect();
        set("env", Value::Object(env));
    }
    if let Some(file) = &args.env_file {
        set("envFile", json!(file));
    }
    if !args.env_prefix.is_empty() {
        set("envPrefix", json!(args.env_prefix));
    }
    if let Some(command) = &args.on_success {
        set("onSuccess", json!(command));
    }
    if !args.copy.is_empty() {
        set("copy", json!(args.copy));
    }
    if let Some(tsconfig) = &args.tsconfig {
        set("tsconfig", json!(tsconfig));
    }
    if let Some(dir) = &args.workspace {
        let value = if dir.is_empty() { json!(true) } else { json!(dir) };
        set("workspace", value);
    }
    match args.filter.as_slice() {
        [] => {}
        [filter] => set("filter", json!(filter)),
        filters => set("filter", json!(filters)),
    }
    if let Some(cwd) = &args.cwd {
        set("cwd", json!(cwd));
    }

    for (key, enabled) in [
        ("minify", args.minify),
        ("devtools", args.devtools),
        ("sourcemap", args.sourcemap),
        ("shims", args.shims),
        ("dts", args.dts),
        ("publint", args.publint),
        ("attw", args.attw),
        ("unused", args.unused),
        ("unbundle", args.unbundle),
        ("exe", args.exe),
        ("exports", args.exports),
    ] {
        if enabled {
            set(key, json!(true));
        }
    }

    flags
}

/// `out_dir` to `outDir`.
fn camel_case(key: &str) -> String {
    let mut camel = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            camel.extend(c.to_uppercase());
            upper = false;
        } else {
            camel.push(c);
        }
    }
    camel
}
