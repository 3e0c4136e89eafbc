//! Command-line interface definition.
//!
//! Every build flag is optional so that only what the user actually typed
//! overrides the config file. See [`crate::config`] for the layering.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser};

/// bento - build TypeScript and JavaScript libraries
#[derive(Parser, Debug)]
#[command(
    name = "bento",
    version,
    about = "Build TypeScript and JavaScript libraries",
    long_about = "bento resolves a declarative build config (one or many formats, one or many\n\
                  packages) into build plans and runs them once or in watch mode."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true, visible_alias = "debug")]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(flatten)]
    pub build: BuildArgs,
}

/// Arguments for a build
#[derive(Args, Debug, Default, Clone)]
pub struct BuildArgs {
    /// Entry files, replacing the configured entry
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// Use a custom config file
    #[arg(short, long, value_name = "FILENAME", conflicts_with = "no_config")]
    pub config: Option<PathBuf>,

    /// Disable config files
    #[arg(long)]
    pub no_config: bool,

    /// Bundle format: esm, cjs, iife, umd
    #[arg(short, long, value_name = "FORMAT", value_delimiter = ',')]
    pub format: Vec<String>,

    /// Output directory
    #[arg(short = 'd', long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Clean the output directory first
    #[arg(long, overrides_with = "no_clean")]
    pub clean: bool,

    /// Keep the output directory
    #[arg(long)]
    pub no_clean: bool,

    /// Mark a dependency as external
    #[arg(long = "deps.never-bundle", value_name = "MODULE")]
    pub never_bundle: Vec<String>,

    /// Minify output
    #[arg(long)]
    pub minify: bool,

    /// Enable devtools integration
    #[arg(long)]
    pub devtools: bool,

    /// Bundle target, e.g. "es2015", "node20"
    #[arg(long, value_name = "TARGET", value_delimiter = ',')]
    pub target: Vec<String>,

    /// Log level: info, warn, error, silent
    #[arg(short = 'l', long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Treat warnings as errors: true, false, ci-only, local-only
    #[arg(long, value_name = "WHEN", num_args = 0..=1, default_missing_value = "true")]
    pub fail_on_warn: Option<String>,

    /// Build in memory without writing files
    #[arg(long)]
    pub no_write: bool,

    /// Disable tree shaking
    #[arg(long)]
    pub no_treeshake: bool,

    /// Generate source maps
    #[arg(long)]
    pub sourcemap: bool,

    /// Enable CommonJS and ESM shims
    #[arg(long)]
    pub shims: bool,

    /// Target platform: node, neutral, browser
    #[arg(long, value_name = "PLATFORM")]
    pub platform: Option<String>,

    /// Generate declaration files
    #[arg(long)]
    pub dts: bool,

    /// Lint the packed package with publint
    #[arg(long)]
    pub publint: bool,

    /// Check the packed package with "Are the types wrong"
    #[arg(long)]
    pub attw: bool,

    /// Check for unused dependencies
    #[arg(long)]
    pub unused: bool,

    /// Watch mode, optionally limited to the given paths
    #[arg(short, long, value_name = "PATH", num_args = 0.., action = ArgAction::Append)]
    pub watch: Option<Vec<String>>,

    /// Ignore a path in watch mode
    #[arg(long, value_name = "PATH")]
    pub ignore_watch: Vec<String>,

    /// Reuse config from Vite, or from Vitest with "vitest"
    #[arg(long, value_name = "VITEST", num_args = 0..=1, default_missing_value = "")]
    pub from_vite: Option<String>,

    /// Disable the size report
    #[arg(long)]
    pub no_report: bool,

    /// Define a compile-time env variable
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Load environment variables from a file; --env takes precedence
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<String>,

    /// Prefix of environment variables injected into the bundle
    #[arg(long, value_name = "PREFIX")]
    pub env_prefix: Vec<String>,

    /// Command to run after each successful build
    #[arg(long, value_name = "COMMAND")]
    pub on_success: Option<String>,

    /// Copy files to the output directory
    #[arg(long, visible_alias = "public-dir", value_name = "DIR")]
    pub copy: Vec<String>,

    /// Path to tsconfig.json
    #[arg(long, value_name = "TSCONFIG")]
    pub tsconfig: Option<String>,

    /// Keep the module structure instead of bundling
    #[arg(long)]
    pub unbundle: bool,

    /// Bundle as a single executable
    #[arg(long)]
    pub exe: bool,

    /// Build every package of a workspace, optionally rooted at DIR
    #[arg(short = 'W', long, value_name = "DIR", num_args = 0..=1, default_missing_value = "")]
    pub workspace: Option<String>,

    /// Only build configs whose name or directory matches, e.g. /pkg-name$/
    #[arg(short = 'F', long, value_name = "PATTERN")]
    pub filter: Vec<String>,

    /// Write export metadata to package.json
    #[arg(long)]
    pub exports: bool,

    /// Working directory
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}
