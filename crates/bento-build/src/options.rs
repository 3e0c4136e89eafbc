//! Engine options for one resolved config.

use std::path::PathBuf;
use std::sync::Arc;

use bento_config::entry::lowest_common_ancestor;
use bento_config::{Format, LogLevel, Platform, ResolvedConfig};
use indexmap::IndexMap;

use crate::bundler::{BuildOptions, DtsPass, InputOptions, OutputOptions, chunk_file_names};
use crate::deps::DependencyClassifier;
use crate::error::Result;

/// Options for the primary pass of `config`, or for its declaration-only
/// CommonJS pass when `cjs_dts` is set.
pub fn build_options(
    config: &ResolvedConfig,
    config_files: &[PathBuf],
    cjs_dts: bool,
    dual_format: bool,
) -> Result<BuildOptions> {
    let input = input_options(config, config_files, cjs_dts, dual_format)?;
    let output = output_options(config, cjs_dts);
    let options = BuildOptions {
        input,
        output,
        write: config.write,
    };
    tracing::debug!(
        "engine options with format {:?}: {options:?}",
        if cjs_dts { "cjs dts" } else { config.format.as_str() }
    );
    Ok(options)
}

/// Every option set the engine builds for `config`: the primary pass, plus a
/// declaration-only pass for CommonJS with declarations.
pub fn build_option_sets(
    config: &ResolvedConfig,
    config_files: &[PathBuf],
    dual_format: bool,
) -> Result<Vec<BuildOptions>> {
    let mut sets = vec![build_options(config, config_files, false, dual_format)?];
    if config.format == Format::Cjs && config.dts_enabled() {
        sets.push(build_options(config, config_files, true, dual_format)?);
    }
    Ok(sets)
}

fn input_options(
    config: &ResolvedConfig,
    config_files: &[PathBuf],
    cjs_dts: bool,
    dual_format: bool,
) -> Result<InputOptions> {
    let dts = config.dts.clone().and_then(|mut dts| {
        if let Some(tsconfig) = &config.tsconfig {
            dts.entry("tsconfig")
                .or_insert_with(|| tsconfig.to_string_lossy().into_owned().into());
        }
        match (config.format, cjs_dts) {
            (_, true) => {
                dts.insert("cjsDefault".into(), config.cjs_default.into());
                Some(DtsPass::Only(dts))
            }
            (Format::Es, false) => Some(DtsPass::Emit(dts)),
            _ => None,
        }
    });

    let mut define: IndexMap<String, String> = config.define.clone();
    for (key, value) in &config.env {
        let value = serde_json::to_string(value)?;
        define.insert(format!("process.env.{key}"), value.clone());
        define.insert(format!("import.meta.env.{key}"), value);
    }

    let platform = if cjs_dts || config.format == Format::Cjs {
        Platform::Node
    } else {
        config.platform
    };

    let classifier = DependencyClassifier::is_needed(config)
        .then(|| Arc::new(DependencyClassifier::new(config)));

    let mut watch_files = Vec::new();
    if config.watch {
        watch_files.extend(config.tsconfig.iter().cloned());
        watch_files.extend(config_files.iter().cloned());
        watch_files.extend(config.watch_paths.iter().cloned());
        watch_files.extend(config.package_json_path().map(PathBuf::from));
    }

    Ok(InputOptions {
        entry: config.entry.clone(),
        cwd: config.cwd.clone(),
        platform,
        target: config.target.clone(),
        tsconfig: config.tsconfig.clone(),
        alias: config.alias.clone(),
        define,
        never_bundle: config.deps.never_bundle.clone(),
        classifier,
        node_protocol: config.node_protocol,
        treeshake: config.treeshake,
        shims: config.shims && !cjs_dts,
        glob_import: config.glob_import && !cjs_dts,
        plugins: if cjs_dts { Vec::new() } else { config.plugins.clone() },
        dts,
        unused: config.unused.clone().filter(|_| !cjs_dts),
        report: config
            .report
            .clone()
            .filter(|_| config.logger.level() >= LogLevel::Info),
        dual_format,
        watch_files,
        ignore_watch: config.ignore_watch.clone(),
        extra: config.input_options.clone(),
    })
}

fn output_options(config: &ResolvedConfig, cjs_dts: bool) -> OutputOptions {
    let (entry_file_names, chunk_file_names) =
        chunk_file_names(config.format, config.js_extension(), config.hash);

    let preserve_modules_root = config.unbundle.then(|| {
        let entries: Vec<PathBuf> = config.entry.values().cloned().collect();
        lowest_common_ancestor(&entries)
    });

    OutputOptions {
        format: if cjs_dts { Format::Es } else { config.format },
        dir: config.out_dir.clone(),
        entry_file_names,
        chunk_file_names,
        sourcemap: config.sourcemap.clone(),
        minify: if cjs_dts { None } else { config.minify.clone() },
        global_name: config.global_name.clone(),
        preserve_modules: config.unbundle,
        preserve_modules_root,
        cjs_default: config.cjs_default,
        code_splitting: config.exe.is_none(),
        extra: config.output_options.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use bento_config::test_utils::plan;
    use serde_json::json;

    use super::*;

    fn config(format: Format) -> ResolvedConfig {
        let mut config = plan(Path::new("/pkg"));
        config.format = format;
        config.dts = Some(Default::default());
        config.plugins = vec![json!("user-plugin")];
        config.minify = Some(bento_config::Minify::Flag(true));
        config
    }

    #[test]
    fn cjs_with_declarations_gets_an_extra_pass() {
        let sets = build_option_sets(&config(Format::Cjs), &[], true).expect("options");
        assert_eq!(sets.len(), 2);

        let (primary, dts) = (&sets[0], &sets[1]);
        assert_eq!(primary.output.format, Format::Cjs);
        assert!(primary.input.dts.is_none());
        assert!(dts.is_dts_only());
        assert_eq!(dts.output.format, Format::Es);
        assert_eq!(dts.output.minify, None);
        assert!(dts.input.plugins.is_empty());
        assert_eq!(dts.input.platform, Platform::Node);
    }

    #[test]
    fn esm_emits_declarations_inline() {
        let sets = build_option_sets(&config(Format::Es), &[], false).expect("options");
        assert_eq!(sets.len(), 1);
        assert!(matches!(sets[0].input.dts, Some(DtsPass::Emit(_))));
        assert_eq!(sets[0].input.plugins, [json!("user-plugin")]);
    }

    #[test]
    fn env_entries_become_defines() {
        let mut config = plan(Path::new("/pkg"));
        config.define.insert("__DEV__".into(), "false".into());
        config.env.insert("API_URL".into(), json!("https://example.com"));

        let options = build_options(&config, &[], false, false).expect("options");
        assert_eq!(options.input.define["__DEV__"], "false");
        assert_eq!(options.input.define["process.env.API_URL"], "\"https://example.com\"");
        assert_eq!(options.input.define["import.meta.env.API_URL"], "\"https://example.com\"");
    }

    #[test]
    fn unbundle_preserves_modules_from_common_root() {
        let mut config = plan(Path::new("/pkg"));
        config.unbundle = true;
        config.entry.insert("a".into(), PathBuf::from("/pkg/src/a.ts"));
        config.entry.insert("b/index".into(), PathBuf::from("/pkg/src/b/index.ts"));

        let options = build_options(&config, &[], false, false).expect("options");
        assert!(options.output.preserve_modules);
        assert_eq!(options.output.preserve_modules_root, Some(PathBuf::from("/pkg/src")));
    }

    #[test]
    fn watch_files_include_configs_and_package_json() {
        let mut config = plan(Path::new("/pkg"));
        config.watch = true;
        config.tsconfig = Some(PathBuf::from("/pkg/tsconfig.json"));
        config.watch_paths = vec![PathBuf::from("/pkg/extra")];

        let options =
            build_options(&config, &[PathBuf::from("/pkg/bento.config.json")], false, false)
                .expect("options");
        assert_eq!(
            options.input.watch_files,
            [
                PathBuf::from("/pkg/tsconfig.json"),
                PathBuf::from("/pkg/bento.config.json"),
                PathBuf::from("/pkg/extra"),
            ]
        );
    }
}
