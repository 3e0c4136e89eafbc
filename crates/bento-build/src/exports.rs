//! `package.json` export maps generated from emitted chunks.

use std::collections::BTreeMap;
use std::path::Path;

use bento_config::entry::strip_extname;
use bento_config::{DevExports, ExportsOptions, Format, Logger, Pattern};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::bundler::{Chunk, is_dts_file};
use crate::error::{BuildError, Result};

pub type ChunksByFormat = BTreeMap<Format, Vec<Chunk>>;

/// Fields written back into `package.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedExports {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub types: Option<String>,
    pub exports: Map<String, Value>,
    /// Exports for the published package when `exports` points at sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_exports: Option<Map<String, Value>>,
}

/// Paths of one subpath per format.
#[derive(Debug, Default)]
struct SubpathTargets {
    import: Option<String>,
    require: Option<String>,
    source: Option<String>,
}

/// Build the export map of the package at `package_json`.
pub fn generate_exports(
    package_json: &Path,
    package_name: &str,
    chunks: &ChunksByFormat,
    options: &ExportsOptions,
    logger: &Logger,
) -> Result<GeneratedExports> {
    let pkg_root = package_json.parent().unwrap_or(Path::new(""));
    let all = options.all.unwrap_or(false);
    let exclude = options
        .exclude
        .iter()
        .flatten()
        .map(|source| Pattern::parse(source))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut subpaths: BTreeMap<String, SubpathTargets> = BTreeMap::new();
    let (mut main, mut module, mut cjs_types, mut es_types) = (None, None, None, None);
    let mut found_format = false;

    for (format, chunks) in chunks {
        if !matches!(format, Format::Es | Format::Cjs) {
            continue;
        }
        found_format = true;

        let exported: Vec<&Chunk> = chunks
            .iter()
            .filter(|chunk| !chunk.is_asset())
            .filter(|chunk| chunk.is_entry || (all && !is_internal_facade(chunk)))
            .collect();
        let only_one_entry = exported
            .iter()
            .filter(|chunk| chunk.is_entry && !chunk.is_dts())
            .count()
            == 1;

        for chunk in exported {
            let file_name = chunk.file_name.replace('\\', "/");
            let is_dts = is_dts_file(&file_name);
            let mut name = strip_extname(&file_name);
            if is_dts {
                name = name.strip_suffix(".d").unwrap_or(name);
            }
            let is_index = chunk.is_entry && (only_one_entry || name == "index");
            let dist = relative_to_root(pkg_root, &chunk.out_dir.join(&file_name));

            if is_index {
                let slot = match (format, is_dts) {
                    (Format::Es, false) => &mut module,
                    (Format::Es, true) => &mut es_types,
                    (_, false) => &mut main,
                    (_, true) => &mut cjs_types,
                };
                slot.get_or_insert_with(|| dist.clone());
            }
            if is_dts {
                continue;
            }
            if exclude.iter().any(|pattern| pattern.matches(name)) {
                tracing::debug!("Excluding {name} from exports");
                continue;
            }

            let subpath = if is_index {
                ".".to_string()
            } else {
                format!("./{}", name.strip_suffix("/index").unwrap_or(name))
            };
            let targets = subpaths.entry(subpath).or_default();
            match format {
                Format::Es => targets.import = Some(dist),
                _ => targets.require = Some(dist),
            }
            if targets.source.is_none() {
                targets.source = chunk
                    .facade_module_id
                    .as_deref()
                    .filter(|id| Path::new(id).is_absolute())
                    .map(|id| relative_to_root(pkg_root, Path::new(id)));
            }
        }
    }

    if !found_format {
        logger.warn(format!(
            "No CJS or ESM formats found in chunks for package {package_name}"
        ));
    }

    let has_cjs = main.is_some() || cjs_types.is_some();
    let dev = options.dev_exports.as_ref().filter(|dev| !matches!(dev, DevExports::All(false)));

    let mut exports = Map::new();
    let mut publish = Map::new();
    for (subpath, targets) in &subpaths {
        let built = conditions(targets, None);
        match dev {
            Some(DevExports::All(_)) => {
                let source = targets.source.clone().map(Value::String).unwrap_or_else(|| built.clone());
                exports.insert(subpath.clone(), source);
            }
            Some(DevExports::Condition(condition)) => {
                exports.insert(subpath.clone(), conditions(targets, Some(condition)));
            }
            None => {
                exports.insert(subpath.clone(), built.clone());
            }
        }
        publish.insert(subpath.clone(), built);
    }

    for map in [&mut exports, &mut publish] {
        if all {
            map.insert("./*".to_string(), Value::String("./*".to_string()));
        } else {
            map.insert("./package.json".to_string(), Value::String("./package.json".to_string()));
        }
        map.sort_keys();
        if let Some(custom) = &options.custom_exports {
            for (key, value) in custom {
                map.insert(key.clone(), value.clone());
            }
        }
    }

    Ok(GeneratedExports {
        main: main.filter(|_| has_cjs),
        module: module.filter(|_| has_cjs),
        types: cjs_types.or(es_types).filter(|_| has_cjs),
        exports,
        publish_exports: dev.map(|_| publish),
    })
}

/// Virtual and `node_modules` facades never get their own subpath.
fn is_internal_facade(chunk: &Chunk) -> bool {
    chunk
        .facade_module_id
        .as_deref()
        .is_some_and(|id| id.starts_with('\0') || id.contains("node_modules"))
}

fn conditions(targets: &SubpathTargets, dev_condition: Option<&str>) -> Value {
    let mut map = Map::new();
    if let (Some(condition), Some(source)) = (dev_condition, &targets.source) {
        map.insert(condition.to_string(), Value::String(source.clone()));
    }
    match (&targets.import, &targets.require) {
        (Some(import), Some(require)) => {
            map.insert("import".into(), Value::String(import.clone()));
            map.insert("require".into(), Value::String(require.clone()));
        }
        (Some(only), None) | (None, Some(only)) => {
            if map.is_empty() {
                return Value::String(only.clone());
            }
            map.insert("default".into(), Value::String(only.clone()));
        }
        (None, None) => {}
    }
    Value::Object(map)
}

/// `./`-prefixed, `/`-separated path relative to the package root.
fn relative_to_root(root: &Path, path: &Path) -> String {
    let relative = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());
    format!("./{}", relative.to_string_lossy().replace('\\', "/"))
}

/// Merge generated fields into `package.json`, keeping every other field and its order.
///
/// Returns whether the file changed.
pub async fn write_package_json(package_json: &Path, generated: &GeneratedExports) -> Result<bool> {
    let content = tokio::fs::read_to_string(package_json)
        .await
        .map_err(|e| BuildError::io(package_json, e))?;
    let mut pkg: Map<String, Value> = serde_json::from_str(&content)?;

    let fields = [
        ("main", &generated.main),
        ("module", &generated.module),
        ("types", &generated.types),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            pkg.insert(key.to_string(), Value::String(value.clone()));
        }
    }
    pkg.insert("exports".to_string(), Value::Object(generated.exports.clone()));
    if let Some(publish) = &generated.publish_exports {
        let publish_config = pkg
            .entry("publishConfig")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(publish_config) = publish_config {
            publish_config.insert("exports".to_string(), Value::Object(publish.clone()));
        }
    }

    let indent = detect_indent(&content);
    let mut updated = to_string_with_indent(&Value::Object(pkg), &indent)?;
    if content.ends_with('\n') {
        updated.push('\n');
    }
    if updated == content {
        return Ok(false);
    }
    tokio::fs::write(package_json, updated)
        .await
        .map_err(|e| BuildError::io(package_json, e))?;
    tracing::debug!("Updated exports in {}", package_json.display());
    Ok(true)
}

fn detect_indent(content: &str) -> String {
    content
        .lines()
        .skip(1)
        .find(|line| !line.trim().is_empty())
        .map(|line| line.chars().take_while(|c| c.is_whitespace()).collect::<String>())
        .filter(|indent| !indent.is_empty())
        .unwrap_or_else(|| "  ".to_string())
}

fn to_string_with_indent(value: &Value, indent: &str) -> Result<String> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use bento_config::{LogLevel, RunContext};
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn root() -> PathBuf {
        PathBuf::from("/project")
    }

    fn chunk(file_name: &str) -> Chunk {
        let facade = format!("/project/SRC/{}", file_name.replace('\\', "/"));
        Chunk::entry(file_name, root()).with_facade(facade)
    }

    fn logger() -> Logger {
        Logger::new(Arc::new(RunContext::new(root()).with_color(false)), LogLevel::Silent, false)
    }

    fn generate(chunks: Vec<(Format, Vec<Chunk>)>, options: serde_json::Value) -> GeneratedExports {
        let options: ExportsOptions = serde_json::from_value(options).expect("exports options");
        generate_exports(
            &root().join("package.json"),
            "fake-pkg",
            &chunks.into_iter().collect(),
            &options,
            &logger(),
        )
        .expect("generate exports")
    }

    #[test]
    fn no_entries_warns() {
        let logger = logger();
        let generated = generate_exports(
            &root().join("package.json"),
            "fake-pkg",
            &ChunksByFormat::new(),
            &ExportsOptions::default(),
            &logger,
        )
        .expect("generate exports");
        assert!(
            logger
                .context()
                .was_warned("No CJS or ESM formats found in chunks for package fake-pkg")
        );
        insta::assert_json_snapshot!(generated, @r###"
        {
          "exports": {
            "./package.json": "./package.json"
          }
        }
        "###);
    }

    #[test]
    fn single_entry_becomes_root() {
        let generated = generate(
            vec![(Format::Es, vec![chunk("main.js"), chunk("chunk.js").non_entry()])],
            json!({}),
        );
        insta::assert_json_snapshot!(generated, @r###"
        {
          "exports": {
            ".": "./main.js",
            "./package.json": "./package.json"
          }
        }
        "###);
    }

    #[test]
    fn index_entries_in_directories() {
        let generated = generate(
            vec![(Format::Es, vec![chunk("index.js"), chunk("foo/index.js"), chunk("bar.js")])],
            json!({}),
        );
        insta::assert_json_snapshot!(generated, @r###"
        {
          "exports": {
            ".": "./index.js",
            "./bar": "./bar.js",
            "./foo": "./foo/index.js",
            "./package.json": "./package.json"
          }
        }
        "###);
    }

    #[test]
    fn dual_formats_with_declarations() {
        let generated = generate(
            vec![
                (Format::Es, vec![chunk("index.mjs"), chunk("index.d.mts")]),
                (Format::Cjs, vec![chunk("index.cjs"), chunk("index.d.cts")]),
            ],
            json!({}),
        );
        insta::assert_json_snapshot!(generated, @r###"
        {
          "main": "./index.cjs",
          "module": "./index.mjs",
          "types": "./index.d.cts",
          "exports": {
            ".": {
              "import": "./index.mjs",
              "require": "./index.cjs"
            },
            "./package.json": "./package.json"
          }
        }
        "###);
    }

    #[test]
    fn dev_condition_comes_first() {
        let generated = generate(
            vec![
                (Format::Es, vec![chunk("index.js")]),
                (Format::Cjs, vec![chunk("index.cjs")]),
            ],
            json!({ "devExports": "dev" }),
        );
        insta::assert_json_snapshot!(generated, @r###"
        {
          "main": "./index.cjs",
          "module": "./index.js",
          "exports": {
            ".": {
              "dev": "./SRC/index.js",
              "import": "./index.js",
              "require": "./index.cjs"
            },
            "./package.json": "./package.json"
          },
          "publishExports": {
            ".": {
              "import": "./index.js",
              "require": "./index.cjs"
            },
            "./package.json": "./package.json"
          }
        }
        "###);
    }

    #[test]
    fn dev_exports_point_at_sources() {
        let generated = generate(
            vec![
                (Format::Es, vec![chunk("index.js")]),
                (Format::Cjs, vec![chunk("index.cjs")]),
            ],
            json!({ "devExports": true }),
        );
        assert_eq!(generated.exports["."], json!("./SRC/index.js"));
        assert_eq!(
            generated.publish_exports.expect("publish exports")["."],
            json!({ "import": "./index.js", "require": "./index.cjs" })
        );
    }

    #[test]
    fn custom_exports_are_appended() {
        let generated = generate(
            vec![(Format::Es, vec![chunk("index.js")])],
            json!({ "devExports": "dev", "customExports": { "./TEST": "./TEST" } }),
        );
        insta::assert_json_snapshot!(generated, @r###"
        {
          "exports": {
            ".": {
              "dev": "./SRC/index.js",
              "default": "./index.js"
            },
            "./package.json": "./package.json",
            "./TEST": "./TEST"
          },
          "publishExports": {
            ".": "./index.js",
            "./package.json": "./package.json",
            "./TEST": "./TEST"
          }
        }
        "###);
    }

    #[test]
    fn excludes_by_regex_and_glob() {
        let generated = generate(
            vec![(Format::Es, vec![chunk("index.js"), chunk("foo.js"), chunk("abc/bar.js"), chunk("baz.js")])],
            json!({ "exclude": ["**/bar", "/baz/"] }),
        );
        let keys: Vec<&String> = generated.exports.keys().collect();
        assert_eq!(keys, [".", "./foo", "./package.json"]);
    }

    #[test]
    fn export_all_skips_virtual_and_vendored_chunks() {
        let generated = generate(
            vec![(
                Format::Es,
                vec![
                    chunk("index.js"),
                    chunk("utils.js").non_entry(),
                    chunk("virtual.js").non_entry().with_facade("\0virtual-module"),
                    chunk("lodash.js")
                        .non_entry()
                        .with_facade("/project/node_modules/lodash/index.js"),
                ],
            )],
            json!({ "all": true }),
        );
        insta::assert_json_snapshot!(generated, @r###"
        {
          "exports": {
            ".": "./index.js",
            "./*": "./*",
            "./utils": "./utils.js"
          }
        }
        "###);
    }

    #[test]
    fn windows_separators_are_normalized() {
        let generated = generate(
            vec![(
                Format::Es,
                vec![
                    chunk("index.js"),
                    chunk("index.d.ts"),
                    chunk(r"foo\index.js"),
                    chunk(r"foo\index.d.ts"),
                    chunk(r"bar\baz.js"),
                ],
            )],
            json!({}),
        );
        let keys: Vec<&String> = generated.exports.keys().collect();
        assert_eq!(keys, [".", "./bar/baz", "./foo", "./package.json"]);
        assert_eq!(generated.exports["./bar/baz"], json!("./bar/baz.js"));
        assert_eq!(generated.types, None);
    }

    #[test]
    fn output_directory_is_part_of_the_path() {
        let dist = root().join("dist");
        let generated = generate(
            vec![(Format::Es, vec![Chunk::entry("index.mjs", dist)])],
            json!({}),
        );
        assert_eq!(generated.exports["."], json!("./dist/index.mjs"));
    }

    #[tokio::test]
    async fn writes_fields_and_keeps_the_rest() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("package.json");
        std::fs::write(&path, "{\n    \"name\": \"pkg\",\n    \"version\": \"1.0.0\"\n}\n").expect("write");

        let generated = GeneratedExports {
            main: Some("./dist/index.cjs".into()),
            exports: json!({ ".": "./dist/index.cjs" }).as_object().cloned().expect("object"),
            publish_exports: Some(Map::new()),
            ..GeneratedExports::default()
        };
        assert!(write_package_json(&path, &generated).await.expect("write"));
        assert!(!write_package_json(&path, &generated).await.expect("unchanged"));

        let written = std::fs::read_to_string(&path).expect("read");
        assert!(written.starts_with("{\n    \"name\": \"pkg\",\n    \"version\": \"1.0.0\",\n    \"main\""));
        let pkg: Value = serde_json::from_str(&written).expect("json");
        assert_eq!(pkg["exports"]["."], "./dist/index.cjs");
        assert_eq!(pkg["publishConfig"]["exports"], json!({}));
    }
}
