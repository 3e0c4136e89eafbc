//! Entry resolution: string, list and glob-keyed map inputs to a name → path map.

use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;
use path_clean::PathClean;

use crate::error::{ConfigError, Result};
use crate::glob::{GlobOptions, glob_paths, is_dynamic_pattern, relative_slash, static_base};
use crate::logger::Logger;
use crate::types::{EntryInput, EntryItem, OneOrMany};

pub type EntryMap = IndexMap<String, PathBuf>;

/// Resolve the `entry` option against `cwd`.
///
/// Without entries, `src/index.ts` is used when it exists.
pub fn resolve_entry(entry: Option<&EntryInput>, cwd: &Path, logger: &Logger) -> Result<EntryMap> {
    let entries = match entry.filter(|entry| !is_empty(entry)) {
        Some(entry) => to_object_entry(entry, cwd)?,
        None => {
            let default_entry = cwd.join("src/index.ts");
            if !default_entry.is_file() {
                return Err(ConfigError::NoInputFiles);
            }
            IndexMap::from([("index".to_string(), default_entry)])
        }
    };

    if entries.is_empty() {
        let shown = entry
            .and_then(|e| serde_json::to_string(e).ok())
            .unwrap_or_default();
        return Err(ConfigError::EntryNotFound(shown));
    }

    logger.info(format!(
        "entry: {}",
        entries
            .values()
            .map(|path| relative_slash(path, cwd))
            .collect::<Vec<_>>()
            .join(", ")
    ));
    Ok(entries)
}

fn is_empty(entry: &EntryInput) -> bool {
    match entry {
        OneOrMany::Many(items) => items.is_empty(),
        OneOrMany::One(EntryItem::Map(map)) => map.is_empty(),
        OneOrMany::One(EntryItem::Path(_)) => false,
    }
}

/// Expand entries to output name → absolute path.
///
/// Plain paths and globs in a list are keyed by their path relative to the
/// lowest common ancestor, extension stripped. Map entries keep their key,
/// or for keys containing `*` substitute each match's path relative to the
/// patterns' shared base directory.
pub fn to_object_entry(entry: &EntryInput, cwd: &Path) -> Result<EntryMap> {
    let mut paths = Vec::new();
    let mut maps = Vec::new();
    for item in entry.to_vec() {
        match item {
            EntryItem::Path(path) => paths.push(path),
            EntryItem::Map(map) => maps.push(map),
        }
    }

    let mut result = EntryMap::new();
    if !paths.is_empty() {
        let files: Vec<PathBuf> = if paths.iter().any(|p| is_dynamic_pattern(p)) {
            glob_paths(&paths, cwd, &GlobOptions::default())?
        } else {
            paths.iter().map(|p| cwd.join(p).clean()).collect()
        };

        let base = lowest_common_ancestor(&files);
        for file in files {
            let name = strip_extname(&relative_slash(&file, &base)).to_string();
            result.insert(name, file);
        }
    }

    for map in maps {
        for (key, value) in map {
            if !key.contains('*') {
                let OneOrMany::One(path) = value else {
                    return Err(ConfigError::EntryArrayValue { key });
                };
                result.insert(key, cwd.join(path).clean());
                continue;
            }
            result.extend(resolve_glob_key(&key, &value.to_vec(), cwd)?);
        }
    }

    Ok(result)
}

fn resolve_glob_key(key: &str, patterns: &[String], cwd: &Path) -> Result<EntryMap> {
    let files = glob_paths(patterns, cwd, &GlobOptions::default())?;
    if files.is_empty() {
        return Err(ConfigError::EntryNoMatches {
            key: key.to_string(),
            pattern: patterns.join(", "),
        });
    }

    let mut bases: Vec<String> = Vec::new();
    for pattern in patterns.iter().filter(|p| !p.starts_with('!')) {
        let base = static_base(pattern);
        if !bases.contains(&base) {
            bases.push(base);
        }
    }
    let base = match bases.as_slice() {
        [] => {
            return Err(ConfigError::EntryBaseUnknown { key: key.to_string() });
        }
        [base] => cwd.join(base).clean(),
        _ => {
            return Err(ConfigError::EntryBaseMismatch {
                key: key.to_string(),
                bases,
            });
        }
    };

    Ok(files
        .into_iter()
        .map(|file| {
            let stem = strip_extname(&relative_slash(&file, &base)).to_string();
            (key.replace('*', &stem), file)
        })
        .collect())
}

/// Whether the matched file set of `entry` can change as files come and go.
pub fn is_glob_entry(entry: Option<&EntryInput>) -> bool {
    let Some(entry) = entry else {
        return false;
    };
    entry.to_vec().iter().any(|item| match item {
        EntryItem::Path(path) => is_dynamic_pattern(path),
        EntryItem::Map(map) => map.keys().any(|key| key.contains('*')),
    })
}

/// Deepest directory containing every path. A single path yields its parent.
pub fn lowest_common_ancestor(paths: &[PathBuf]) -> PathBuf {
    match paths {
        [] => PathBuf::new(),
        [only] => only.parent().map(Path::to_path_buf).unwrap_or_default(),
        [first, rest @ ..] => {
            let mut common: Vec<Component<'_>> = first.components().collect();
            for path in rest {
                let shared = common
                    .iter()
                    .zip(path.components())
                    .take_while(|(a, b)| **a == *b)
                    .count();
                common.truncate(shared);
            }
            common.iter().collect()
        }
    }
}

/// Strip the last extension from a `/`-separated path.
pub fn strip_extname(path: &str) -> &str {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[name_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[..name_start + dot],
        _ => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunContext;
    use crate::logger::LogLevel;
    use serde_json::json;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, "").expect("write");
        path
    }

    fn entry(value: serde_json::Value) -> EntryInput {
        serde_json::from_value(value).expect("entry")
    }

    fn logger() -> Logger {
        Logger::new(Arc::new(RunContext::new("/")), LogLevel::Silent, false)
    }

    #[test]
    fn lowest_common_ancestor_cases() {
        assert_eq!(lowest_common_ancestor(&[]), PathBuf::new());
        assert_eq!(lowest_common_ancestor(&["/a/b/c.ts".into()]), PathBuf::from("/a/b"));
        assert_eq!(
            lowest_common_ancestor(&["/a/b/c.ts".into(), "/a/b/d/e.ts".into()]),
            PathBuf::from("/a/b")
        );
        assert_eq!(
            lowest_common_ancestor(&["/a/b.ts".into(), "/c/d.ts".into()]),
            PathBuf::from("/")
        );
    }

    #[test]
    fn strip_extname_cases() {
        assert_eq!(strip_extname("foo/bar.ts"), "foo/bar");
        assert_eq!(strip_extname("foo.d.ts"), "foo.d");
        assert_eq!(strip_extname("foo/.hidden"), "foo/.hidden");
        assert_eq!(strip_extname("dir.v2/file"), "dir.v2/file");
    }

    #[test]
    fn array_entries_are_keyed_relative_to_common_ancestor() {
        let dir = TempDir::new().expect("tempdir");
        let index = touch(dir.path(), "src/index.ts");
        let util = touch(dir.path(), "src/utils/fs.ts");

        let map = to_object_entry(&entry(json!(["src/index.ts", "src/utils/fs.ts"])), dir.path())
            .expect("entries");
        assert_eq!(map.get("index"), Some(&index));
        assert_eq!(map.get("utils/fs"), Some(&util));
    }

    #[test]
    fn single_string_entry_uses_file_stem() {
        let dir = TempDir::new().expect("tempdir");
        let main = touch(dir.path(), "src/main.ts");
        let map = to_object_entry(&entry(json!("src/main.ts")), dir.path()).expect("entries");
        assert_eq!(map.into_iter().collect::<Vec<_>>(), vec![("main".to_string(), main)]);
    }

    #[test]
    fn glob_key_excludes_negated_files() {
        let dir = TempDir::new().expect("tempdir");
        touch(dir.path(), "src/hooks/index.ts");
        let auth = touch(dir.path(), "src/hooks/useAuth.ts");
        let user = touch(dir.path(), "src/hooks/useUser.ts");

        let map = to_object_entry(
            &entry(json!({ "hooks/*": ["src/hooks/*.ts", "!src/hooks/index.ts"] })),
            dir.path(),
        )
        .expect("entries");
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("hooks/useAuth"), Some(&auth));
        assert_eq!(map.get("hooks/useUser"), Some(&user));
    }

    #[test]
    fn glob_key_requires_shared_base() {
        let dir = TempDir::new().expect("tempdir");
        touch(dir.path(), "src/a/x.ts");
        touch(dir.path(), "src/b/y.ts");
        let err = to_object_entry(&entry(json!({ "lib/*": ["src/a/*.ts", "src/b/*.ts"] })), dir.path())
            .expect_err("mismatch");
        assert!(matches!(err, ConfigError::EntryBaseMismatch { .. }));
    }

    #[test]
    fn glob_key_without_matches_fails() {
        let dir = TempDir::new().expect("tempdir");
        let err = to_object_entry(&entry(json!({ "lib/*": "src/*.ts" })), dir.path()).expect_err("empty");
        assert!(matches!(err, ConfigError::EntryNoMatches { .. }));
    }

    #[test]
    fn plain_key_rejects_arrays() {
        let dir = TempDir::new().expect("tempdir");
        let err = to_object_entry(&entry(json!({ "main": ["a.ts", "b.ts"] })), dir.path()).expect_err("array");
        assert!(matches!(err, ConfigError::EntryArrayValue { .. }));
    }

    #[test]
    fn default_entry_is_src_index() {
        let dir = TempDir::new().expect("tempdir");
        assert!(matches!(
            resolve_entry(None, dir.path(), &logger()),
            Err(ConfigError::NoInputFiles)
        ));

        let index = touch(dir.path(), "src/index.ts");
        let map = resolve_entry(None, dir.path(), &logger()).expect("default");
        assert_eq!(map.get("index"), Some(&index));
    }

    #[test]
    fn glob_entry_detection() {
        assert!(is_glob_entry(Some(&entry(json!("src/*.ts")))));
        assert!(is_glob_entry(Some(&entry(json!([{ "lib/*": "src/*.ts" }])))));
        assert!(!is_glob_entry(Some(&entry(json!({ "main": "src/*.ts" })))));
        assert!(!is_glob_entry(None));
    }
}
