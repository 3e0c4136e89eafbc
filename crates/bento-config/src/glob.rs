//! Glob matching over the filesystem.
//!
//! Patterns are matched against `/`-separated paths relative to `cwd` (or
//! against the absolute path for absolute patterns). A leading `!` negates a
//! pattern, `{a,b}` alternatives are expanded before matching, and `ignore`
//! patterns ending in `/**` prune whole directories from the walk.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};
use path_clean::PathClean;
use walkdir::WalkDir;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default)]
pub struct GlobOptions {
    pub ignore: Vec<String>,
    pub only_files: bool,
    pub only_directories: bool,
    /// Let `*` and `**` match names starting with `.`.
    pub dot: bool,
    /// A literal pattern naming a directory yields the directory's contents.
    pub expand_directories: bool,
}

impl GlobOptions {
    pub fn files() -> Self {
        Self {
            only_files: true,
            ..Self::default()
        }
    }
}

const GLOB_CHARS: &[char] = &['*', '?', '[', '{'];

/// Whether `pattern` contains glob syntax.
pub fn is_dynamic_pattern(pattern: &str) -> bool {
    let pattern = pattern.strip_prefix('!').unwrap_or(pattern);
    pattern.contains(GLOB_CHARS)
}

/// The leading run of literal path segments of `pattern`.
///
/// `src/hooks/*.ts` has base `src/hooks`, `*.ts` has base `` and a literal
/// `src/a.ts` has base `src`.
pub fn static_base(pattern: &str) -> String {
    let pattern = strip_dot_slash(pattern);
    let segments: Vec<&str> = pattern.split('/').collect();
    let literal = segments
        .iter()
        .take_while(|segment| !segment.contains(GLOB_CHARS))
        .count();
    let take = if literal == segments.len() {
        literal.saturating_sub(1)
    } else {
        literal
    };
    segments[..take].join("/")
}

/// Expand every pattern and return the sorted, de-duplicated absolute matches.
pub fn glob_paths(patterns: &[String], cwd: &Path, options: &GlobOptions) -> Result<Vec<PathBuf>> {
    let (negative, positive): (Vec<&String>, Vec<&String>) =
        patterns.iter().partition(|pattern| pattern.starts_with('!'));

    let mut excludes = compile_all(negative.iter().map(|p| &p[1..]))?;
    let ignores = compile_all(options.ignore.iter().map(String::as_str))?;
    excludes.extend(ignores.iter().cloned());

    let match_options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: !options.dot,
    };

    let mut found = BTreeSet::new();
    for pattern in positive {
        for expanded in expand_braces(strip_dot_slash(pattern)) {
            collect(&expanded, cwd, options, &ignores, match_options, &mut found)?;
        }
    }

    Ok(found
        .into_iter()
        .filter(|path| {
            let rel = relative_slash(path, cwd);
            !excludes
                .iter()
                .any(|exclude| exclude.matches(&rel, path, match_options))
        })
        .collect())
}

fn collect(
    pattern: &str,
    cwd: &Path,
    options: &GlobOptions,
    ignores: &[Compiled],
    match_options: MatchOptions,
    found: &mut BTreeSet<PathBuf>,
) -> Result<()> {
    if !is_dynamic_pattern(pattern) {
        let path = cwd.join(pattern).clean();
        if path.is_dir() && options.expand_directories {
            let expanded = format!("{}/**", pattern.trim_end_matches('/'));
            return collect(&expanded, cwd, options, ignores, match_options, found);
        }
        if path.exists() && accepts(&path, options) {
            found.insert(path);
        }
        return Ok(());
    }

    let compiled = Compiled::new(pattern)?;
    let base = cwd.join(static_base(pattern)).clean();
    if !base.is_dir() {
        return Ok(());
    }

    let walker = WalkDir::new(&base).min_depth(1).into_iter().filter_entry(|entry| {
        if !entry.file_type().is_dir() {
            return true;
        }
        let rel = relative_slash(entry.path(), cwd);
        !ignores.iter().any(|ignore| ignore.prunes(&rel, entry.path(), match_options))
    });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| base.clone());
            ConfigError::io(path, std::io::Error::other(e.to_string()))
        })?;
        let path = entry.path();
        if !accepts(path, options) {
            continue;
        }
        let rel = relative_slash(path, cwd);
        if compiled.matches(&rel, path, match_options) {
            found.insert(path.to_path_buf());
        }
    }
    Ok(())
}

fn accepts(path: &Path, options: &GlobOptions) -> bool {
    if options.only_files && !path.is_file() {
        return false;
    }
    if options.only_directories && !path.is_dir() {
        return false;
    }
    true
}

#[derive(Debug, Clone)]
struct Compiled {
    pattern: Pattern,
    absolute: bool,
}

impl Compiled {
    fn new(source: &str) -> Result<Self> {
        let absolute = Path::new(source).is_absolute();
        let source = if absolute {
            source.to_string()
        } else {
            strip_dot_slash(source).to_string()
        };
        let pattern = Pattern::new(&source).map_err(|e| ConfigError::InvalidPattern {
            pattern: source.clone(),
            message: e.msg.to_string(),
        })?;
        Ok(Self { pattern, absolute })
    }

    fn matches(&self, rel: &str, abs: &Path, options: MatchOptions) -> bool {
        if self.absolute {
            self.pattern.matches_with(&to_slash(abs), options)
        } else {
            self.pattern.matches_with(rel, options)
        }
    }

    /// Whether everything below directory `rel` is ignored.
    fn prunes(&self, rel: &str, abs: &Path, options: MatchOptions) -> bool {
        if !self.pattern.as_str().ends_with("/**") {
            return false;
        }
        let probe = if self.absolute {
            format!("{}/_", to_slash(abs))
        } else {
            format!("{rel}/_")
        };
        self.pattern.matches_with(&probe, options)
    }
}

fn compile_all<'a>(sources: impl Iterator<Item = &'a str>) -> Result<Vec<Compiled>> {
    let mut compiled = Vec::new();
    for source in sources {
        for expanded in expand_braces(source) {
            compiled.push(Compiled::new(&expanded)?);
        }
    }
    Ok(compiled)
}

/// Expand `{a,b}` alternatives. Nested groups expand from the outside in.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };
    let mut depth = 0usize;
    let mut close = None;
    let mut splits = Vec::new();
    for (index, ch) in pattern[open..].char_indices() {
        let index = open + index;
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(index);
                    break;
                }
            }
            ',' if depth == 1 => splits.push(index),
            _ => {}
        }
    }
    let Some(close) = close else {
        return vec![pattern.to_string()];
    };
    if splits.is_empty() {
        return vec![pattern.to_string()];
    }

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];
    let mut bounds = vec![open];
    bounds.extend(splits);
    bounds.push(close);

    bounds
        .windows(2)
        .flat_map(|window| {
            let alternative = &pattern[window[0] + 1..window[1]];
            expand_braces(&format!("{prefix}{alternative}{suffix}"))
        })
        .collect()
}

fn strip_dot_slash(pattern: &str) -> &str {
    let mut pattern = pattern;
    while let Some(rest) = pattern.strip_prefix("./") {
        pattern = rest;
    }
    pattern
}

fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// `path` relative to `base`, `/`-separated, climbing with `..` when needed.
/// Falls back to the full path when no relative form exists.
pub fn relative_slash(path: &Path, base: &Path) -> String {
    match pathdiff::diff_paths(path, base) {
        Some(rel) => rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                Component::ParentDir => Some("..".to_string()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/"),
        None => to_slash(path),
    }
}
