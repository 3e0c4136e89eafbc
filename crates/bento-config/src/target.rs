//! Compile target resolution and the npm-style version ranges it relies on.

use semver::{Comparator, Op, Version, VersionReq};

use crate::logger::Logger;
use crate::package::PackageJson;
use crate::types::{OneOrMany, TargetOption};

/// Resolve `target` to a list of targets, `None` meaning "engine default".
///
/// Unset falls back to `node<min>` where `min` is the lowest version allowed
/// by `engines.node`. Comma-separated strings are split.
pub fn resolve_target(
    target: Option<&TargetOption>,
    pkg: Option<&PackageJson>,
    logger: &Logger,
) -> Option<Vec<String>> {
    let raw = match target {
        Some(TargetOption::Flag(false)) => return None,
        Some(TargetOption::Targets(targets)) => targets.clone(),
        Some(TargetOption::Flag(true)) | None => OneOrMany::One(package_target(pkg?)?),
    };

    let targets: Vec<String> = raw
        .to_vec()
        .iter()
        .flat_map(|t| t.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();

    if !targets.is_empty() {
        let noun = if targets.len() > 1 { "targets" } else { "target" };
        logger.info(format!("{noun}: {}", targets.join(", ")));
    }
    Some(targets)
}

/// `node<min>` from `engines.node`, unless the minimum is `0.0.0`.
pub fn package_target(pkg: &PackageJson) -> Option<String> {
    let range = pkg.engines.as_ref()?.get("node")?;
    let min = min_version(range)?;
    if min == Version::new(0, 0, 0) {
        return None;
    }
    Some(format!("node{min}"))
}

/// The Node.js version named by a `node*` target, if any.
pub fn node_version(targets: &[String]) -> Option<Version> {
    targets.iter().find_map(|target| {
        let version = target.strip_prefix("node")?;
        coerce(version)
    })
}

/// Parse `18`, `18.3` or `18.3.1` into a full version.
pub fn coerce(version: &str) -> Option<Version> {
    let mut parts = version.trim().trim_start_matches('v').split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().map(str::parse).transpose().ok()?.unwrap_or(0);
    let patch = parts.next().map(str::parse).transpose().ok()?.unwrap_or(0);
    Some(Version::new(major, minor, patch))
}

/// Whether `version` satisfies an npm range such as `^20.19.0 || >=22.12.0`.
pub fn satisfies(version: &Version, range: &str) -> bool {
    alternatives(range).iter().any(|req| req.matches(version))
}

/// Lowest version satisfying an npm range.
pub fn min_version(range: &str) -> Option<Version> {
    alternatives(range)
        .iter()
        .filter_map(|req| {
            let lower = req
                .comparators
                .iter()
                .filter_map(lower_bound)
                .max()
                .unwrap_or_else(|| Version::new(0, 0, 0));
            req.matches(&lower).then_some(lower)
        })
        .min()
}

fn lower_bound(comparator: &Comparator) -> Option<Version> {
    let minor = comparator.minor.unwrap_or(0);
    let patch = comparator.patch.unwrap_or(0);
    match comparator.op {
        Op::Less | Op::LessEq => None,
        Op::Greater => Some(match (comparator.minor, comparator.patch) {
            (Some(minor), Some(patch)) => Version::new(comparator.major, minor, patch + 1),
            (Some(minor), None) => Version::new(comparator.major, minor + 1, 0),
            _ => Version::new(comparator.major + 1, 0, 0),
        }),
        _ => Some(Version::new(comparator.major, minor, patch)),
    }
}

/// Split an npm range on `||` and parse each side as a comparator set.
fn alternatives(range: &str) -> Vec<VersionReq> {
    range
        .split("||")
        .filter_map(|alternative| {
            let normalized = normalize_comparators(alternative);
            if normalized.is_empty() {
                return Some(VersionReq::STAR);
            }
            VersionReq::parse(&normalized).ok()
        })
        .collect()
}

/// npm separates comparators with spaces and treats a bare version as exact.
fn normalize_comparators(alternative: &str) -> String {
    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op = String::new();
    for token in alternative.split_whitespace() {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
            pending_op.push_str(token);
            continue;
        }
        let token = format!("{pending_op}{token}");
        pending_op.clear();
        let starts_with_digit = token.chars().next().is_some_and(|c| c.is_ascii_digit());
        let is_full = token.split('.').count() == 3;
        if starts_with_digit && is_full {
            comparators.push(format!("={token}"));
        } else {
            comparators.push(token);
        }
    }
    comparators.join(", ")
}
