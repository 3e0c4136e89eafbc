//! Dependency externalization policy, including the deprecated top-level aliases.

use crate::error::{ConfigError, Result};
use crate::logger::Logger;
use crate::pattern::Pattern;
use crate::types::{AllowBundleOption, OneOrMany, UserConfig};

/// What to do about third-party modules that end up inlined in the output.
#[derive(Debug, Clone, Default)]
pub enum AllowBundle {
    /// Unset: list inlined modules and suggest setting `deps.onlyAllowBundle`.
    #[default]
    Hint,
    /// `false`: say nothing.
    Disabled,
    /// Only these may be inlined; anything else fails the build.
    Only(Vec<Pattern>),
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedDepsConfig {
    pub never_bundle: Vec<Pattern>,
    pub always_bundle: Vec<Pattern>,
    pub only_allow_bundle: AllowBundle,
    pub skip_node_modules_bundle: bool,
}

impl ResolvedDepsConfig {
    pub fn is_empty(&self) -> bool {
        self.never_bundle.is_empty() && self.always_bundle.is_empty() && !self.skip_node_modules_bundle
    }
}

/// Fold `deps` and its deprecated top-level spellings into one policy.
///
/// Setting an old spelling next to its `deps.*` replacement is an error;
/// setting it alone works with a deprecation warning.
pub fn resolve_deps(config: &UserConfig, logger: &Logger) -> Result<ResolvedDepsConfig> {
    let deps = config.deps.clone().unwrap_or_default();

    let never_bundle = shim(
        "external",
        "deps.neverBundle",
        config.external.as_ref(),
        deps.never_bundle.as_ref(),
        logger,
    )?;
    let always_bundle = shim(
        "noExternal",
        "deps.alwaysBundle",
        config.no_external.as_ref(),
        deps.always_bundle.as_ref(),
        logger,
    )?;
    let only_allow_bundle = shim(
        "inlineOnly",
        "deps.onlyAllowBundle",
        config.inline_only.as_ref(),
        deps.only_allow_bundle.as_ref(),
        logger,
    )?;
    let skip_node_modules_bundle = shim(
        "skipNodeModulesBundle",
        "deps.skipNodeModulesBundle",
        config.skip_node_modules_bundle.as_ref(),
        deps.skip_node_modules_bundle.as_ref(),
        logger,
    )?
    .unwrap_or(false);

    let always_bundle = match always_bundle {
        Some(patterns) => Pattern::parse_all(patterns.to_vec().iter())?,
        None => Vec::new(),
    };
    if skip_node_modules_bundle && !always_bundle.is_empty() {
        return Err(ConfigError::SkipNodeModulesWithAlwaysBundle);
    }

    let never_bundle = match never_bundle {
        Some(patterns) => Pattern::parse_all(patterns.to_vec().iter())?,
        None => Vec::new(),
    };

    let only_allow_bundle = match only_allow_bundle {
        None | Some(AllowBundleOption::Flag(true)) => AllowBundle::Hint,
        Some(AllowBundleOption::Flag(false)) => AllowBundle::Disabled,
        Some(AllowBundleOption::Patterns(patterns)) => AllowBundle::Only(Pattern::parse_all(patterns.to_vec().iter())?),
    };

    Ok(ResolvedDepsConfig {
        never_bundle,
        always_bundle,
        only_allow_bundle,
        skip_node_modules_bundle,
    })
}

fn shim<T: Clone>(
    old: &'static str,
    new: &'static str,
    deprecated: Option<&T>,
    current: Option<&T>,
    logger: &Logger,
) -> Result<Option<T>> {
    match (deprecated, current) {
        (Some(_), Some(_)) => Err(ConfigError::DeprecatedConflict { old, new }),
        (Some(value), None) => {
            logger.warn(format!("`{old}` is deprecated. Use `{new}` instead."));
            Ok(Some(value.clone()))
        }
        (None, current) => Ok(current.cloned()),
    }
}

impl From<Vec<String>> for AllowBundleOption {
    fn from(patterns: Vec<String>) -> Self {
        AllowBundleOption::Patterns(OneOrMany::Many(patterns))
    }
}
