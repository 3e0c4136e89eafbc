//! Decide, per import, whether a module is bundled or left external.
//!
//! The engine asks [`DependencyClassifier::classify`] for every bare import it
//! resolves. After a build, [`DependencyClassifier::check_bundle`] looks at
//! what actually got inlined from `node_modules` and enforces
//! `deps.onlyAllowBundle`.

use bento_config::{AllowBundle, Logger, Pattern, ResolvedConfig, ResolvedDepsConfig};
use indexmap::{IndexMap, IndexSet};
use owo_colors::OwoColorize;

use crate::bundler::{Chunk, ModuleResolver};
use crate::error::{BuildError, Result};

/// The classifier's answer for one import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No opinion; the engine bundles unless something else externalizes it.
    Bundle,
    /// Forced into the bundle by `deps.alwaysBundle`.
    NoExternal,
    /// Keep the import. `side_effects` is `Some(false)` for Node builtins.
    External { side_effects: Option<bool> },
}

impl Decision {
    pub fn is_external(self) -> bool {
        matches!(self, Decision::External { .. })
    }
}

#[derive(Debug)]
pub struct DependencyClassifier {
    /// `dependencies` and `peerDependencies`, when there is a package.json.
    deps: Option<Vec<String>>,
    policy: ResolvedDepsConfig,
    logger: Logger,
    color: bool,
}

impl DependencyClassifier {
    pub fn new(config: &ResolvedConfig) -> Self {
        Self {
            deps: config.pkg.as_deref().map(|pkg| pkg.production_deps()),
            policy: config.deps.clone(),
            logger: config.logger.clone(),
            color: config.logger.context().color_enabled(),
        }
    }

    /// Whether the engine needs a classifier at all for this config.
    pub fn is_needed(config: &ResolvedConfig) -> bool {
        config.pkg.is_some() || config.deps.skip_node_modules_bundle
    }

    /// Classify `id` imported from `importer`.
    ///
    /// Relative and absolute ids, entries and imports without an importer are
    /// not classified.
    pub fn classify(
        &self,
        id: &str,
        importer: Option<&str>,
        is_entry: bool,
        resolver: &dyn ModuleResolver,
    ) -> Decision {
        let Some(importer) = importer else {
            return Decision::Bundle;
        };
        if is_entry || id.starts_with('.') || id.starts_with('/') || id.is_empty() {
            return Decision::Bundle;
        }

        let decision = self.strategy(id, importer, resolver);
        tracing::debug!("classify {id:?} from {importer:?}: {decision:?}");
        decision
    }

    fn strategy(&self, id: &str, importer: &str, resolver: &dyn ModuleResolver) -> Decision {
        if matches_patterns(&self.policy.always_bundle, id) {
            return Decision::NoExternal;
        }

        let external = Decision::External {
            side_effects: is_node_builtin(id).then_some(false),
        };

        if matches_patterns(&self.policy.never_bundle, id) {
            return external;
        }

        if self.policy.skip_node_modules_bundle {
            let resolved = resolver.resolve(id, importer);
            if resolved.is_some_and(|resolved| resolved.external || in_node_modules(&resolved.id)) {
                return external;
            }
        }

        if let Some(deps) = &self.deps {
            if deps
                .iter()
                .any(|dep| id == dep || id.strip_prefix(dep.as_str()).is_some_and(|rest| rest.starts_with('/')))
            {
                return external;
            }

            if crate::bundler::is_dts_file(importer) && !id.starts_with("@types/") {
                let types_name = types_package(id);
                if deps.iter().any(|dep| *dep == types_name) {
                    return external;
                }
            }
        }

        Decision::Bundle
    }

    /// Enforce `deps.onlyAllowBundle` against the emitted chunks.
    ///
    /// Without a whitelist this only prints a hint listing the bundled
    /// dependencies. An explicit empty whitelist rejects every one of them.
    pub fn check_bundle(&self, chunks: &[Chunk]) -> Result<()> {
        if matches!(self.policy.only_allow_bundle, AllowBundle::Disabled) {
            return Ok(());
        }

        let bundled = bundled_dependencies(chunks);
        tracing::debug!("found deps in bundle: {:?}", bundled.keys().collect::<Vec<_>>());

        match &self.policy.only_allow_bundle {
            AllowBundle::Disabled => Ok(()),
            AllowBundle::Only(allowed) => {
                let errors: Vec<String> = bundled
                    .iter()
                    .filter(|(dep, _)| !matches_patterns(allowed, dep))
                    .map(|(dep, importers)| self.violation(dep, importers))
                    .collect();
                if !errors.is_empty() {
                    return Err(BuildError::ExternalizationViolation(errors.join("\n\n")));
                }

                let unused: Vec<&Pattern> = allowed
                    .iter()
                    .filter(|pattern| !bundled.keys().any(|dep| pattern.matches(dep)))
                    .collect();
                if !unused.is_empty() {
                    self.logger.info(format!(
                        "The following entries in {} are not used in the bundle:\n{}\nConsider removing them to keep your configuration clean.",
                        self.option("deps.onlyAllowBundle"),
                        unused
                            .iter()
                            .map(|pattern| format!("- {}", self.dep(&pattern.to_string())))
                            .collect::<Vec<_>>()
                            .join("\n"),
                    ));
                }
                Ok(())
            }
            AllowBundle::Hint => {
                if !bundled.is_empty() {
                    self.logger.info(format!(
                        "Hint: consider adding {} option to avoid unintended bundling of dependencies, or set {} to disable this hint.\nDetected dependencies in bundle:\n{}",
                        self.option("deps.onlyAllowBundle"),
                        self.option("deps.onlyAllowBundle: false"),
                        bundled
                            .keys()
                            .map(|dep| format!("- {}", self.option(dep)))
                            .collect::<Vec<_>>()
                            .join("\n"),
                    ));
                }
                Ok(())
            }
        }
    }

    fn violation(&self, dep: &str, importers: &IndexSet<String>) -> String {
        let option = self.option("deps.onlyAllowBundle");
        format!(
            "{} is located in {} but is not included in {option} option.\n\
             To fix this, either add it to {option}, declare it as a production or peer dependency in your package.json, or externalize it manually.\n\
             Imported by\n{}",
            self.dep(dep),
            self.option("node_modules"),
            importers
                .iter()
                .map(|importer| format!("- {importer}"))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    fn option(&self, text: &str) -> String {
        if self.color { text.blue().to_string() } else { text.to_string() }
    }

    fn dep(&self, text: &str) -> String {
        if self.color { text.yellow().to_string() } else { text.to_string() }
    }
}

fn matches_patterns(patterns: &[Pattern], id: &str) -> bool {
    patterns.iter().any(|pattern| pattern.matches(id))
}

fn in_node_modules(id: &str) -> bool {
    id.replace('\\', "/").contains("/node_modules/")
}

/// `@types/<id>` for a type-only import: `@scope/pkg` maps to `@types/scope__pkg`.
fn types_package(id: &str) -> String {
    format!("@types/{}", id.strip_prefix('@').unwrap_or(id).replace('/', "__"))
}

/// Package name of a module id inside `node_modules`, scoped names included.
pub fn package_name(id: &str) -> Option<String> {
    let id = id.replace('\\', "/");
    let (_, rest) = id.rsplit_once("/node_modules/")?;
    let mut parts = rest.split('/');
    let first = parts.next().filter(|part| !part.is_empty())?;
    if first.starts_with('@') {
        let second = parts.next()?;
        Some(format!("{first}/{second}"))
    } else {
        Some(first.to_string())
    }
}

/// Every `node_modules` package inlined into `chunks`, with the modules importing it.
fn bundled_dependencies(chunks: &[Chunk]) -> IndexMap<String, IndexSet<String>> {
    let mut bundled: IndexMap<String, IndexSet<String>> = IndexMap::new();
    for chunk in chunks.iter().filter(|chunk| !chunk.is_asset()) {
        for module in &chunk.modules {
            let Some(dep) = package_name(&module.id) else {
                continue;
            };
            bundled
                .entry(dep)
                .or_default()
                .extend(module.importers.iter().cloned());
        }
    }
    bundled
}

const NODE_BUILTINS: &[&str] = &[
    "assert", "assert/strict", "async_hooks", "buffer", "child_process", "cluster", "console",
    "constants", "crypto", "dgram", "diagnostics_channel", "dns", "dns/promises", "domain",
    "events", "fs", "fs/promises", "http", "http2", "https", "inspector", "inspector/promises",
    "module", "net", "os", "path", "path/posix", "path/win32", "perf_hooks", "process",
    "punycode", "querystring", "readline", "readline/promises", "repl", "stream",
    "stream/consumers", "stream/promises", "stream/web", "string_decoder", "sys", "timers",
    "timers/promises", "tls", "trace_events", "tty", "url", "util", "util/types", "v8", "vm",
    "wasi", "worker_threads", "zlib",
];

/// `fs`, `node:fs`, `node:test` and friends.
pub fn is_node_builtin(id: &str) -> bool {
    match id.strip_prefix("node:") {
        Some(name) => !name.is_empty(),
        None => NODE_BUILTINS.contains(&id),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use bento_config::{LogLevel, PackageJson, RunContext};
    use indexmap::IndexMap;

    use super::*;
    use crate::bundler::{ChunkModule, ResolvedId};

    struct NodeModulesResolver;

    impl ModuleResolver for NodeModulesResolver {
        fn resolve(&self, id: &str, _importer: &str) -> Option<ResolvedId> {
            Some(ResolvedId {
                id: format!("/project/node_modules/{id}/index.js"),
                external: false,
            })
        }
    }

    fn classifier(deps: &[&str], policy: ResolvedDepsConfig) -> DependencyClassifier {
        let ctx = Arc::new(RunContext::new("/project").with_color(false));
        let pkg = PackageJson {
            dependencies: Some(deps.iter().map(|d| (d.to_string(), "*".to_string())).collect::<IndexMap<_, _>>()),
            ..PackageJson::default()
        };
        DependencyClassifier {
            deps: Some(pkg.production_deps()),
            policy,
            logger: Logger::new(ctx, LogLevel::Silent, false),
            color: false,
        }
    }

    fn patterns(items: &[&str]) -> Vec<Pattern> {
        items.iter().map(|p| Pattern::parse(p).expect("pattern")).collect()
    }

    fn module(path: &str, importer: &str) -> ChunkModule {
        ChunkModule {
            id: path.to_string(),
            importers: vec![importer.to_string()],
        }
    }

    #[test]
    fn declared_dependencies_and_subpaths_are_external() {
        let classifier = classifier(&["react"], ResolvedDepsConfig::default());
        let r = &NodeModulesResolver;
        assert!(classifier.classify("react", Some("/src/a.ts"), false, r).is_external());
        assert!(classifier.classify("react/jsx-runtime", Some("/src/a.ts"), false, r).is_external());
        assert_eq!(classifier.classify("react-dom", Some("/src/a.ts"), false, r), Decision::Bundle);
        assert_eq!(classifier.classify("./local", Some("/src/a.ts"), false, r), Decision::Bundle);
        assert_eq!(classifier.classify("react", None, false, r), Decision::Bundle);
        assert_eq!(classifier.classify("react", Some("/src/a.ts"), true, r), Decision::Bundle);
    }

    #[test]
    fn always_bundle_wins_over_declared_dependencies() {
        let policy = ResolvedDepsConfig {
            always_bundle: patterns(&["react"]),
            ..ResolvedDepsConfig::default()
        };
        let classifier = classifier(&["react"], policy);
        assert_eq!(
            classifier.classify("react", Some("/src/a.ts"), false, &NodeModulesResolver),
            Decision::NoExternal
        );
    }

    #[test]
    fn type_imports_map_to_types_packages() {
        let classifier = classifier(&["@types/node", "@types/babel__core"], ResolvedDepsConfig::default());
        let r = &NodeModulesResolver;
        assert!(classifier.classify("node", Some("/src/a.d.ts"), false, r).is_external());
        assert!(classifier.classify("@babel/core", Some("/src/a.d.mts"), false, r).is_external());
        assert_eq!(classifier.classify("@babel/core", Some("/src/a.ts"), false, r), Decision::Bundle);
    }

    #[test]
    fn skip_node_modules_externalizes_resolved_dependencies() {
        let policy = ResolvedDepsConfig {
            skip_node_modules_bundle: true,
            ..ResolvedDepsConfig::default()
        };
        let classifier = classifier(&[], policy);
        assert!(
            classifier
                .classify("lodash", Some("/src/a.ts"), false, &NodeModulesResolver)
                .is_external()
        );
    }

    #[test]
    fn builtins_are_side_effect_free() {
        let classifier = classifier(&["fs"], ResolvedDepsConfig::default());
        assert_eq!(
            classifier.classify("fs", Some("/src/a.ts"), false, &NodeModulesResolver),
            Decision::External {
                side_effects: Some(false)
            }
        );
        assert!(is_node_builtin("node:test"));
        assert!(!is_node_builtin("lodash"));
    }

    #[test]
    fn package_names_from_module_ids() {
        assert_eq!(package_name("/p/node_modules/cac/dist/index.js").as_deref(), Some("cac"));
        assert_eq!(
            package_name("/p/node_modules/a/node_modules/@scope/pkg/x.js").as_deref(),
            Some("@scope/pkg")
        );
        assert_eq!(package_name(r"C:\p\node_modules\bumpp\index.js").as_deref(), Some("bumpp"));
        assert_eq!(package_name("/p/src/index.ts"), None);
    }

    #[test]
    fn whitelist_violation_names_dependency_and_importers() {
        let policy = ResolvedDepsConfig {
            only_allow_bundle: AllowBundle::Only(patterns(&["cac"])),
            ..ResolvedDepsConfig::default()
        };
        let classifier = classifier(&[], policy);
        let chunk = Chunk::entry("index.mjs", Path::new("/project/dist")).with_modules(vec![
            module("/project/node_modules/cac/dist/index.js", "/project/src/cli.ts"),
            module("/project/node_modules/bumpp/dist/index.js", "/project/src/release.ts"),
        ]);

        let err = classifier.check_bundle(&[chunk]).expect_err("bumpp is not allowed");
        let message = err.to_string();
        assert!(message.starts_with("bumpp is located in node_modules"));
        assert!(message.contains("- /project/src/release.ts"));
        assert!(!message.contains("cac is located"));
    }

    #[test]
    fn explicit_empty_whitelist_rejects_every_dependency() {
        let policy = ResolvedDepsConfig {
            only_allow_bundle: AllowBundle::Only(Vec::new()),
            ..ResolvedDepsConfig::default()
        };
        let classifier = classifier(&[], policy);
        let chunk = Chunk::entry("index.mjs", "/project/dist").with_modules(vec![
            module("/project/node_modules/cac/index.js", "/project/src/a.ts"),
            module("/project/node_modules/bumpp/index.js", "/project/src/b.ts"),
        ]);
        let message = classifier.check_bundle(&[chunk]).expect_err("empty whitelist").to_string();
        assert_eq!(message.matches("is located in node_modules").count(), 2);
    }

    #[test]
    fn disabled_check_and_hint_never_fail() {
        let chunk = Chunk::entry("index.mjs", "/project/dist")
            .with_modules(vec![module("/project/node_modules/cac/index.js", "/project/src/a.ts")]);
        let hint = classifier(&[], ResolvedDepsConfig::default());
        assert!(hint.check_bundle(std::slice::from_ref(&chunk)).is_ok());

        let disabled = classifier(
            &[],
            ResolvedDepsConfig {
                only_allow_bundle: AllowBundle::Disabled,
                ..ResolvedDepsConfig::default()
            },
        );
        assert!(disabled.check_bundle(&[chunk]).is_ok());
    }
}
