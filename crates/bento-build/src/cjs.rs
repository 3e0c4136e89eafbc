use bento_config::target::node_version;
use bento_config::{Format, ResolvedConfig, satisfies};

/// Node versions that can `require()` ES modules.
const REQUIRE_ESM: &str = "^20.19.0 || >=22.12.0";

const LEGACY_CJS_ADVICE: &str = "We recommend using the ESM format instead of CommonJS.\n\
The ESM format is compatible with modern platforms and runtimes, and most new libraries are now distributed only in ESM format.\n\
Learn more at https://nodejs.org/en/learn/modules/publishing-a-package#how-did-we-get-here";

/// Suggest ESM when a CommonJS build targets a Node.js that loads ESM anyway.
pub fn warn_legacy_cjs(config: &ResolvedConfig) {
    if config.exe.is_some()
        || config.format != Format::Cjs
        || config.checks.legacy_cjs == Some(false)
    {
        return;
    }
    let Some(target) = &config.target else {
        return;
    };

    let supports_require_esm = target
        .iter()
        .filter_map(|target| node_version(std::slice::from_ref(target)))
        .any(|version| satisfies(&version, REQUIRE_ESM));
    if supports_require_esm {
        config.logger.warn_once(LEGACY_CJS_ADVICE);
    }
}
