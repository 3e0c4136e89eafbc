//! End-to-end resolution: loading, workspaces, features, env.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use bento_config::{
    CiOption, ConfigError, ConfigExport, Enabled, EnabledFlag, ErrorKind, Format, InlineConfig, LogLevel,
    RunContext, UserConfig, WithEnabled, resolve_config, resolve_feature,
};
use serde_json::json;
use serial_test::serial;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn ctx(cwd: &Path, ci: bool) -> Arc<RunContext> {
    Arc::new(RunContext::new(cwd).with_ci(ci).with_color(false))
}

fn silent() -> InlineConfig {
    InlineConfig {
        user: UserConfig {
            log_level: Some(LogLevel::Silent),
            ..UserConfig::default()
        },
        ..InlineConfig::default()
    }
}

#[test]
fn glob_entry_with_negation() {
    let dir = TempDir::new().unwrap();
    for hook in ["index", "useAuth", "useUser"] {
        write(dir.path(), &format!("src/hooks/{hook}.ts"), "export {}");
    }
    write(
        dir.path(),
        "bento.config.json",
        r#"{ "entry": { "hooks/*": ["src/hooks/*.ts", "!src/hooks/index.ts"] } }"#,
    );

    let resolution = resolve_config(&silent(), &ctx(dir.path(), false), None).unwrap();
    let entry = &resolution.configs[0].entry;
    assert_eq!(entry.len(), 2);
    assert_eq!(entry["hooks/useAuth"], dir.path().join("src/hooks/useAuth.ts"));
    assert_eq!(entry["hooks/useUser"], dir.path().join("src/hooks/useUser.ts"));
    assert_eq!(resolution.files, [dir.path().join("bento.config.json")]);
}

#[test]
fn dual_format_fan_out() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/index.ts", "export {}");
    write(dir.path(), "package.json", r#"{ "name": "lib", "types": "./dist/index.d.mts" }"#);

    let export = ConfigExport::from(UserConfig::from_value(json!({ "format": ["esm", "cjs"] })).unwrap());
    let resolution = resolve_config(&silent(), &ctx(dir.path(), false), Some(export)).unwrap();

    let formats: Vec<_> = resolution.configs.iter().map(|c| c.format).collect();
    assert_eq!(formats, [Format::Es, Format::Cjs]);
    assert!(resolution.configs.iter().all(|c| c.dts_enabled()));
    assert_eq!(
        resolution.configs[0].package_json_path(),
        Some(dir.path().join("package.json").as_path())
    );
}

#[test]
fn workspace_members_without_entry_are_dropped() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "package.json", r#"{ "name": "root" }"#);
    write(dir.path(), "bento.config.json", r#"{ "workspace": true }"#);
    write(dir.path(), "packages/a/package.json", r#"{ "name": "@scope/a" }"#);
    write(dir.path(), "packages/a/src/index.ts", "export {}");
    write(dir.path(), "packages/a/bento.config.json", r#"{ "entry": "src/index.ts" }"#);
    write(dir.path(), "packages/b/package.json", r#"{ "name": "@scope/b" }"#);

    let resolution = resolve_config(&silent(), &ctx(dir.path(), false), None).unwrap();
    assert_eq!(resolution.configs.len(), 1);
    let config = &resolution.configs[0];
    assert_eq!(config.name.as_deref(), Some("@scope/a"));
    assert_eq!(config.out_dir, dir.path().join("packages/a/dist"));
    assert_eq!(
        resolution.files,
        [
            dir.path().join("bento.config.json"),
            dir.path().join("packages/a/bento.config.json")
        ]
    );
}

#[test]
fn everything_filtered_is_no_valid_config() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/index.ts", "export {}");
    let inline = InlineConfig {
        filter: Some(bento_config::FilterOption::One("nothing".into())),
        ..silent()
    };
    let err = resolve_config(&inline, &ctx(dir.path(), false), None).unwrap_err();
    assert!(matches!(err, ConfigError::NoValidConfig));
}

#[test]
fn deps_conflict_fails_before_anything_is_built() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/index.ts", "export {}");
    write(
        dir.path(),
        "bento.config.json",
        r#"{ "deps": { "skipNodeModulesBundle": true, "alwaysBundle": ["lodash"] } }"#,
    );
    let err = resolve_config(&silent(), &ctx(dir.path(), false), None).unwrap_err();
    assert!(matches!(err, ConfigError::SkipNodeModulesWithAlwaysBundle));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(!dir.path().join("dist").exists());
}

#[test]
fn entry_errors_are_entry_resolution_errors() {
    let dir = TempDir::new().unwrap();
    let err = resolve_config(&silent(), &ctx(dir.path(), false), None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EntryResolution);
}

#[test]
fn feature_flags_resolve_against_ci() {
    let defaults = json!({ "level": "warning" });
    let defaults = defaults.as_object().unwrap().clone();
    let resolve = |value: WithEnabled<serde_json::Map<String, serde_json::Value>>, ci: bool| {
        resolve_feature(Some(&value), ci, defaults.clone())
    };

    assert_eq!(resolve(WithEnabled::Bool(false), false), None);
    assert_eq!(resolve(WithEnabled::Bool(true), false), Some(defaults.clone()));
    assert_eq!(resolve(WithEnabled::Ci(CiOption::CiOnly), true), Some(defaults.clone()));
    assert_eq!(resolve(WithEnabled::Ci(CiOption::CiOnly), false), None);
    assert_eq!(resolve(WithEnabled::Ci(CiOption::LocalOnly), true), None);

    let disabled = WithEnabled::Options(Enabled {
        enabled: Some(EnabledFlag::Bool(false)),
        options: serde_json::Map::new(),
    });
    assert_eq!(resolve(disabled, false), None);

    let local_only = WithEnabled::Options(Enabled {
        enabled: Some(EnabledFlag::Ci(CiOption::LocalOnly)),
        options: json!({ "strict": true }).as_object().unwrap().clone(),
    });
    assert_eq!(resolve(local_only.clone(), true), None);
    let merged = resolve(local_only, false).unwrap();
    assert_eq!(merged.get("level"), Some(&json!("warning")));
    assert_eq!(merged.get("strict"), Some(&json!(true)));
}

#[test]
fn ci_only_publint_is_dropped_locally() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/index.ts", "export {}");
    write(dir.path(), "package.json", r#"{ "name": "lib" }"#);
    let export = ConfigExport::from(UserConfig::from_value(json!({ "publint": "ci-only" })).unwrap());

    let local = resolve_config(&silent(), &ctx(dir.path(), false), Some(export.clone())).unwrap();
    assert!(local.configs[0].publint.is_none());
    let ci = resolve_config(&silent(), &ctx(dir.path(), true), Some(export)).unwrap();
    assert!(ci.configs[0].publint.is_some());
}

#[test]
#[serial]
fn env_precedence_option_over_process_over_file() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/index.ts", "export {}");
    write(
        dir.path(),
        ".env.production",
        "BENTO_FROM_FILE=file\nBENTO_SHARED=file\nSECRET=hidden\n",
    );
    let export = ConfigExport::from(
        UserConfig::from_value(json!({
            "envFile": ".env.production",
            "env": { "BENTO_SHARED": "option" }
        }))
        .unwrap(),
    );

    // SAFETY: serialized with every other test that touches the environment.
    unsafe {
        std::env::set_var("BENTO_SHARED", "process");
        std::env::set_var("BENTO_FROM_PROCESS", "process");
    }
    let result = resolve_config(&silent(), &ctx(dir.path(), false), Some(export));
    unsafe {
        std::env::remove_var("BENTO_SHARED");
        std::env::remove_var("BENTO_FROM_PROCESS");
    }

    let env = &result.unwrap().configs[0].env;
    assert_eq!(env["BENTO_SHARED"], json!("option"));
    assert_eq!(env["BENTO_FROM_PROCESS"], json!("process"));
    assert_eq!(env["BENTO_FROM_FILE"], json!("file"));
    assert!(!env.contains_key("SECRET"));
}

#[test]
fn fail_on_warn_escalates_deprecations() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/index.ts", "export {}");
    let export = ConfigExport::from(
        UserConfig::from_value(json!({ "external": ["react"], "failOnWarn": true })).unwrap(),
    );
    let context = ctx(dir.path(), false);
    resolve_config(&silent(), &context, Some(export)).unwrap();
    assert!(context.has_errored());

    let export = ConfigExport::from(UserConfig {
        fail_on_warn: Some(EnabledFlag::Ci(CiOption::CiOnly)),
        ..UserConfig::from_value(json!({ "external": ["react"] })).unwrap()
    });
    let context = ctx(dir.path(), false);
    resolve_config(&silent(), &context, Some(export)).unwrap();
    assert!(!context.has_errored());
}
