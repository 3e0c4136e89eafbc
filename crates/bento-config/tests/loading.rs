//! Config file discovery and loading.

use std::fs;
use std::path::Path;

use bento_config::{
    ConfigError, ConfigExport, ConfigFileOption, ConfigItem, ConfigLoader, InlineConfig, RunContext, UserConfig,
};
use tempfile::TempDir;

fn ctx(cwd: &Path) -> RunContext {
    RunContext::new(cwd).with_ci(false)
}

#[test]
fn discovers_json_config_in_parent_directory() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bento.config.json"), r#"{ "outDir": "lib" }"#).unwrap();
    let nested = dir.path().join("src");
    fs::create_dir_all(&nested).unwrap();

    let loaded = ConfigLoader::new(&nested)
        .load(&InlineConfig::default(), &ctx(&nested))
        .unwrap();
    assert_eq!(loaded.file.as_deref(), Some(dir.path().join("bento.config.json").as_path()));
    assert_eq!(loaded.configs.len(), 1);
    assert_eq!(loaded.configs[0].out_dir.as_deref(), Some(Path::new("lib")));
    // cwd is the directory the search started from
    assert_eq!(loaded.configs[0].cwd.as_deref(), Some(nested.as_path()));
}

#[test]
fn yaml_list_yields_configs_in_order() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("bento.config.yaml"),
        "- name: first\n  format: esm\n- name: second\n  format: cjs\n",
    )
    .unwrap();

    let loaded = ConfigLoader::new(dir.path())
        .load(&InlineConfig::default(), &ctx(dir.path()))
        .unwrap();
    let names: Vec<_> = loaded.configs.iter().map(|c| c.name.clone().unwrap()).collect();
    assert_eq!(names, ["first", "second"]);
}

#[test]
fn package_json_field_is_a_fallback() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("package.json"),
        r#"{ "name": "pkg", "bento": { "entry": "src/main.ts" } }"#,
    )
    .unwrap();

    let loaded = ConfigLoader::new(dir.path())
        .scoped_to(dir.path())
        .load(&InlineConfig::default(), &ctx(dir.path()))
        .unwrap();
    assert!(loaded.file.unwrap().ends_with("package.json"));
    assert!(loaded.configs[0].entry.is_some());
}

#[test]
fn no_config_file_yields_one_default_config() {
    let dir = TempDir::new().unwrap();
    let loaded = ConfigLoader::new(dir.path())
        .scoped_to(dir.path())
        .load(&InlineConfig::default(), &ctx(dir.path()))
        .unwrap();
    assert!(loaded.file.is_none());
    assert_eq!(loaded.configs.len(), 1);
    assert_eq!(
        loaded.configs[0],
        UserConfig {
            cwd: Some(dir.path().to_path_buf()),
            ..UserConfig::default()
        }
    );
}

#[test]
fn disabled_config_skips_discovery() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bento.config.json"), r#"{ "outDir": "lib" }"#).unwrap();
    let inline = InlineConfig {
        config: Some(ConfigFileOption::Enabled(false)),
        ..InlineConfig::default()
    };

    let loaded = ConfigLoader::new(dir.path()).load(&inline, &ctx(dir.path())).unwrap();
    assert!(loaded.file.is_none());
    assert!(loaded.configs[0].out_dir.is_none());
}

#[test]
fn explicit_file_is_loaded_without_search() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("configs")).unwrap();
    fs::write(dir.path().join("bento.config.json"), r#"{ "name": "discovered" }"#).unwrap();
    fs::write(dir.path().join("configs/release.toml"), "name = \"explicit\"\n").unwrap();
    let inline = InlineConfig {
        config: Some(ConfigFileOption::Path("configs/release.toml".into())),
        ..InlineConfig::default()
    };

    let loaded = ConfigLoader::new(dir.path()).load(&inline, &ctx(dir.path())).unwrap();
    assert_eq!(loaded.configs[0].name.as_deref(), Some("explicit"));
    assert_eq!(loaded.configs[0].cwd.as_deref(), Some(dir.path().join("configs").as_path()));
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let inline = InlineConfig {
        config: Some(ConfigFileOption::Path("nope.toml".into())),
        ..InlineConfig::default()
    };
    let err = ConfigLoader::new(dir.path()).load(&inline, &ctx(dir.path())).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(_)));
}

#[test]
fn function_export_receives_inline_and_ci() {
    let dir = TempDir::new().unwrap();
    let export = ConfigExport::function(|inline, env| {
        Ok(ConfigExport::from(vec![UserConfig {
            name: Some(format!("ci={} watch={}", env.ci, inline.user.is_watch())),
            ..UserConfig::default()
        }]))
    });

    let loaded = ConfigLoader::new(dir.path())
        .with_export(export)
        .load(&InlineConfig::default(), &RunContext::new(dir.path()).with_ci(true))
        .unwrap();
    assert_eq!(loaded.configs[0].name.as_deref(), Some("ci=true watch=false"));
}

#[test]
fn function_nested_in_list_is_rejected() {
    let dir = TempDir::new().unwrap();
    let export = ConfigExport::Many(vec![
        ConfigItem::Config(UserConfig::default()),
        ConfigItem::Function(std::sync::Arc::new(|_, _| Ok(UserConfig::default().into()))),
    ]);
    let err = ConfigLoader::new(dir.path())
        .with_export(export)
        .load(&InlineConfig::default(), &ctx(dir.path()))
        .unwrap_err();
    assert!(matches!(err, ConfigError::NestedFunction));
}

#[test]
fn relative_config_cwd_is_resolved_against_loading_directory() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bento.config.json"), r#"{ "cwd": "packages/core" }"#).unwrap();
    let loaded = ConfigLoader::new(dir.path())
        .load(&InlineConfig::default(), &ctx(dir.path()))
        .unwrap();
    assert_eq!(loaded.configs[0].cwd.as_deref(), Some(dir.path().join("packages/core").as_path()));
}
