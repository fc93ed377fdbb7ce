//! Configuration loading and root folder resolution
//!
//! Tests that touch `MEDFABRIC_ROOT_FOLDER` or `MEDFABRIC_CONFIG` are marked
//! `#[serial]` so they never race on the process environment.

use medfabric_common::config::{
    resolve_root_folder, AssignmentPolicy, TomlConfig, CONFIG_FILE_ENV, ROOT_FOLDER_ENV,
};
use medfabric_common::Error;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};

#[test]
#[serial]
fn test_cli_argument_wins_over_env_and_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/from-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..TomlConfig::default()
    };

    let resolved = resolve_root_folder(Some(Path::new("/tmp/from-cli")), &config);
    assert_eq!(resolved, PathBuf::from("/tmp/from-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_wins_over_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/from-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..TomlConfig::default()
    };

    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/tmp/from-env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_then_platform_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..TomlConfig::default()
    };
    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/tmp/from-toml"));

    let fallback = resolve_root_folder(None, &TomlConfig::default());
    assert!(!fallback.as_os_str().is_empty());
    assert!(fallback.to_string_lossy().contains("medfabric"));
}

#[test]
#[serial]
fn test_missing_config_file_falls_back_to_defaults() {
    env::remove_var(CONFIG_FILE_ENV);
    let temp_dir = tempfile::tempdir().unwrap();

    let config = TomlConfig::load(Some(&temp_dir.path().join("absent.toml"))).unwrap();
    assert_eq!(config.port, 5740);
    assert_eq!(config.assignment.default_policy, AssignmentPolicy::LeastChosen);
}

#[test]
#[serial]
fn test_config_file_from_env() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("medfabric.toml");
    std::fs::write(
        &path,
        r#"
        root_folder = "/srv/annotations"
        port = 6001

        [logging]
        level = "debug"

        [audit]
        enabled = false
        "#,
    )
    .unwrap();
    env::set_var(CONFIG_FILE_ENV, &path);

    let config = TomlConfig::load(None).unwrap();
    assert_eq!(config.port, 6001);
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/annotations")));
    assert_eq!(config.logging.level, "debug");
    assert!(!config.audit.enabled);
    assert_eq!(config.audit.file, PathBuf::from("audit.jsonl"));

    env::remove_var(CONFIG_FILE_ENV);
}

#[test]
#[serial]
fn test_unparseable_config_file_is_an_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "[assignment\nbatch_size = ").unwrap();

    let result = TomlConfig::load(Some(&path));
    assert!(matches!(result, Err(Error::Config(_))));
}
