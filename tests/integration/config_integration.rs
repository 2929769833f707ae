//! Configuration loading: file layers and environment overrides

use sitenav::config::{global_config_path, ConfigLoader};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use crate::integration::test_utils::with_xdg_env;

fn write(path: PathBuf, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[test]
fn test_defaults_without_any_files() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        let config = ConfigLoader::load(workspace.path()).unwrap();
        assert_eq!(config.storage.store_path, PathBuf::from(".sitenav/store"));
        assert_eq!(config.navigation.settle_ms, 1500);
        assert_eq!(config.navigation.load_timeout_ms, 10_000);
        assert_eq!(config.navigation.restore_timeout_ms, 30_000);
        assert!(config.sync.on_startup);
    });
}

#[test]
fn test_global_config_path_follows_xdg() {
    let test_dir = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        assert_eq!(
            global_config_path().unwrap(),
            test_dir.path().join("sitenav").join("config.toml")
        );
    });
}

#[test]
fn test_workspace_file_overrides_global_file() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write(
        test_dir.path().join("sitenav").join("config.toml"),
        "[navigation]\nsettle_ms = 900\nload_timeout_ms = 4000\n",
    );
    write(
        workspace.path().join("config").join("config.toml"),
        "[navigation]\nsettle_ms = 700\n",
    );

    with_xdg_env(&test_dir, || {
        let config = ConfigLoader::load(workspace.path()).unwrap();
        assert_eq!(config.navigation.settle_ms, 700);
        assert_eq!(config.navigation.load_timeout_ms, 4000);
    });
}

#[test]
fn test_environment_file_and_variables() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write(
        workspace.path().join("config").join("staging.toml"),
        "[sync]\non_startup = false\n",
    );

    with_xdg_env(&test_dir, || {
        std::env::set_var("SITENAV_ENV", "staging");
        std::env::set_var("SITENAV_NAVIGATION__RESTORE_TIMEOUT_MS", "1234");
        let result = ConfigLoader::load(workspace.path());
        std::env::remove_var("SITENAV_ENV");
        std::env::remove_var("SITENAV_NAVIGATION__RESTORE_TIMEOUT_MS");

        let config = result.unwrap();
        assert!(!config.sync.on_startup);
        assert_eq!(config.navigation.restore_timeout_ms, 1234);
    });
}

#[test]
fn test_invalid_values_fail_validation() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write(
        workspace.path().join("config").join("config.toml"),
        "[navigation]\nsettle_ms = 0\n\n[logging]\nformat = \"xml\"\n",
    );

    with_xdg_env(&test_dir, || {
        let config = ConfigLoader::load(workspace.path()).unwrap();
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    });
}
