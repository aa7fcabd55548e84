use std::fs;
use std::time::Duration;

use catalog_wizard::config::{ConfigManager, WizardConfig, MAX_DEBOUNCE_MS};
use tempfile::tempdir;

#[test]
fn saved_config_loads_back() {
    let dir = tempdir().unwrap();
    let manager = ConfigManager::with_path(dir.path().join("nested").join("config.json"));
    let config = WizardConfig::default()
        .with_api_base_url("http://catalog.example.test/api")
        .with_debounce(Duration::from_millis(250));

    manager.save(&config).unwrap();
    assert!(manager.path().exists());
    assert!(!manager.path().with_extension("json.tmp").exists());

    let loaded = manager.load().unwrap();
    assert_eq!(loaded.connect_timeout_secs, config.connect_timeout_secs);
    if std::env::var_os("CATALOG_WIZARD_DEBOUNCE_MS").is_none() {
        assert_eq!(loaded.debounce(), Duration::from_millis(250));
    }
}

#[test]
fn partial_file_falls_back_to_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"debounce_ms": 99999, "request_timeout_secs": 30}"#).unwrap();

    let loaded = ConfigManager::with_path(&path).load().unwrap();
    assert_eq!(loaded.request_timeout_secs, 30);
    assert_eq!(loaded.connect_timeout_secs, WizardConfig::default().connect_timeout_secs);
    if std::env::var_os("CATALOG_WIZARD_DEBOUNCE_MS").is_none() {
        assert_eq!(loaded.debounce_ms, MAX_DEBOUNCE_MS);
    }
}

#[test]
fn malformed_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, "{ not json").unwrap();

    assert!(ConfigManager::with_path(&path).load().is_err());
}

#[test]
fn oversized_debounce_is_clamped() {
    let config = WizardConfig::default().with_debounce(Duration::MAX);
    assert_eq!(config.debounce_ms, MAX_DEBOUNCE_MS);
    assert_eq!(config.debounce(), Duration::from_millis(MAX_DEBOUNCE_MS));
}
