use std::fs;

use isa_config::{Config, ConfigError, ConfigManager};
use rust_decimal_macros::dec;
use tempfile::tempdir;

#[test]
fn default_config_uses_uk_allowances() {
    let cfg = Config::default();

    assert_eq!(cfg.currency, "GBP");
    assert_eq!(cfg.annual_allowance, dec!(20000));
    assert_eq!(cfg.lifetime_allowance, dec!(4000));
    assert!(cfg.last_level.is_none());
    assert!(cfg.validate().is_ok());
}

#[test]
fn config_manager_persists_and_loads_config() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");

    let mut cfg = Config::default();
    cfg.set_value("annual_allowance", "25000").expect("set allowance");
    cfg.last_level = Some(3);

    manager.save(&cfg).expect("save config");
    let loaded = manager.load().expect("load config");

    assert_eq!(loaded, cfg);
    let raw = fs::read_to_string(manager.config_path()).unwrap();
    assert!(raw.contains("\"annual_allowance\": \"25000\""));
}

#[test]
fn missing_fields_fall_back_to_defaults() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");
    fs::write(
        manager.config_path(),
        r#"{"locale":"en-GB","currency":"GBP"}"#,
    )
    .unwrap();

    let loaded = manager.load().expect("load config");
    assert_eq!(loaded.history_years, 5);
    assert!(loaded.ui_color_enabled);
    assert_eq!(loaded.annual_allowance, dec!(20000));
}

#[test]
fn invalid_values_are_rejected_without_changing_config() {
    let mut cfg = Config::default();
    let err = cfg.set_value("lifetime_allowance", "30000").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }));
    assert_eq!(cfg.lifetime_allowance, dec!(4000));

    assert!(matches!(
        cfg.set_value("colour", "on"),
        Err(ConfigError::UnknownKey(_))
    ));
    assert!(cfg.set_value("history_years", "-1").is_err());
    cfg.set_value("ui_color_enabled", "off").unwrap();
    assert_eq!(cfg.get_value("ui_color_enabled").unwrap(), "false");
}

#[test]
fn backups_list_newest_first_and_restore() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");
    fs::write(
        manager.backups_dir().join("config_20200101_000000.json"),
        serde_json::to_string(&Config::default()).unwrap(),
    )
    .unwrap();

    let mut cfg = Config::default();
    cfg.locale = "cy-GB".into();
    let name = manager.backup(&cfg, Some("Before edit")).expect("backup");
    assert!(name.ends_with("_before-edit.json"));

    let backups = manager.list_backups().expect("list");
    assert_eq!(backups.len(), 2);
    assert_eq!(backups[0], name);

    let restored = manager.restore(&name).expect("restore");
    assert_eq!(restored.locale, "cy-GB");
    assert!(manager.restore("config_missing.json").is_err());
}
