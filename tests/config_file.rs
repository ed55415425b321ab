use std::path::PathBuf;

use session_refresh::config::read_config;
use session_refresh::{Config, ConfigLocation, Error};

fn write_config(contents: &serde_json::Value) -> PathBuf {
    let mut cfg_path = std::env::temp_dir();
    cfg_path.push(format!("session-config-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(&cfg_path, serde_json::to_string(contents).unwrap()).unwrap();
    cfg_path
}

#[tokio::test]
async fn reads_config_file_with_seed_tokens() {
    let cfg_path = write_config(&serde_json::json!({
        "base_url": "https://docs.example.com/api/",
        "refresh_path": "/auth/refresh-token",
        "timeout_secs": 10,
        "access_token": "T1",
        "refresh_token": "R1"
    }));

    let config = read_config(ConfigLocation::File(cfg_path.to_string_lossy().to_string()))
        .await
        .expect("config loads");

    assert_eq!(config.normalized_base_url(), "https://docs.example.com/api");
    assert_eq!(config.login_path, "/auth/login");
    assert_eq!(config.refresh_path, "/auth/refresh-token");
    assert_eq!(config.timeout().as_secs(), 10);
    assert_eq!(config.refresh_token.as_deref(), Some("R1"));
    std::fs::remove_file(cfg_path).ok();
}

#[test]
fn missing_base_url_is_a_json_error() {
    let cfg_path = write_config(&serde_json::json!({ "refresh_path": "/auth/refresh" }));
    assert!(matches!(Config::from_file(&cfg_path), Err(Error::Json(_))));
    std::fs::remove_file(cfg_path).ok();
}

#[test]
fn missing_file_is_an_io_error() {
    let path = std::env::temp_dir().join("session-config-does-not-exist.json");
    assert!(matches!(Config::from_file(path), Err(Error::Io(_))));
}
