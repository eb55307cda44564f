//! Server-level integration tests: configuration layering and database
//! bootstrap against a temporary directory.

use mcp_server::config::Config;
use mcp_server::setup::ensure_database_directory_from_config;

#[test]
fn default_configuration_is_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.server_address(), "127.0.0.1:3000");
    assert!(config.workflow.directory().is_none());
}

#[test]
fn database_directory_is_created_on_demand() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("data").join("orchestrator.sqlite");

    let mut config = Config::default();
    config.database.url = Some(format!("sqlite://{}", db_path.display()));

    ensure_database_directory_from_config(&config).unwrap();
    assert!(db_path.parent().unwrap().exists());

    // Idempotent on the second call.
    ensure_database_directory_from_config(&config).unwrap();
}

#[test]
fn invalid_database_scheme_is_rejected() {
    let mut config = Config::default();
    config.database.url = Some("postgres://nope".to_string());
    assert!(config.validate().is_err());
}

#[test]
fn workflow_dir_flows_into_config() {
    let mut config = Config::default();
    config.workflow.dir = "/etc/orchestrator".to_string();
    assert_eq!(
        config.workflow.directory().unwrap().to_string_lossy(),
        "/etc/orchestrator"
    );
}
