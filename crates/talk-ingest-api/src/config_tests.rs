//! Tests for [`ServiceConfig`] defaults, loading and validation.

use super::*;

fn from_yaml(yaml: &str) -> ServiceConfig {
    config::Config::builder()
        .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
        .build()
        .unwrap()
        .try_deserialize()
        .unwrap()
}

// ============================================================================
// Defaults
// ============================================================================

/// Verify that the default configuration is runnable.
#[test]
fn test_default_config_is_valid() {
    let config = ServiceConfig::default();

    assert!(config.validate().is_ok());
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.webhooks.endpoint_path, "/api/webhook");
    assert_eq!(config.store.backend, StoreBackend::Memory);
    assert!(config.webhooks.enable_test_endpoint);
}

/// Verify that an empty document yields the defaults.
#[test]
fn test_empty_document_uses_defaults() {
    let config: ServiceConfig = serde_json::from_str("{}").unwrap();

    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.max_body_size, 10 * 1024 * 1024);
    assert_eq!(config.store.max_connections, 5);
    assert!(!config.logging.json_format);
}

// ============================================================================
// Loading
// ============================================================================

/// Verify that partial sections keep defaults for missing keys.
#[test]
fn test_partial_yaml_section_merges_with_defaults() {
    let config = from_yaml(
        r#"
server:
  port: 9090
webhooks:
  enable_admin_routes: false
"#,
    );

    assert_eq!(config.server.port, 9090);
    assert_eq!(config.server.host, "0.0.0.0");
    assert!(!config.webhooks.enable_admin_routes);
    assert_eq!(config.webhooks.endpoint_path, "/api/webhook");
}

/// Verify that the store backend parses from lowercase names.
#[test]
fn test_postgres_backend_parses() {
    let config = from_yaml(
        r#"
store:
  backend: postgres
  database_url: postgres://localhost/talk
  max_connections: 10
"#,
    );

    assert_eq!(config.store.backend, StoreBackend::Postgres);
    assert_eq!(
        config.store.database_url.as_deref(),
        Some("postgres://localhost/talk")
    );
    assert_eq!(config.store.max_connections, 10);
    assert!(config.validate().is_ok());
}

// ============================================================================
// Validation
// ============================================================================

/// Verify that port 0 is rejected.
#[test]
fn test_zero_port_is_invalid() {
    let mut config = ServiceConfig::default();
    config.server.port = 0;

    assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
}

/// Verify that a zero body size limit is rejected.
#[test]
fn test_zero_body_size_is_invalid() {
    let mut config = ServiceConfig::default();
    config.server.max_body_size = 0;

    assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
}

/// Verify that relative endpoint paths are rejected.
#[test]
fn test_relative_endpoint_path_is_invalid() {
    let mut config = ServiceConfig::default();
    config.webhooks.endpoint_path = "api/webhook".to_string();

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("api/webhook"));
}

/// Verify that the postgres backend requires a connection string.
#[test]
fn test_postgres_without_url_is_missing_key() {
    let mut config = ServiceConfig::default();
    config.store.backend = StoreBackend::Postgres;

    match config.validate() {
        Err(ConfigError::Missing { key }) => assert_eq!(key, "store.database_url"),
        other => panic!("expected Missing, got: {:?}", other),
    }

    config.store.database_url = Some("   ".to_string());
    assert!(matches!(config.validate(), Err(ConfigError::Missing { .. })));
}

/// Verify that an empty pool is rejected.
#[test]
fn test_zero_pool_size_is_invalid() {
    let mut config = ServiceConfig::default();
    config.store.max_connections = 0;

    assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
}
