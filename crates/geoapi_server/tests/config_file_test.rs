//! The shipped configuration file must parse and match the built-in defaults.

use geoapi_server::ServerConfig;

const SHIPPED: &str = include_str!("../../../config/geoapi.toml");

#[test]
fn test_shipped_config_matches_defaults() {
    let config = ServerConfig::from_toml_str(SHIPPED).unwrap();
    config.validate().unwrap();
    assert_eq!(config, ServerConfig::default());
}

#[test]
fn test_load_missing_file() {
    let path = std::env::temp_dir().join("test_geoapi_no_such_config.toml");
    assert!(matches!(
        ServerConfig::load(&path),
        Err(geoapi_server::ServerError::ConfigRead { .. })
    ));
}
