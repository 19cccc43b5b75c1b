use memring::config::{Config, ConfigError};

#[tokio::test]
async fn test_load_from_yaml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cluster.yaml");
    let yaml = r#"
servers: ["127.0.0.1:11211", "127.0.0.1:11212"]
initial_connections: 5
read_timeout_ms: 500
write_timeout_ms: 500
rehash: false
replicas: 10
recovery_interval_secs: 15
"#;
    std::fs::write(&path, yaml).unwrap();

    let config = Config::from_yaml_file(path.to_str().unwrap())
        .await
        .expect("Failed to load config file");

    assert_eq!(config.servers.len(), 2);
    assert_eq!(config.initial_connections, 5);
    assert_eq!(config.read_timeout_ms, 500);
    assert_eq!(config.write_timeout_ms, 500);
    assert!(!config.rehash);
    assert_eq!(config.replicas, 10);
    assert_eq!(config.recovery_interval_secs, 15);
}

#[tokio::test]
async fn test_missing_file_is_io_error() {
    let result = Config::from_yaml_file("/nonexistent/cluster.yaml").await;
    assert!(matches!(result, Err(ConfigError::IoError(_))));
}

#[test]
fn test_malformed_yaml_is_parse_error() {
    let result = Config::from_yaml_str("servers: [not closed");
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn test_empty_server_list_is_rejected() {
    let result = Config::from_yaml_str("servers: []");
    assert!(matches!(result, Err(ConfigError::NoServers)));
}

#[test]
fn test_zero_pool_size_is_rejected() {
    let yaml = r#"
servers: ["127.0.0.1:11211"]
initial_connections: 0
"#;
    let result = Config::from_yaml_str(yaml);
    assert!(matches!(
        result,
        Err(ConfigError::InvalidValue("initial_connections"))
    ));
}
