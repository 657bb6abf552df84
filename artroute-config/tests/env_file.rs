use std::{fs, time::Duration};

use artroute_config::ConfigLoader;

#[test]
fn env_file_feeds_environment_layer() {
    let dir = tempfile::tempdir().expect("tempdir");
    let env_path = dir.path().join(".env");
    let config_path = dir.path().join("artroute.toml");

    fs::write(
        &env_path,
        "REGISTRY_INSECURE=registry.lab:5000,localhost:5001\n\
         SQS_QUEUE_URL=http://localhost:4566/000000000000/artifacts\n\
         SQS_ENDPOINT=http://localhost:4566\n",
    )
    .expect("write env file");
    fs::write(
        &config_path,
        "[registry]\ninsecure = [\"ignored:5000\"]\n\n[sqs]\nerror_backoff = \"1s\"\n",
    )
    .expect("write config file");

    let load = ConfigLoader::new()
        .with_env_file(&env_path)
        .with_config_path(&config_path)
        .load()
        .expect("load configuration");
    let config = load.config;

    assert!(config.metadata.env_file_loaded);
    assert_eq!(
        config.registry.insecure,
        vec!["registry.lab:5000".to_string(), "localhost:5001".to_string()]
    );
    let sqs = config.sqs.expect("queue listener enabled");
    assert_eq!(sqs.endpoint.as_deref(), Some("http://localhost:4566"));
    assert_eq!(sqs.error_backoff, Duration::from_secs(1));
}

#[test]
fn missing_env_file_is_not_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("artroute.toml");
    fs::write(&config_path, "[server]\nhost = \"127.0.0.1\"\n").expect("write config");

    let load = ConfigLoader::new()
        .with_env_file(dir.path().join("absent.env"))
        .with_config_path(&config_path)
        .load()
        .expect("load configuration");
    assert!(!load.config.metadata.env_file_loaded);
}
