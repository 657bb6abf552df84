use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::util::{non_empty_var, parse_bool_var, parse_csv_var, path_var};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub registry: FileRegistryConfig,
    #[serde(default)]
    pub kubernetes: FileKubernetesConfig,
    pub sqs: Option<FileSqsConfig>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default)]
    pub tls: FileTlsConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileTlsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_path: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileRegistryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure: Option<Vec<String>>,
    /// Humantime string, e.g. `"30s"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_config: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileKubernetesConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure_skip_tls_verify: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_page_size: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileSqsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_backoff: Option<String>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub tls_cert_path: Option<PathBuf>,
    pub tls_key_path: Option<PathBuf>,
    pub registry_insecure: Option<Vec<String>>,
    pub registry_timeout: Option<String>,
    pub docker_config: Option<PathBuf>,
    pub kubernetes_api_server: Option<String>,
    pub kubernetes_token_file: Option<PathBuf>,
    pub kubernetes_ca_file: Option<PathBuf>,
    pub kubernetes_insecure_skip_tls_verify: Option<bool>,
    pub sqs_queue_url: Option<String>,
    pub sqs_region: Option<String>,
    pub sqs_endpoint: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            config_path: path_var("ARTROUTE_CONFIG"),
            server_host: non_empty_var("SERVER_HOST"),
            server_port: non_empty_var("SERVER_PORT").and_then(|s| s.parse().ok()),
            tls_cert_path: path_var("TLS_CERT_PATH"),
            tls_key_path: path_var("TLS_KEY_PATH"),
            registry_insecure: parse_csv_var("REGISTRY_INSECURE"),
            registry_timeout: non_empty_var("REGISTRY_TIMEOUT"),
            // Docker's own variable names a directory holding config.json.
            docker_config: path_var("DOCKER_CONFIG").map(|path| {
                if path.is_dir() {
                    path.join("config.json")
                } else {
                    path
                }
            }),
            kubernetes_api_server: non_empty_var("KUBERNETES_API_SERVER"),
            kubernetes_token_file: path_var("KUBERNETES_TOKEN_FILE"),
            kubernetes_ca_file: path_var("KUBERNETES_CA_FILE"),
            kubernetes_insecure_skip_tls_verify: parse_bool_var(
                "KUBERNETES_INSECURE_SKIP_TLS_VERIFY",
            ),
            sqs_queue_url: non_empty_var("SQS_QUEUE_URL"),
            sqs_region: non_empty_var("SQS_REGION"),
            sqs_endpoint: non_empty_var("SQS_ENDPOINT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_config_reads_nested_tables() {
        let parsed: FileConfig = toml::from_str(
            r#"
            [server]
            port = 8443

            [server.tls]
            cert_path = "/etc/artroute/tls.crt"
            key_path = "/etc/artroute/tls.key"

            [registry]
            insecure = ["registry.internal:5000"]
            timeout = "10s"

            [sqs]
            queue_url = "https://sqs.us-east-1.amazonaws.com/123/artifacts"
            wait_time = "15s"
            "#,
        )
        .expect("parse file config");

        assert_eq!(parsed.server.port, Some(8443));
        assert_eq!(
            parsed.server.tls.key_path,
            Some(PathBuf::from("/etc/artroute/tls.key"))
        );
        assert_eq!(parsed.registry.timeout.as_deref(), Some("10s"));
        let sqs = parsed.sqs.expect("sqs table");
        assert_eq!(sqs.wait_time.as_deref(), Some("15s"));
        assert_eq!(sqs.region, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let parsed = toml::from_str::<FileConfig>("[server]\nprot = 1\n");
        assert!(parsed.is_err());
    }
}
