use std::{path::PathBuf, time::Duration};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_REGISTRY_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_LIST_PAGE_SIZE: u32 = 250;
pub const DEFAULT_SQS_WAIT_TIME: Duration = Duration::from_secs(20);
pub const DEFAULT_SQS_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_SQS_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Fully resolved runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub registry: RegistryConfig,
    pub kubernetes: KubernetesConfig,
    /// Present only when a queue URL is configured.
    pub sqs: Option<SqsConfig>,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            tls: None,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub insecure: Vec<String>,
    pub timeout: Duration,
    pub docker_config: Option<PathBuf>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            insecure: Vec::new(),
            timeout: DEFAULT_REGISTRY_TIMEOUT,
            docker_config: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KubernetesConfig {
    /// Falls back to the in-cluster service host when unset.
    pub api_server: Option<String>,
    pub token_file: Option<PathBuf>,
    pub ca_file: Option<PathBuf>,
    pub insecure_skip_tls_verify: bool,
    pub list_page_size: u32,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            api_server: None,
            token_file: None,
            ca_file: None,
            insecure_skip_tls_verify: false,
            list_page_size: DEFAULT_LIST_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqsConfig {
    pub queue_url: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub wait_time: Duration,
    pub visibility_timeout: Duration,
    pub error_backoff: Duration,
}

impl SqsConfig {
    pub fn new(queue_url: impl Into<String>) -> Self {
        Self {
            queue_url: queue_url.into(),
            region: None,
            endpoint: None,
            wait_time: DEFAULT_SQS_WAIT_TIME,
            visibility_timeout: DEFAULT_SQS_VISIBILITY_TIMEOUT,
            error_backoff: DEFAULT_SQS_ERROR_BACKOFF,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
