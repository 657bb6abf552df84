use once_cell::sync::Lazy;
use std::{fs, path::PathBuf, time::Duration};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
    models::{
        Config, ConfigMetadata, DEFAULT_HOST, DEFAULT_LIST_PAGE_SIZE,
        DEFAULT_PORT, DEFAULT_REGISTRY_TIMEOUT, DEFAULT_SQS_ERROR_BACKOFF,
        DEFAULT_SQS_VISIBILITY_TIMEOUT, DEFAULT_SQS_WAIT_TIME,
        KubernetesConfig, RegistryConfig, ServerConfig, SqsConfig, TlsConfig,
    },
    sources::{EnvConfig, FileConfig, FileSqsConfig},
    util::parse_duration,
    validation::{self, ConfigWarnings},
};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("artroute.toml"),
        PathBuf::from("config/artroute.toml"),
    ]
});

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Loads `.env`, then composes file and process environment.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let mut load = self.load_from_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Composes configuration from an already gathered environment.
    pub fn load_from_env(
        &self,
        env: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let (config, warnings) = compose_config(file_config, env, config_path)?;
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        // Explicit and env-provided paths must exist; defaults are optional.
        let (path, required) = match (&self.options.config_path, &env.config_path)
        {
            (Some(explicit), _) => (explicit.clone(), true),
            (None, Some(from_env)) => (from_env.clone(), true),
            (None, None) => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
            {
                Some(found) => (found.clone(), false),
                None => return Ok((None, None)),
            },
        };

        if !path.exists() {
            if required {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let contents =
            fs::read_to_string(&path).map_err(|err| ConfigLoadError::Io {
                path: path.clone(),
                source: err,
            })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
                path: path.clone(),
                source: err,
            })?;
        debug!(path = %path.display(), "loaded configuration file");

        Ok((Some(file_config), Some(path)))
    }
}

fn compose_config(
    file_config: Option<FileConfig>,
    env: EnvConfig,
    config_path: Option<PathBuf>,
) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
    let mut warnings = ConfigWarnings::default();

    if file_config.is_none() {
        warnings.push_with_hint(
            "No artroute.toml detected; using environment variables and defaults",
            "Create artroute.toml or pass --config to point at one",
        );
    }

    let FileConfig {
        server: file_server,
        registry: file_registry,
        kubernetes: file_kubernetes,
        sqs: file_sqs,
    } = file_config.unwrap_or_default();

    let cert_path = env.tls_cert_path.or(file_server.tls.cert_path);
    let key_path = env.tls_key_path.or(file_server.tls.key_path);
    let tls = match (cert_path, key_path) {
        (Some(cert_path), Some(key_path)) => Some(TlsConfig {
            cert_path,
            key_path,
        }),
        (None, None) => None,
        _ => {
            warnings.push_with_hint(
                "Only one of the TLS certificate and key paths is set; serving plain HTTP",
                "Set both server.tls.cert_path and server.tls.key_path",
            );
            None
        }
    };

    let server = ServerConfig {
        host: env
            .server_host
            .or(file_server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: env.server_port.or(file_server.port).unwrap_or(DEFAULT_PORT),
        tls,
    };

    let registry = RegistryConfig {
        insecure: env
            .registry_insecure
            .or(file_registry.insecure)
            .unwrap_or_default(),
        timeout: duration_setting(
            "registry.timeout",
            env.registry_timeout.or(file_registry.timeout),
            DEFAULT_REGISTRY_TIMEOUT,
        )?,
        docker_config: env.docker_config.or(file_registry.docker_config),
    };

    let api_server = env.kubernetes_api_server.or(file_kubernetes.api_server);
    if let Some(server) = &api_server {
        validate_url("kubernetes.api_server", server)?;
    }
    let kubernetes = KubernetesConfig {
        api_server,
        token_file: env.kubernetes_token_file.or(file_kubernetes.token_file),
        ca_file: env.kubernetes_ca_file.or(file_kubernetes.ca_file),
        insecure_skip_tls_verify: env
            .kubernetes_insecure_skip_tls_verify
            .or(file_kubernetes.insecure_skip_tls_verify)
            .unwrap_or(false),
        list_page_size: file_kubernetes
            .list_page_size
            .unwrap_or(DEFAULT_LIST_PAGE_SIZE),
    };

    let sqs = compose_sqs(
        file_sqs,
        env.sqs_queue_url,
        env.sqs_region,
        env.sqs_endpoint,
        &mut warnings,
    )?;

    let mut config = Config {
        server,
        registry,
        kubernetes,
        sqs,
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded: false,
        },
    };

    warnings.extend(validation::apply_guard_rails(&mut config));

    Ok((config, warnings))
}

fn compose_sqs(
    file_sqs: Option<FileSqsConfig>,
    env_queue_url: Option<String>,
    env_region: Option<String>,
    env_endpoint: Option<String>,
    warnings: &mut ConfigWarnings,
) -> Result<Option<SqsConfig>, ConfigLoadError> {
    let file_present = file_sqs.is_some();
    let file = file_sqs.unwrap_or_default();

    let Some(queue_url) = env_queue_url.or(file.queue_url) else {
        if file_present {
            warnings.push_with_hint(
                "[sqs] table present without a queue_url; queue listener disabled",
                "Set sqs.queue_url or SQS_QUEUE_URL",
            );
        }
        return Ok(None);
    };
    validate_url("sqs.queue_url", &queue_url)?;

    let endpoint = env_endpoint.or(file.endpoint);
    if let Some(endpoint) = &endpoint {
        validate_url("sqs.endpoint", endpoint)?;
    }

    Ok(Some(SqsConfig {
        queue_url,
        region: env_region.or(file.region),
        endpoint,
        wait_time: duration_setting(
            "sqs.wait_time",
            file.wait_time,
            DEFAULT_SQS_WAIT_TIME,
        )?,
        visibility_timeout: duration_setting(
            "sqs.visibility_timeout",
            file.visibility_timeout,
            DEFAULT_SQS_VISIBILITY_TIMEOUT,
        )?,
        error_backoff: duration_setting(
            "sqs.error_backoff",
            file.error_backoff,
            DEFAULT_SQS_ERROR_BACKOFF,
        )?,
    }))
}

fn duration_setting(
    field: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    match raw {
        Some(value) => parse_duration(&value).map_err(|source| {
            ConfigLoadError::InvalidDuration {
                field,
                value,
                source,
            }
        }),
        None => Ok(default),
    }
}

fn validate_url(field: &'static str, value: &str) -> Result<(), ConfigLoadError> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|source| ConfigLoadError::InvalidUrl {
            field,
            value: value.to_string(),
            source,
        })
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid duration for {field}: '{value}'")]
    InvalidDuration {
        field: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("invalid URL for {field}: '{value}'")]
    InvalidUrl {
        field: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}
