//! Kubernetes API access: listing routing rules and creating pipelines.

pub mod resources;

use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use artroute_model::{CreatedPipeline, ExecutionRequest, RoutingRule};
use async_trait::async_trait;
use reqwest::{Certificate, Client, RequestBuilder, Response, header::AUTHORIZATION};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::{
    error::{Result, RouteError},
    ports::{PipelineSubmitter, RuleStore},
};

use self::resources::{
    ApiStatus, CreatedResource, MappingResource, PIPELINES_GROUP,
    PIPELINES_RESOURCE, PIPELINES_VERSION, PipelineResource, RULES_GROUP,
    RULES_RESOURCE, RULES_VERSION, ResourceList,
};

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Connection settings for [`KubeClient`]. Unset fields fall back to the
/// in-cluster service account.
#[derive(Clone, Debug)]
pub struct KubeOptions {
    pub api_server: Option<String>,
    pub token_file: Option<PathBuf>,
    pub ca_file: Option<PathBuf>,
    pub insecure_skip_tls_verify: bool,
    pub timeout: Duration,
    /// Page size used when listing routing rules.
    pub list_page_size: u32,
}

impl Default for KubeOptions {
    fn default() -> Self {
        Self {
            api_server: None,
            token_file: None,
            ca_file: None,
            insecure_skip_tls_verify: false,
            timeout: Duration::from_secs(30),
            list_page_size: 250,
        }
    }
}

/// Minimal REST client for the two API calls the router needs.
pub struct KubeClient {
    client: Client,
    base: Url,
    token_file: Option<PathBuf>,
    list_page_size: u32,
}

impl fmt::Debug for KubeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeClient")
            .field("base", &self.base.as_str())
            .field("token_file", &self.token_file)
            .field("list_page_size", &self.list_page_size)
            .finish()
    }
}

impl KubeClient {
    pub fn new(options: KubeOptions) -> Result<Self> {
        let base = match options.api_server {
            Some(server) => server,
            None => in_cluster_server()?,
        };
        let base = Url::parse(&base).map_err(|e| {
            RouteError::InvalidConfig(format!("invalid Kubernetes API server {base}: {e}"))
        })?;

        let default_sa_file = |name: &str| {
            let path = Path::new(SERVICE_ACCOUNT_DIR).join(name);
            path.exists().then_some(path)
        };
        let token_file = options.token_file.or_else(|| default_sa_file("token"));
        let ca_file = options.ca_file.or_else(|| default_sa_file("ca.crt"));

        let mut builder = Client::builder().timeout(options.timeout);
        if let Some(ca_file) = &ca_file {
            let pem = std::fs::read(ca_file)?;
            let certificate = Certificate::from_pem(&pem).map_err(|e| {
                RouteError::InvalidConfig(format!(
                    "invalid CA bundle {}: {e}",
                    ca_file.display()
                ))
            })?;
            builder = builder.add_root_certificate(certificate);
        }
        if options.insecure_skip_tls_verify {
            warn!("TLS verification disabled for the Kubernetes API server");
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build().map_err(|e| {
            RouteError::Internal(format!("failed to build Kubernetes client: {e}"))
        })?;

        Ok(Self {
            client,
            base,
            token_file,
            list_page_size: options.list_page_size.max(1),
        })
    }

    fn collection_url(
        &self,
        group: &str,
        version: &str,
        namespace: &str,
        resource: &str,
    ) -> std::result::Result<Url, String> {
        if namespace.is_empty() {
            return Err("namespace is empty".to_string());
        }
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| format!("API server URL {} cannot be a base", self.base))?
            .pop_if_empty()
            .extend(["apis", group, version, "namespaces", namespace, resource]);
        Ok(url)
    }

    /// Attaches the service-account token, re-read per call so rotated
    /// projected tokens are picked up.
    async fn authorized(
        &self,
        request: RequestBuilder,
    ) -> std::result::Result<RequestBuilder, String> {
        match &self.token_file {
            Some(path) => {
                let token = tokio::fs::read_to_string(path).await.map_err(|e| {
                    format!("unable to read token file {}: {e}", path.display())
                })?;
                Ok(request.header(AUTHORIZATION, format!("Bearer {}", token.trim())))
            }
            None => Ok(request),
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> std::result::Result<T, String> {
        let response = self
            .authorized(request)
            .await?
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;
        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| format!("invalid response body: {e}"))
    }
}

fn in_cluster_server() -> Result<String> {
    let host = std::env::var("KUBERNETES_SERVICE_HOST").map_err(|_| {
        RouteError::InvalidConfig(
            "no Kubernetes API server configured and KUBERNETES_SERVICE_HOST is unset"
                .to_string(),
        )
    })?;
    let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".into());
    let host = if host.contains(':') {
        format!("[{host}]")
    } else {
        host
    };
    Ok(format!("https://{host}:{port}"))
}

async fn check_status(response: Response) -> std::result::Result<Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ApiStatus>(&body)
        .ok()
        .and_then(|status| match (status.reason, status.message) {
            (Some(reason), Some(message)) => Some(format!("{reason}: {message}")),
            (None, Some(message)) => Some(message),
            _ => None,
        })
        .unwrap_or_else(|| body.chars().take(200).collect());
    Err(format!("API server returned {status}: {detail}"))
}

#[async_trait]
impl RuleStore for KubeClient {
    async fn list_rules(&self, namespace: &str) -> Result<Vec<RoutingRule>> {
        let listing = |message: String| RouteError::RuleListing {
            namespace: namespace.to_string(),
            message,
        };

        let mut rules = Vec::new();
        let mut continue_token: Option<String> = None;
        loop {
            let mut url = self
                .collection_url(RULES_GROUP, RULES_VERSION, namespace, RULES_RESOURCE)
                .map_err(listing)?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("limit", &self.list_page_size.to_string());
                if let Some(token) = &continue_token {
                    query.append_pair("continue", token);
                }
            }

            let page: ResourceList<MappingResource> =
                self.send_json(self.client.get(url)).await.map_err(listing)?;
            for item in page.items {
                let name = item.metadata.name.clone();
                match item.into_rule(namespace) {
                    Ok(rule) => rules.push(rule),
                    Err(err) => warn!(
                        rule = %name,
                        namespace = %namespace,
                        error = %err,
                        "ignoring malformed routing rule"
                    ),
                }
            }

            match page.metadata.continue_token.filter(|token| !token.is_empty()) {
                Some(token) => continue_token = Some(token),
                None => break,
            }
        }

        debug!(namespace = %namespace, rules = rules.len(), "listed routing rules");
        Ok(rules)
    }
}

#[async_trait]
impl PipelineSubmitter for KubeClient {
    async fn create_pipeline(
        &self,
        request: &ExecutionRequest,
    ) -> Result<CreatedPipeline> {
        let submission = |message: String| RouteError::Submission {
            namespace: request.namespace.clone(),
            message,
        };

        let url = self
            .collection_url(
                PIPELINES_GROUP,
                PIPELINES_VERSION,
                &request.namespace,
                PIPELINES_RESOURCE,
            )
            .map_err(submission)?;
        let body = PipelineResource::from(request);
        let created: CreatedResource = self
            .send_json(self.client.post(url).json(&body))
            .await
            .map_err(submission)?;

        Ok(CreatedPipeline {
            name: created.metadata.name,
            namespace: created
                .metadata
                .namespace
                .unwrap_or_else(|| request.namespace.clone()),
        })
    }
}
