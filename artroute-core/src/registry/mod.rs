//! Artifact resolution against OCI distribution registries.

pub mod auth;

use std::{fmt, path::PathBuf, time::Duration};

use artroute_model::{ArtifactDescriptor, ArtifactReference};
use async_trait::async_trait;
use reqwest::{
    Client, Response, StatusCode,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE},
};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::{
    error::{Result, RouteError},
    ports::ArtifactResolver,
};

use self::auth::{Challenge, CredentialStore};

pub const OCI_IMAGE_INDEX: &str = "application/vnd.oci.image.index.v1+json";
pub const OCI_IMAGE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const DOCKER_MANIFEST_LIST: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";
pub const DOCKER_MANIFEST_V2: &str =
    "application/vnd.docker.distribution.manifest.v2+json";
pub const DOCKER_MANIFEST_V1_SIGNED: &str =
    "application/vnd.docker.distribution.manifest.v1+prettyjws";

const ACCEPTED_MANIFESTS: [&str; 5] = [
    OCI_IMAGE_INDEX,
    OCI_IMAGE_MANIFEST,
    DOCKER_MANIFEST_LIST,
    DOCKER_MANIFEST_V2,
    DOCKER_MANIFEST_V1_SIGNED,
];

const DOCKER_CONTENT_DIGEST: &str = "docker-content-digest";

/// Connection settings for [`RegistryResolver`].
#[derive(Clone, Debug)]
pub struct RegistryOptions {
    /// Registries reached over plain HTTP in addition to loopback hosts.
    pub insecure: Vec<String>,
    /// Per-request timeout, token exchange included.
    pub timeout: Duration,
    /// Docker `config.json` supplying basic credentials per registry.
    pub docker_config: Option<PathBuf>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            insecure: Vec::new(),
            timeout: Duration::from_secs(30),
            docker_config: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestEnvelope {
    media_type: Option<String>,
}

/// Resolves artifact descriptors with a manifest `GET`, negotiating bearer
/// tokens when the registry asks for them.
pub struct RegistryResolver {
    client: Client,
    insecure: Vec<String>,
    credentials: CredentialStore,
}

impl fmt::Debug for RegistryResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryResolver")
            .field("insecure", &self.insecure)
            .field("credentials_loaded", &!self.credentials.is_empty())
            .finish()
    }
}

impl RegistryResolver {
    pub fn new(options: RegistryOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.timeout)
            .user_agent(concat!("artroute/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                RouteError::Internal(format!("failed to build registry client: {e}"))
            })?;
        let credentials = match &options.docker_config {
            Some(path) => CredentialStore::from_docker_config(path)?,
            None => CredentialStore::default(),
        };
        Ok(Self {
            client,
            insecure: options.insecure,
            credentials,
        })
    }

    fn scheme_for(&self, registry: &str) -> &'static str {
        let host = registry.split(':').next().unwrap_or(registry);
        let loopback = host == "localhost" || host.starts_with("127.");
        if loopback || self.insecure.iter().any(|entry| entry == registry) {
            "http"
        } else {
            "https"
        }
    }

    fn manifest_url(&self, reference: &ArtifactReference) -> Result<Url> {
        let raw = format!(
            "{}://{}/v2/{}/manifests/{}",
            self.scheme_for(&reference.registry),
            reference.registry,
            reference.repository,
            reference.identifier()
        );
        Url::parse(&raw).map_err(|e| resolution(reference, format!("invalid manifest URL {raw}: {e}")))
    }

    async fn get_manifest(
        &self,
        url: &Url,
        authorization: Option<&str>,
    ) -> reqwest::Result<Response> {
        let mut request = self
            .client
            .get(url.clone())
            .header(ACCEPT, ACCEPTED_MANIFESTS.join(", "));
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }
        request.send().await
    }

    /// Answers a 401 challenge with an `Authorization` header value.
    async fn authorize(
        &self,
        reference: &ArtifactReference,
        challenge: Challenge,
    ) -> Result<String> {
        let credentials = self.credentials.get(&reference.registry);
        match challenge {
            Challenge::Basic => credentials
                .map(|c| c.basic_header())
                .ok_or_else(|| {
                    resolution(reference, "registry requires credentials and none are configured")
                }),
            Challenge::Bearer {
                realm,
                service,
                scope,
            } => {
                let mut token_url = Url::parse(&realm).map_err(|e| {
                    resolution(reference, format!("invalid token realm {realm}: {e}"))
                })?;
                {
                    let mut query = token_url.query_pairs_mut();
                    if let Some(service) = &service {
                        query.append_pair("service", service);
                    }
                    let scope = scope.unwrap_or_else(|| {
                        format!("repository:{}:pull", reference.repository)
                    });
                    query.append_pair("scope", &scope);
                }
                debug!(registry = %reference.registry, realm = %realm, "requesting registry token");

                let mut request = self.client.get(token_url);
                if let Some(credentials) = credentials {
                    request = request.header(AUTHORIZATION, credentials.basic_header());
                }
                let response = request.send().await.map_err(|e| {
                    resolution(reference, format!("token request failed: {e}"))
                })?;
                if !response.status().is_success() {
                    return Err(resolution(
                        reference,
                        format!("token endpoint returned {}", response.status()),
                    ));
                }
                let token: TokenResponse = response.json().await.map_err(|e| {
                    resolution(reference, format!("invalid token response: {e}"))
                })?;
                token
                    .token
                    .or(token.access_token)
                    .filter(|token| !token.is_empty())
                    .map(|token| format!("Bearer {token}"))
                    .ok_or_else(|| resolution(reference, "token endpoint returned no token"))
            }
        }
    }
}

#[async_trait]
impl ArtifactResolver for RegistryResolver {
    async fn resolve(
        &self,
        reference: &ArtifactReference,
    ) -> Result<ArtifactDescriptor> {
        let url = self.manifest_url(reference)?;
        let transport =
            |e: reqwest::Error| resolution(reference, format!("request failed: {e}"));

        let mut response = self.get_manifest(&url, None).await.map_err(transport)?;
        if response.status() == StatusCode::UNAUTHORIZED {
            let challenge = response
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|value| value.to_str().ok())
                .and_then(Challenge::parse)
                .ok_or_else(|| {
                    resolution(reference, "unauthorized without a usable challenge")
                })?;
            let authorization = self.authorize(reference, challenge).await?;
            response = self
                .get_manifest(&url, Some(&authorization))
                .await
                .map_err(transport)?;
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(resolution(
                reference,
                format!("registry returned {status}: {snippet}"),
            ));
        }

        let header_media_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_string())
            .filter(|value| !value.is_empty());
        let digest = response
            .headers()
            .get(DOCKER_CONTENT_DIGEST)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(transport)?;

        let media_type = match header_media_type {
            Some(media_type) => media_type,
            None => serde_json::from_slice::<ManifestEnvelope>(&body)
                .ok()
                .and_then(|manifest| manifest.media_type)
                .ok_or_else(|| resolution(reference, "manifest has no media type"))?,
        };

        let mut descriptor =
            ArtifactDescriptor::new(reference, media_type).with_size(body.len() as u64);
        if let Some(digest) = digest {
            descriptor = descriptor.with_digest(digest);
        }
        debug!(
            artifact = %reference,
            media_type = %descriptor.media_type,
            "resolved artifact descriptor"
        );
        Ok(descriptor)
    }
}

fn resolution(reference: &ArtifactReference, message: impl Into<String>) -> RouteError {
    RouteError::Resolution {
        reference: reference.to_string(),
        message: message.into(),
    }
}
