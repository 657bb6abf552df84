//! Builds the dispatcher's collaborators from resolved configuration.

use std::sync::Arc;

use artroute_config::{Config, KubernetesConfig, RegistryConfig};
use artroute_core::{
    DispatcherPorts, KubeClient, KubeOptions, RegistryOptions, RegistryResolver,
};
use tracing::info;

pub fn registry_options(config: &RegistryConfig) -> RegistryOptions {
    RegistryOptions {
        insecure: config.insecure.clone(),
        timeout: config.timeout,
        docker_config: config.docker_config.clone(),
    }
}

pub fn kube_options(config: &KubernetesConfig) -> KubeOptions {
    KubeOptions {
        api_server: config.api_server.clone(),
        token_file: config.token_file.clone(),
        ca_file: config.ca_file.clone(),
        insecure_skip_tls_verify: config.insecure_skip_tls_verify,
        list_page_size: config.list_page_size,
        ..KubeOptions::default()
    }
}

/// The registry resolver plus one Kubernetes client serving as both rule
/// store and pipeline submitter.
pub fn build_ports(config: &Config) -> artroute_core::Result<DispatcherPorts> {
    let resolver = Arc::new(RegistryResolver::new(registry_options(&config.registry))?);
    info!(
        insecure_registries = config.registry.insecure.len(),
        timeout = ?config.registry.timeout,
        docker_config = ?config.registry.docker_config,
        "registry resolver ready"
    );

    let kube = Arc::new(KubeClient::new(kube_options(&config.kubernetes))?);
    info!(
        api_server = ?config.kubernetes.api_server,
        list_page_size = config.kubernetes.list_page_size,
        "kubernetes client ready"
    );

    Ok(DispatcherPorts::new(resolver, kube.clone(), kube))
}
