//! TLS termination for the ingestion server.
//!
//! Certificates and keys are PEM files. Keys may be PKCS#8 or PKCS#1 (RSA).

use artroute_config::TlsConfig;
use axum_server::tls_rustls::RustlsConfig;
use rustls::{ServerConfig, crypto::ring};
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use std::{io::BufReader, path::Path, sync::Arc};

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("Certificate file not found: {}", .0.display())]
    CertificateNotFound(std::path::PathBuf),

    #[error("Private key file not found: {}", .0.display())]
    PrivateKeyNotFound(std::path::PathBuf),

    #[error("Failed to parse certificate: {0}")]
    CertificateParseFailed(String),

    #[error("Failed to parse private key: {0}")]
    PrivateKeyParseFailed(String),

    #[error("No private keys found in file")]
    NoPrivateKeysFound,

    #[error("Multiple private keys found, expected one")]
    MultiplePrivateKeysFound,

    #[error("TLS configuration error: {0}")]
    ConfigurationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Builds the rustls server configuration, advertising HTTP/2 and HTTP/1.1.
pub async fn load_rustls_config(tls: &TlsConfig) -> Result<ServerConfig, TlsError> {
    let cert_chain = load_certificates(&tls.cert_path).await?;
    let private_key = load_private_key(&tls.key_path).await?;

    let mut config = ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| TlsError::ConfigurationError(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(cert_chain, private_key)
        .map_err(|e| TlsError::ConfigurationError(e.to_string()))?;

    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(config)
}

/// axum-server acceptor configuration for the given certificate pair.
pub async fn create_tls_acceptor(tls: &TlsConfig) -> Result<RustlsConfig, TlsError> {
    let config = load_rustls_config(tls).await?;
    Ok(RustlsConfig::from_config(Arc::new(config)))
}

async fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    if !path.exists() {
        return Err(TlsError::CertificateNotFound(path.to_path_buf()));
    }

    let pem_data = tokio::fs::read(path).await?;
    let mut reader = BufReader::new(&pem_data[..]);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsError::CertificateParseFailed(e.to_string()))?;

    if certs.is_empty() {
        return Err(TlsError::CertificateParseFailed(
            "No certificates found in file".to_string(),
        ));
    }

    Ok(certs)
}

async fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    if !path.exists() {
        return Err(TlsError::PrivateKeyNotFound(path.to_path_buf()));
    }

    let pem_data = tokio::fs::read(path).await?;

    let mut reader = BufReader::new(&pem_data[..]);
    let pkcs8 = rustls_pemfile::pkcs8_private_keys(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsError::PrivateKeyParseFailed(e.to_string()))?;
    if !pkcs8.is_empty() {
        return single_key(pkcs8.into_iter().map(PrivateKeyDer::from));
    }

    let mut reader = BufReader::new(&pem_data[..]);
    let rsa = rustls_pemfile::rsa_private_keys(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsError::PrivateKeyParseFailed(e.to_string()))?;
    single_key(rsa.into_iter().map(PrivateKeyDer::from))
}

fn single_key(
    mut keys: impl Iterator<Item = PrivateKeyDer<'static>>,
) -> Result<PrivateKeyDer<'static>, TlsError> {
    let key = keys.next().ok_or(TlsError::NoPrivateKeysFound)?;
    if keys.next().is_some() {
        return Err(TlsError::MultiplePrivateKeysFound);
    }
    Ok(key)
}
