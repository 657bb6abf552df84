use std::sync::Arc;

use artroute_core::{
    RegistryOptions, RegistryResolver, RouteError, ports::ArtifactResolver,
    reference::parse_reference,
};
use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{HeaderMap, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tokio::{net::TcpListener, sync::Mutex};

const MANIFEST_PATH: &str = "/v2/team/app/manifests/{reference}";
const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";

/// Binds a loopback listener, builds the router with the bound address and
/// serves it in the background.
async fn fake_registry(build: impl FnOnce(String) -> Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = format!("127.0.0.1:{}", listener.local_addr().expect("addr").port());
    let router = build(address.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("fake registry");
    });
    address
}

fn resolver() -> RegistryResolver {
    RegistryResolver::new(RegistryOptions::default()).expect("resolver")
}

#[tokio::test]
async fn media_type_comes_from_content_type() {
    let address = fake_registry(|_| {
        Router::new().route(
            MANIFEST_PATH,
            get(|| async {
                (
                    [
                        ("content-type", "application/vnd.oci.image.manifest.v1+json; charset=utf-8"),
                        ("docker-content-digest", "sha256:1234"),
                    ],
                    r#"{"schemaVersion":2}"#,
                )
            }),
        )
    })
    .await;

    let reference = parse_reference(&format!("{address}/team/app:v1")).expect("reference");
    let descriptor = resolver().resolve(&reference).await.expect("descriptor");

    assert_eq!(descriptor.media_type, OCI_MANIFEST);
    assert_eq!(descriptor.canonical_name, format!("{address}/team/app"));
    assert_eq!(descriptor.identifier, "v1");
    assert_eq!(descriptor.digest.as_deref(), Some("sha256:1234"));
    assert_eq!(descriptor.size, Some(19));
}

#[tokio::test]
async fn manifest_body_is_used_without_content_type() {
    let address = fake_registry(|_| {
        Router::new().route(
            MANIFEST_PATH,
            get(|| async {
                Response::new(Body::from(
                    json!({"schemaVersion": 2, "mediaType": OCI_MANIFEST}).to_string(),
                ))
            }),
        )
    })
    .await;

    let reference = parse_reference(&format!("{address}/team/app")).expect("reference");
    let descriptor = resolver().resolve(&reference).await.expect("descriptor");
    assert_eq!(descriptor.media_type, OCI_MANIFEST);
    assert_eq!(descriptor.identifier, "latest");
}

#[derive(Clone)]
struct TokenState {
    realm: String,
    token_queries: Arc<Mutex<Vec<String>>>,
}

async fn bearer_manifest(State(state): State<TokenState>, headers: HeaderMap) -> Response {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some("Bearer tok-123");
    if !authorized {
        let challenge = format!(
            r#"Bearer realm="{}",service="fake-registry",scope="repository:team/app:pull""#,
            state.realm
        );
        return (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, challenge)],
        )
            .into_response();
    }
    ([(header::CONTENT_TYPE, OCI_MANIFEST)], "{}").into_response()
}

async fn issue_token(State(state): State<TokenState>, uri: Uri) -> Json<serde_json::Value> {
    state
        .token_queries
        .lock()
        .await
        .push(uri.query().unwrap_or_default().to_string());
    Json(json!({"token": "tok-123"}))
}

#[tokio::test]
async fn bearer_challenge_is_answered_with_a_token() {
    let token_queries = Arc::new(Mutex::new(Vec::new()));
    let queries = token_queries.clone();
    let address = fake_registry(move |address| {
        let state = TokenState {
            realm: format!("http://{address}/token"),
            token_queries: queries,
        };
        Router::new()
            .route(MANIFEST_PATH, get(bearer_manifest))
            .route("/token", get(issue_token))
            .with_state(state)
    })
    .await;

    let reference = parse_reference(&format!("{address}/team/app:v1")).expect("reference");
    let descriptor = resolver().resolve(&reference).await.expect("descriptor");
    assert_eq!(descriptor.media_type, OCI_MANIFEST);

    let queries = token_queries.lock().await;
    assert_eq!(queries.len(), 1);
    assert!(queries[0].contains("service=fake-registry"));
    assert!(queries[0].contains("scope=repository%3Ateam%2Fapp%3Apull"));
}

#[tokio::test]
async fn basic_challenge_uses_docker_config_credentials() {
    let address = fake_registry(|_| {
        Router::new().route(
            MANIFEST_PATH,
            get(|headers: HeaderMap| async move {
                // user:pass
                let expected = "Basic dXNlcjpwYXNz";
                match headers.get(header::AUTHORIZATION) {
                    Some(value) if value == expected => {
                        ([(header::CONTENT_TYPE, OCI_MANIFEST)], "{}").into_response()
                    }
                    _ => (
                        StatusCode::UNAUTHORIZED,
                        [(header::WWW_AUTHENTICATE, r#"Basic realm="fake""#)],
                    )
                        .into_response(),
                }
            }),
        )
    })
    .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("config.json");
    let mut auths = serde_json::Map::new();
    auths.insert(address.clone(), json!({"auth": "dXNlcjpwYXNz"}));
    std::fs::write(&config, json!({"auths": auths}).to_string()).expect("write docker config");

    let resolver = RegistryResolver::new(RegistryOptions {
        docker_config: Some(config),
        ..Default::default()
    })
    .expect("resolver");
    let reference = parse_reference(&format!("{address}/team/app:v1")).expect("reference");
    let descriptor = resolver.resolve(&reference).await.expect("descriptor");
    assert_eq!(descriptor.media_type, OCI_MANIFEST);
}

#[tokio::test]
async fn basic_challenge_without_credentials_fails() {
    let address = fake_registry(|_| {
        Router::new().route(
            MANIFEST_PATH,
            get(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    [(header::WWW_AUTHENTICATE, r#"Basic realm="fake""#)],
                )
            }),
        )
    })
    .await;

    let reference = parse_reference(&format!("{address}/team/app:v1")).expect("reference");
    let err = resolver().resolve(&reference).await.expect_err("no credentials");
    assert!(
        matches!(&err, RouteError::Resolution { message, .. } if message.contains("credentials")),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn missing_manifest_is_a_resolution_error() {
    let address = fake_registry(|_| {
        Router::new().route(
            MANIFEST_PATH,
            get(|| async { (StatusCode::NOT_FOUND, "manifest unknown") }),
        )
    })
    .await;

    let reference = parse_reference(&format!("{address}/team/app:v9")).expect("reference");
    let err = resolver().resolve(&reference).await.expect_err("missing manifest");
    match err {
        RouteError::Resolution { reference, message } => {
            assert_eq!(reference, format!("{address}/team/app:v9"));
            assert!(message.contains("404"), "message was {message}");
            assert!(message.contains("manifest unknown"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
