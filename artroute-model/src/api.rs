use serde::{Deserialize, Serialize};

use crate::request::AnalysisRequest;

/// Route of the HTTP analysis endpoint.
pub const ANALYZE_PATH: &str = "/artroute/v1beta1/artifacts/analyze";

/// Queue message attribute naming the target namespace.
pub const NAMESPACE_ATTRIBUTE: &str = "namespace";
/// Queue message attribute carrying the artifact reference.
pub const IMAGE_URI_ATTRIBUTE: &str = "image_uri";

/// Body accepted by the HTTP analysis endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeArtifactRequest {
    #[serde(rename = "imageURI")]
    pub image_uri: String,
    pub namespace: String,
}

impl From<AnalyzeArtifactRequest> for AnalysisRequest {
    fn from(request: AnalyzeArtifactRequest) -> Self {
        AnalysisRequest::new(request.image_uri, request.namespace)
    }
}

/// JSON envelope returned by every ingestion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn message(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
            response: None,
        }
    }
}
