use serde::{Deserialize, Serialize};

/// A request to route one artifact through the namespace's routing rules.
///
/// Created by an ingestion adapter and consumed exactly once by the
/// dispatcher. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub image_reference: String,
    pub namespace: String,
}

impl AnalysisRequest {
    pub fn new(
        image_reference: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            image_reference: image_reference.into(),
            namespace: namespace.into(),
        }
    }
}
