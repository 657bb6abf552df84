use serde::{Deserialize, Serialize};

use crate::rule::ResourceRef;

/// What a pipeline run operates on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Canonical repository name of the artifact.
    pub identifier: String,
    /// Tag or digest the artifact was resolved with.
    pub version: String,
}

/// A fully-formed request to create one pipeline run.
///
/// Built fresh per matched rule and handed to the orchestration API; nothing
/// mutates it after submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub generated_name_prefix: String,
    pub namespace: String,
    pub profile_ref: ResourceRef,
    pub downloader_ref: ResourceRef,
    pub target: Target,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds_after_finished: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds_max_lifetime: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_service_account_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_service_account_name: Option<String>,
}

/// Identity of a pipeline accepted by the orchestration API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPipeline {
    pub name: String,
    pub namespace: String,
}
