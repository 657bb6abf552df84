//! JSON shapes exchanged with the Kubernetes API server.

use artroute_model::{
    DownloaderSource, ExecutionRequest, ModelError, ProfileSource, ResourceRef,
    RoutingRule, RoutingRuleSpec, RoutingRuleStatus, SubResourceStatus, Target,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const RULES_GROUP: &str = "artroute.ocular.crashoverride.run";
pub const RULES_VERSION: &str = "v1beta1";
pub const RULES_RESOURCE: &str = "artifactmediatypemappings";

pub const PIPELINES_GROUP: &str = "ocular.crashoverride.run";
pub const PIPELINES_VERSION: &str = "v1beta1";
pub const PIPELINES_RESOURCE: &str = "pipelines";
pub const PIPELINE_KIND: &str = "Pipeline";

#[derive(Debug, Default, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListMeta {
    #[serde(default, rename = "continue")]
    pub continue_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResourceList<T> {
    #[serde(default)]
    pub metadata: ListMeta,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LocalObjectReference {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSourceWire {
    pub value: Option<Value>,
    pub value_from: Option<LocalObjectReference>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloaderSourceWire {
    pub value: Option<Value>,
    pub value_from: Option<ResourceRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingSpec {
    #[serde(default)]
    pub media_types: Vec<String>,
    #[serde(default)]
    pub profile: ProfileSourceWire,
    pub downloader: Option<DownloaderSourceWire>,
    pub scan_service_account_name: Option<String>,
    pub upload_service_account_name: Option<String>,
    pub ttl_seconds_after_finished: Option<i32>,
    pub ttl_seconds_max_lifetime: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MappingStatus {
    pub profile: Option<SubResourceStatus>,
    pub downloader: Option<SubResourceStatus>,
}

/// One `ArtifactMediaTypeMapping` object as listed by the API server.
#[derive(Debug, Deserialize)]
pub struct MappingResource {
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: MappingSpec,
    #[serde(default)]
    pub status: MappingStatus,
}

impl MappingResource {
    pub fn into_rule(self, namespace: &str) -> Result<RoutingRule, ModelError> {
        let MappingSpec {
            media_types,
            profile,
            downloader,
            scan_service_account_name,
            upload_service_account_name,
            ttl_seconds_after_finished,
            ttl_seconds_max_lifetime,
        } = self.spec;

        let profile = ProfileSource::from_parts(
            profile.value,
            profile.value_from.map(|reference| reference.name),
        )?;
        let downloader = match downloader {
            Some(wire) => DownloaderSource::from_parts(wire.value, wire.value_from)?,
            None => None,
        };

        Ok(RoutingRule {
            name: self.metadata.name,
            namespace: self
                .metadata
                .namespace
                .unwrap_or_else(|| namespace.to_string()),
            spec: RoutingRuleSpec {
                media_types,
                profile,
                downloader,
                scan_service_account_name: non_empty(scan_service_account_name),
                upload_service_account_name: non_empty(upload_service_account_name),
                ttl_seconds_after_finished,
                ttl_seconds_max_lifetime,
            },
            status: RoutingRuleStatus {
                profile: self.status.profile,
                downloader: self.status.downloader,
            },
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewObjectMeta<'a> {
    pub generate_name: &'a str,
    pub namespace: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSpec<'a> {
    pub profile_ref: &'a ResourceRef,
    pub downloader_ref: &'a ResourceRef,
    pub target: &'a Target,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds_after_finished: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds_max_lifetime: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_service_account_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_service_account_name: Option<&'a str>,
}

/// Body of a pipeline creation call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResource<'a> {
    pub api_version: String,
    pub kind: &'static str,
    pub metadata: NewObjectMeta<'a>,
    pub spec: PipelineSpec<'a>,
}

impl<'a> From<&'a ExecutionRequest> for PipelineResource<'a> {
    fn from(request: &'a ExecutionRequest) -> Self {
        Self {
            api_version: format!("{PIPELINES_GROUP}/{PIPELINES_VERSION}"),
            kind: PIPELINE_KIND,
            metadata: NewObjectMeta {
                generate_name: &request.generated_name_prefix,
                namespace: &request.namespace,
            },
            spec: PipelineSpec {
                profile_ref: &request.profile_ref,
                downloader_ref: &request.downloader_ref,
                target: &request.target,
                ttl_seconds_after_finished: request.ttl_seconds_after_finished,
                ttl_seconds_max_lifetime: request.ttl_seconds_max_lifetime,
                scan_service_account_name: request.scan_service_account_name.as_deref(),
                upload_service_account_name: request
                    .upload_service_account_name
                    .as_deref(),
            },
        }
    }
}

/// Object returned by a successful create.
#[derive(Debug, Deserialize)]
pub struct CreatedResource {
    #[serde(default)]
    pub metadata: ObjectMeta,
}

/// `Status` object the API server returns alongside failures.
#[derive(Debug, Default, Deserialize)]
pub struct ApiStatus {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}
