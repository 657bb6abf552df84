use artroute_model::{ArtifactReference, ExecutionRequest, Target};

use crate::matcher::MatchedRule;

/// Prefix handed to the orchestration API, which appends a unique suffix.
pub const GENERATED_NAME_PREFIX: &str = "artroute-";

/// Maps a matched rule and the resolved artifact into a pipeline request.
///
/// Profile and downloader references come from the rule's status, never its
/// spec. TTLs and service accounts are copied as-is; unset fields stay unset
/// so orchestration-side defaults apply.
pub fn build_execution_request(
    matched: &MatchedRule<'_>,
    artifact: &ArtifactReference,
    namespace: &str,
) -> ExecutionRequest {
    let spec = &matched.rule.spec;
    ExecutionRequest {
        generated_name_prefix: GENERATED_NAME_PREFIX.to_string(),
        namespace: namespace.to_string(),
        profile_ref: matched.profile.clone(),
        downloader_ref: matched.downloader.clone(),
        target: Target {
            identifier: artifact.canonical_name(),
            version: artifact.identifier().to_string(),
        },
        ttl_seconds_after_finished: spec.ttl_seconds_after_finished,
        ttl_seconds_max_lifetime: spec.ttl_seconds_max_lifetime,
        scan_service_account_name: spec.scan_service_account_name.clone(),
        upload_service_account_name: spec.upload_service_account_name.clone(),
    }
}
