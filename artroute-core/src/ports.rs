//! Contracts for the external collaborators the dispatcher drives.

use artroute_model::{
    ArtifactDescriptor, ArtifactReference, CreatedPipeline, ExecutionRequest,
    RoutingRule,
};
use async_trait::async_trait;

use crate::error::Result;

/// Fetches an artifact's remote descriptor from its registry.
#[async_trait]
pub trait ArtifactResolver: Send + Sync {
    async fn resolve(
        &self,
        reference: &ArtifactReference,
    ) -> Result<ArtifactDescriptor>;
}

/// Lists the routing rules defined in a namespace, including their current
/// status. Implementations must not cache between calls.
#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn list_rules(&self, namespace: &str) -> Result<Vec<RoutingRule>>;
}

/// Creates pipeline runs on the orchestration API.
#[async_trait]
pub trait PipelineSubmitter: Send + Sync {
    async fn create_pipeline(
        &self,
        request: &ExecutionRequest,
    ) -> Result<CreatedPipeline>;
}
