//! Core data model definitions shared across artroute crates.
#![allow(missing_docs)]

pub mod api;
pub mod artifact;
pub mod error;
pub mod pipeline;
pub mod request;
pub mod rule;

// Intentionally curated re-exports for downstream consumers.
pub use api::{AnalyzeArtifactRequest, ApiResponse};
pub use artifact::{ArtifactDescriptor, ArtifactReference, ReferenceVersion};
pub use error::{ModelError, Result as ModelResult};
pub use pipeline::{CreatedPipeline, ExecutionRequest, Target};
pub use request::AnalysisRequest;
pub use rule::{
    Availability, DownloaderSource, Parameter, ProfileSource, ResourceRef,
    RoutingRule, RoutingRuleSpec, RoutingRuleStatus, SubResourceStatus,
    Unavailable,
};
