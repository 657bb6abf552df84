use artroute_model::{CreatedPipeline, ExecutionRequest};
use tracing::{debug, warn};

use crate::{
    error::{Result, RouteError, SubmissionErrors},
    ports::PipelineSubmitter,
};

/// Result of submitting every execution request for one analysis request.
#[derive(Debug, Default)]
pub struct SubmissionReport {
    pub created: Vec<CreatedPipeline>,
    pub failures: SubmissionErrors,
}

impl SubmissionReport {
    /// Collapses the report: any failure becomes one aggregated error, even
    /// when other submissions went through.
    pub fn into_result(self) -> Result<Vec<CreatedPipeline>> {
        if self.failures.is_empty() {
            Ok(self.created)
        } else {
            Err(RouteError::Submissions(self.failures))
        }
    }
}

/// Submits each request independently. A failed submission never stops the
/// remaining ones and nothing already created is rolled back.
pub async fn submit_all(
    api: &dyn PipelineSubmitter,
    requests: Vec<ExecutionRequest>,
) -> SubmissionReport {
    let mut report = SubmissionReport::default();
    for request in requests {
        match api.create_pipeline(&request).await {
            Ok(created) => {
                debug!(
                    target: "artroute::dispatch",
                    pipeline = %created.name,
                    namespace = %created.namespace,
                    "pipeline created"
                );
                report.created.push(created);
            }
            Err(err) => {
                warn!(
                    target: "artroute::dispatch",
                    namespace = %request.namespace,
                    profile = %request.profile_ref.name,
                    error = %err,
                    "pipeline submission failed"
                );
                report.failures.push(err);
            }
        }
    }
    report
}
