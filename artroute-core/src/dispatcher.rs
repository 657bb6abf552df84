//! The single consumer of the analysis bus.
//!
//! For every request the dispatcher parses the reference, resolves the
//! artifact, lists the namespace's routing rules, matches, builds and submits,
//! strictly one request at a time. Failures are scoped to the request that
//! caused them; only cancellation stops the loop.

use std::{fmt, sync::Arc};

use artroute_model::{AnalysisRequest, ArtifactDescriptor, CreatedPipeline};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::{
    builder::build_execution_request,
    bus::AnalysisInbox,
    error::{Result, RouteError},
    matcher::match_rules,
    ports::{ArtifactResolver, PipelineSubmitter, RuleStore},
    reference::parse_reference,
    submitter::submit_all,
};

/// Why [`Dispatcher::run`] returned.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StopReason {
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Cancelled => f.write_str("dispatcher cancelled"),
        }
    }
}

/// Collaborators the dispatcher drives for each request.
#[derive(Clone)]
pub struct DispatcherPorts {
    pub resolver: Arc<dyn ArtifactResolver>,
    pub rules: Arc<dyn RuleStore>,
    pub pipelines: Arc<dyn PipelineSubmitter>,
}

impl DispatcherPorts {
    pub fn new(
        resolver: Arc<dyn ArtifactResolver>,
        rules: Arc<dyn RuleStore>,
        pipelines: Arc<dyn PipelineSubmitter>,
    ) -> Self {
        Self {
            resolver,
            rules,
            pipelines,
        }
    }
}

impl fmt::Debug for DispatcherPorts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherPorts")
            .field("resolver", &"ArtifactResolver")
            .field("rules", &"RuleStore")
            .field("pipelines", &"PipelineSubmitter")
            .finish()
    }
}

/// What one analysis request produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub descriptor: ArtifactDescriptor,
    pub pipelines: Vec<CreatedPipeline>,
}

#[derive(Debug)]
pub struct Dispatcher {
    inbox: AnalysisInbox,
    ports: DispatcherPorts,
}

impl Dispatcher {
    pub fn new(inbox: AnalysisInbox, ports: DispatcherPorts) -> Self {
        Self { inbox, ports }
    }

    /// Consumes the bus until `shutdown` fires.
    ///
    /// Cancellation is observed between requests; a request already taken off
    /// the bus runs to completion first.
    pub async fn run(mut self, shutdown: CancellationToken) -> StopReason {
        info!(target: "artroute::dispatch", "dispatcher started");
        let mut producers_gone = false;
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!(target: "artroute::dispatch", "dispatcher shutting down");
                    return StopReason::Cancelled;
                }
                next = self.inbox.recv(), if !producers_gone => next,
            };

            let Some(request) = next else {
                // No producer can reach the bus any more; idle until told
                // to stop rather than exiting on our own.
                info!(
                    target: "artroute::dispatch",
                    "all producers disconnected; waiting for shutdown"
                );
                producers_gone = true;
                continue;
            };

            self.handle(request).await;
        }
    }

    async fn handle(&self, request: AnalysisRequest) {
        let span = info_span!(
            target: "artroute::dispatch",
            "dispatch",
            request_id = %Uuid::now_v7(),
            namespace = %request.namespace,
            image_reference = %request.image_reference,
        );
        async {
            info!(target: "artroute::dispatch", "scheduling analysis");
            match self.schedule(&request).await {
                Ok(outcome) => info!(
                    target: "artroute::dispatch",
                    media_type = %outcome.descriptor.media_type,
                    pipelines = outcome.pipelines.len(),
                    "analysis scheduled"
                ),
                Err(RouteError::Submissions(failures)) => {
                    for cause in failures.errors() {
                        error!(
                            target: "artroute::dispatch",
                            error = %cause,
                            "pipeline submission failed"
                        );
                    }
                    error!(
                        target: "artroute::dispatch",
                        failed = failures.len(),
                        "unable to schedule analysis"
                    );
                }
                Err(err) => error!(
                    target: "artroute::dispatch",
                    error = %err,
                    "unable to schedule analysis"
                ),
            }
        }
        .instrument(span)
        .await
    }

    /// Runs the full routing sequence for one request.
    pub async fn schedule(
        &self,
        request: &AnalysisRequest,
    ) -> Result<DispatchOutcome> {
        let artifact = parse_reference(&request.image_reference)?;
        let descriptor = self.ports.resolver.resolve(&artifact).await?;
        let rules = self.ports.rules.list_rules(&request.namespace).await?;

        let requests: Vec<_> = match_rules(&descriptor, &rules)
            .iter()
            .map(|matched| {
                build_execution_request(matched, &artifact, &request.namespace)
            })
            .collect();
        info!(
            target: "artroute::dispatch",
            rules = rules.len(),
            matched = requests.len(),
            "routing rules evaluated"
        );

        let pipelines = submit_all(self.ports.pipelines.as_ref(), requests)
            .await
            .into_result()?;
        Ok(DispatchOutcome {
            descriptor,
            pipelines,
        })
    }
}
