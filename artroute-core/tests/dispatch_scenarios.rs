use std::{collections::HashMap, sync::Arc, time::Duration};

use artroute_core::{
    Dispatcher, DispatcherPorts, RouteError, StopReason, analysis_bus,
    builder::GENERATED_NAME_PREFIX,
    model::{
        AnalysisRequest, ArtifactDescriptor, ArtifactReference, CreatedPipeline,
        ExecutionRequest, ProfileSource, ResourceRef, RoutingRule, RoutingRuleSpec,
        RoutingRuleStatus, SubResourceStatus,
    },
    ports::{ArtifactResolver, PipelineSubmitter, RuleStore},
};
use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

const MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
const CHALK: &str = "application/git.chalk.v1beta+tgz";

/// Serves a fixed media type per canonical name and records lookups.
#[derive(Debug, Default)]
struct StaticRegistry {
    media_types: HashMap<String, String>,
    lookups: AsyncMutex<Vec<String>>,
}

impl StaticRegistry {
    fn with(mut self, canonical_name: &str, media_type: &str) -> Self {
        self.media_types
            .insert(canonical_name.to_string(), media_type.to_string());
        self
    }
}

#[async_trait]
impl ArtifactResolver for StaticRegistry {
    async fn resolve(
        &self,
        reference: &ArtifactReference,
    ) -> artroute_core::Result<ArtifactDescriptor> {
        self.lookups.lock().await.push(reference.to_string());
        match self.media_types.get(&reference.canonical_name()) {
            Some(media_type) => Ok(ArtifactDescriptor::new(reference, media_type.clone())),
            None => Err(RouteError::Resolution {
                reference: reference.to_string(),
                message: "manifest unknown".into(),
            }),
        }
    }
}

/// Rules per namespace; listing the `forbidden` namespace fails.
#[derive(Debug, Default)]
struct StaticRules {
    by_namespace: HashMap<String, Vec<RoutingRule>>,
}

const FORBIDDEN_NAMESPACE: &str = "forbidden";

#[async_trait]
impl RuleStore for StaticRules {
    async fn list_rules(&self, namespace: &str) -> artroute_core::Result<Vec<RoutingRule>> {
        if namespace == FORBIDDEN_NAMESPACE {
            return Err(RouteError::RuleListing {
                namespace: namespace.to_string(),
                message: "403 Forbidden".into(),
            });
        }
        Ok(self.by_namespace.get(namespace).cloned().unwrap_or_default())
    }
}

/// Records every submission; the first `fail_first` calls are rejected.
#[derive(Debug, Default)]
struct RecordingOrchestrator {
    fail_first: usize,
    submitted: AsyncMutex<Vec<ExecutionRequest>>,
}

#[async_trait]
impl PipelineSubmitter for RecordingOrchestrator {
    async fn create_pipeline(
        &self,
        request: &ExecutionRequest,
    ) -> artroute_core::Result<CreatedPipeline> {
        let mut submitted = self.submitted.lock().await;
        submitted.push(request.clone());
        if submitted.len() <= self.fail_first {
            return Err(RouteError::Submission {
                namespace: request.namespace.clone(),
                message: "admission webhook denied the request".into(),
            });
        }
        Ok(CreatedPipeline {
            name: format!("{}{}", request.generated_name_prefix, submitted.len()),
            namespace: request.namespace.clone(),
        })
    }
}

fn rule(name: &str, media_types: &[&str], available: bool) -> RoutingRule {
    let status = |reference: &str| {
        if available {
            SubResourceStatus::available(ResourceRef::named(reference))
        } else {
            SubResourceStatus::unavailable()
        }
    };
    RoutingRule {
        name: name.into(),
        namespace: "ns1".into(),
        spec: RoutingRuleSpec::new(
            media_types.iter().map(|m| m.to_string()).collect(),
            ProfileSource::Reference(format!("{name}-profile")),
        ),
        status: RoutingRuleStatus {
            profile: Some(status(&format!("{name}-profile"))),
            downloader: Some(status("oci")),
        },
    }
}

struct Harness {
    registry: Arc<StaticRegistry>,
    orchestrator: Arc<RecordingOrchestrator>,
    ports: DispatcherPorts,
}

fn harness(rules: Vec<RoutingRule>, fail_first: usize) -> Harness {
    let registry = Arc::new(
        StaticRegistry::default()
            .with("index.docker.io/library/alpine", MANIFEST)
            .with("ghcr.io/org/chalked", CHALK),
    );
    let orchestrator = Arc::new(RecordingOrchestrator {
        fail_first,
        ..Default::default()
    });
    let store = Arc::new(StaticRules {
        by_namespace: HashMap::from([("ns1".to_string(), rules)]),
    });
    let ports = DispatcherPorts::new(registry.clone(), store, orchestrator.clone());
    Harness {
        registry,
        orchestrator,
        ports,
    }
}

fn dispatcher(ports: DispatcherPorts) -> Dispatcher {
    let (_client, inbox) = analysis_bus();
    Dispatcher::new(inbox, ports)
}

#[tokio::test]
async fn namespace_without_rules_submits_nothing() {
    let h = harness(Vec::new(), 0);
    let outcome = dispatcher(h.ports.clone())
        .schedule(&AnalysisRequest::new("alpine:3.20", "empty-ns"))
        .await
        .expect("schedule");
    assert!(outcome.pipelines.is_empty());
    assert!(h.orchestrator.submitted.lock().await.is_empty());
}

#[tokio::test]
async fn unavailable_rule_never_submits() {
    let h = harness(vec![rule("gated", &[MANIFEST], false)], 0);
    let outcome = dispatcher(h.ports.clone())
        .schedule(&AnalysisRequest::new("alpine", "ns1"))
        .await
        .expect("schedule");
    assert!(outcome.pipelines.is_empty());
    assert!(h.orchestrator.submitted.lock().await.is_empty());
}

#[tokio::test]
async fn matching_rule_submits_one_request_for_the_canonical_name() {
    let h = harness(vec![rule("images", &[MANIFEST, MANIFEST], true)], 0);
    let outcome = dispatcher(h.ports.clone())
        .schedule(&AnalysisRequest::new("alpine:3.20", "ns1"))
        .await
        .expect("schedule");

    assert_eq!(outcome.descriptor.media_type, MANIFEST);
    assert_eq!(outcome.pipelines.len(), 1);

    let submitted = h.orchestrator.submitted.lock().await;
    assert_eq!(submitted.len(), 1);
    let request = &submitted[0];
    assert_eq!(request.target.identifier, "index.docker.io/library/alpine");
    assert_eq!(request.target.version, "3.20");
    assert_eq!(request.generated_name_prefix, GENERATED_NAME_PREFIX);
    assert_eq!(request.profile_ref.name, "images-profile");
    assert_eq!(request.downloader_ref.name, "oci");
}

#[tokio::test]
async fn independent_rules_fan_out() {
    let h = harness(
        vec![rule("sbom", &[MANIFEST], true), rule("secrets", &[MANIFEST], true)],
        0,
    );
    let outcome = dispatcher(h.ports.clone())
        .schedule(&AnalysisRequest::new("alpine", "ns1"))
        .await
        .expect("schedule");
    assert_eq!(outcome.pipelines.len(), 2);
}

#[tokio::test]
async fn other_media_type_yields_no_submission() {
    let h = harness(vec![rule("images", &[MANIFEST], true)], 0);
    let outcome = dispatcher(h.ports.clone())
        .schedule(&AnalysisRequest::new("ghcr.io/org/chalked:v1", "ns1"))
        .await
        .expect("schedule");
    assert_eq!(outcome.descriptor.media_type, CHALK);
    assert!(h.orchestrator.submitted.lock().await.is_empty());
}

#[tokio::test]
async fn unparseable_reference_stops_before_resolution() {
    let h = harness(vec![rule("images", &[MANIFEST], true)], 0);
    let err = dispatcher(h.ports.clone())
        .schedule(&AnalysisRequest::new("Not A Reference", "ns1"))
        .await
        .expect_err("parse failure");
    assert!(matches!(err, RouteError::InvalidReference { .. }));
    assert!(h.registry.lookups.lock().await.is_empty());
}

#[tokio::test]
async fn resolution_failure_is_reported() {
    let h = harness(vec![rule("images", &[MANIFEST], true)], 0);
    let err = dispatcher(h.ports.clone())
        .schedule(&AnalysisRequest::new("ghcr.io/org/missing:v1", "ns1"))
        .await
        .expect_err("resolution failure");
    assert!(matches!(err, RouteError::Resolution { .. }));
    assert!(h.orchestrator.submitted.lock().await.is_empty());
}

#[tokio::test]
async fn rule_listing_failure_submits_nothing() {
    let h = harness(vec![rule("images", &[MANIFEST], true)], 0);
    let err = dispatcher(h.ports.clone())
        .schedule(&AnalysisRequest::new("alpine", FORBIDDEN_NAMESPACE))
        .await
        .expect_err("listing failure");
    assert!(
        matches!(&err, RouteError::RuleListing { namespace, .. } if namespace == FORBIDDEN_NAMESPACE),
        "unexpected error: {err}"
    );
    assert!(h.orchestrator.submitted.lock().await.is_empty());
}

#[tokio::test]
async fn loop_continues_after_rule_listing_failure() {
    let h = harness(vec![rule("images", &[MANIFEST], true)], 0);
    let (client, inbox) = analysis_bus();
    let shutdown = CancellationToken::new();
    let running = tokio::spawn(Dispatcher::new(inbox, h.ports.clone()).run(shutdown.clone()));

    client
        .analyze("alpine", FORBIDDEN_NAMESPACE)
        .await
        .expect("first accepted");
    client.analyze("alpine", "ns1").await.expect("second accepted");

    tokio::time::timeout(Duration::from_secs(2), async {
        while h.orchestrator.submitted.lock().await.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("second request processed");

    shutdown.cancel();
    running.await.expect("dispatcher task");

    let submitted = h.orchestrator.submitted.lock().await;
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].namespace, "ns1");
}

#[tokio::test]
async fn partial_fan_out_keeps_successes_and_aggregates_failures() {
    let h = harness(
        vec![rule("sbom", &[MANIFEST], true), rule("secrets", &[MANIFEST], true)],
        1,
    );
    let err = dispatcher(h.ports.clone())
        .schedule(&AnalysisRequest::new("alpine", "ns1"))
        .await
        .expect_err("aggregated failure");
    let RouteError::Submissions(failures) = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        &failures.errors()[0],
        RouteError::Submission { namespace, message }
            if namespace == "ns1" && message.contains("admission webhook")
    ));
    assert_eq!(h.orchestrator.submitted.lock().await.len(), 2);
}

#[tokio::test]
async fn loop_survives_failed_submission_and_stops_on_cancel() {
    let h = harness(vec![rule("images", &[MANIFEST], true)], 1);
    let (client, inbox) = analysis_bus();
    let shutdown = CancellationToken::new();
    let running = tokio::spawn(Dispatcher::new(inbox, h.ports.clone()).run(shutdown.clone()));

    client.analyze("alpine", "ns1").await.expect("first accepted");
    client.analyze("alpine", "ns1").await.expect("second accepted");

    tokio::time::timeout(Duration::from_secs(2), async {
        while h.orchestrator.submitted.lock().await.len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("both requests processed");

    shutdown.cancel();
    let reason = tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .expect("dispatcher stopped")
        .expect("dispatcher task");
    assert_eq!(reason, StopReason::Cancelled);

    let rejected = client.analyze("alpine", "ns1").await;
    assert!(matches!(rejected, Err(RouteError::BusClosed)));
}

#[tokio::test]
async fn dispatcher_idles_after_producers_leave() {
    let h = harness(Vec::new(), 0);
    let (client, inbox) = analysis_bus();
    drop(client);
    let shutdown = CancellationToken::new();
    let running = tokio::spawn(Dispatcher::new(inbox, h.ports).run(shutdown.clone()));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!running.is_finished());

    shutdown.cancel();
    let reason = tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .expect("dispatcher stopped")
        .expect("dispatcher task");
    assert_eq!(reason, StopReason::Cancelled);
}
