//! Cleanup guarantees and phase ordering across requests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;

use courier_core::{
    resolver::ResolverError,
    task::OrchestratorSettings,
    testing::{fixtures, MockConverter, MockGateway, MockGenerationBackend, MockResolver},
    FailureKind, Outcome, PhaseCallback, RequestKind, RetryPolicy, TaskOrchestrator, TaskPhase,
};

fn orchestrator(
    resolver: &MockResolver,
    converter: &MockConverter,
    gateway: &MockGateway,
    root: &TempDir,
) -> TaskOrchestrator {
    let settings = OrchestratorSettings::default()
        .with_workspace_root(root.path())
        .with_ceiling(1900)
        .with_retry(RetryPolicy::default().with_initial_delay(Duration::from_millis(1)));
    TaskOrchestrator::new(
        Arc::new(resolver.clone()),
        Arc::new(converter.clone()),
        Arc::new(gateway.clone()),
        Arc::new(MockGenerationBackend::new()),
        settings,
    )
}

fn is_empty(root: &TempDir) -> bool {
    std::fs::read_dir(root.path()).unwrap().next().is_none()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_phase_callback_sees_every_phase_in_order() {
    let (resolver, converter, gateway) = (MockResolver::new(), MockConverter::new(), MockGateway::new());
    let root = TempDir::new().unwrap();

    let seen: Arc<Mutex<Vec<TaskPhase>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: PhaseCallback = Arc::new(move |_id: &str, phase: TaskPhase| sink.lock().unwrap().push(phase));
    let orchestrator = orchestrator(&resolver, &converter, &gateway, &root).with_phase_callback(callback);

    let report = orchestrator
        .run(fixtures::request(RequestKind::Audio, "sanam re"))
        .await;

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen, report.phases);
    assert!(seen.windows(2).all(|pair| pair[0] < pair[1]), "phases went backwards: {:?}", seen);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_request_still_reaches_cleanup() {
    let (resolver, converter, gateway) = (MockResolver::new(), MockConverter::new(), MockGateway::new());
    resolver.fail_all_fetches(true);
    let root = TempDir::new().unwrap();
    let orchestrator = orchestrator(&resolver, &converter, &gateway, &root);

    let report = orchestrator
        .run(fixtures::request(RequestKind::Audio, "sanam re"))
        .await;

    assert_eq!(report.outcome.failure_kind(), Some(FailureKind::NoMatchingStream));
    assert_eq!(
        &report.phases[report.phases.len() - 2..],
        &[TaskPhase::Cleanup, TaskPhase::Terminal]
    );
    // Every audio selector was tried once; partial files were left behind
    // by each and all of them are gone now.
    assert_eq!(resolver.fetch_calls().len(), 5);
    assert!(report.cleanup.is_some());
    assert!(is_empty(&root));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_partial_files_discarded_before_next_format() {
    let (resolver, converter, gateway) = (MockResolver::new(), MockConverter::new(), MockGateway::new());
    resolver.script_fetch(
        "bestaudio[ext=m4a]",
        vec![ResolverError::FormatUnavailable {
            format: "bestaudio[ext=m4a]".to_string(),
            message: "Requested format is not available".to_string(),
        }],
    );
    let root = TempDir::new().unwrap();
    let orchestrator = orchestrator(&resolver, &converter, &gateway, &root);

    let report = orchestrator
        .run(fixtures::request(RequestKind::Audio, "sanam re"))
        .await;

    assert!(report.outcome.is_success(), "unexpected {:?}", report.outcome);
    assert_eq!(
        resolver.fetch_calls(),
        vec!["bestaudio[ext=m4a]".to_string(), "bestaudio[ext=webm]".to_string()]
    );
    let deliveries = gateway.recorded_deliveries();
    assert_eq!(deliveries[0].dir_files, vec!["abc123.mp3".to_string()]);
    assert!(report.abandoned_specs().contains(&"fetch:bestaudio[ext=m4a]".to_string()));
    assert!(is_empty(&root));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_transient_fetch_failure_retried_on_same_format() {
    let (resolver, converter, gateway) = (MockResolver::new(), MockConverter::new(), MockGateway::new());
    resolver.script_fetch(
        "bestaudio[ext=m4a]",
        vec![ResolverError::Network {
            message: "connection reset".to_string(),
        }],
    );
    let root = TempDir::new().unwrap();
    let orchestrator = orchestrator(&resolver, &converter, &gateway, &root);

    let report = orchestrator
        .run(fixtures::request(RequestKind::Audio, "sanam re"))
        .await;

    assert!(report.outcome.is_success());
    assert_eq!(
        resolver.fetch_calls(),
        vec!["bestaudio[ext=m4a]".to_string(), "bestaudio[ext=m4a]".to_string()]
    );
    assert!(report.abandoned_specs().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_requests_do_not_share_files() {
    let (resolver, converter, gateway) = (MockResolver::new(), MockConverter::new(), MockGateway::new());
    converter.set_delay(Duration::from_millis(20));
    let root = TempDir::new().unwrap();
    let orchestrator = orchestrator(&resolver, &converter, &gateway, &root);

    let (first, second) = tokio::join!(
        orchestrator.run(fixtures::request(RequestKind::Audio, "sanam re")),
        orchestrator.run(fixtures::request(RequestKind::Audio, "sanam re")),
    );

    assert!(first.outcome.is_success());
    assert!(second.outcome.is_success());
    assert_ne!(first.request_id, second.request_id);

    let deliveries = gateway.recorded_deliveries();
    assert_eq!(deliveries.len(), 2);
    for delivery in &deliveries {
        assert_eq!(delivery.dir_files, vec!["abc123.mp3".to_string()]);
    }
    assert!(is_empty(&root));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_link_delivery_failure_cleans_up() {
    let (resolver, converter, gateway) = (MockResolver::new(), MockConverter::new(), MockGateway::new());
    resolver.set_fetch_size(2500);
    converter.set_output_size(2100);
    gateway.set_next_deliver_error(courier_core::delivery::DeliveryError::rejected(400, "Bad Request"));
    let root = TempDir::new().unwrap();
    let orchestrator = orchestrator(&resolver, &converter, &gateway, &root);

    let report = orchestrator
        .run(fixtures::request(RequestKind::Video, "some clip"))
        .await;

    assert!(matches!(
        report.outcome,
        Outcome::Failed {
            kind: FailureKind::DeliveryFailure,
            ..
        }
    ));
    assert!(is_empty(&root));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dropped_caller_leaves_no_files_behind() {
    let (resolver, converter, gateway) = (MockResolver::new(), MockConverter::new(), MockGateway::new());
    converter.set_delay(Duration::from_millis(400));
    let root = TempDir::new().unwrap();
    let orchestrator = orchestrator(&resolver, &converter, &gateway, &root);

    // The caller gives up while the worker is still normalizing.
    let abandoned = tokio::time::timeout(
        Duration::from_millis(150),
        orchestrator.run(fixtures::request(RequestKind::Audio, "sanam re")),
    )
    .await;
    assert!(abandoned.is_err());
    assert!(!is_empty(&root));

    let mut waited = Duration::ZERO;
    while !is_empty(&root) && waited < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        waited += Duration::from_millis(50);
    }
    assert!(is_empty(&root), "orphaned files under {:?}", root.path());
    assert!(gateway.recorded_deliveries().is_empty());
}
