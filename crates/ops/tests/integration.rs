//! End-to-end tests for the operations subsystem

use proptest::prelude::*;
use rscoop_config::{
    AutoUpdateConfig, AutoUpdateState, AutoUpdateStore, Config, MultiInstanceWarningConfig,
    UpdateInterval, WarningPatch, WarningStore,
};
use rscoop_errors::{BackendError, Error, OpsError};
use rscoop_events::{
    backend_channel, AppEvent, AutoUpdateEvent, BackendEvent, BackendSender, EventReceiver,
    OperationEvent,
};
use rscoop_ops::{
    CommandBackend, IdGenerator, ManualClock, NewOperation, OperationId, OperationManager,
    OperationResult, OperationStatus, OperationType, OperationsService, OperationsServiceBuilder,
    OutputSource, StartRequest, StepOutcome, WarningCoordinator,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct RecordingBackend {
    started: Mutex<Vec<(OperationId, StartRequest)>>,
    fail_with: Option<String>,
}

impl RecordingBackend {
    fn failing(message: &str) -> Self {
        Self {
            started: Mutex::default(),
            fail_with: Some(message.to_string()),
        }
    }

    fn started(&self) -> Vec<OperationId> {
        self.started
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn requests(&self) -> Vec<StartRequest> {
        self.started
            .lock()
            .unwrap()
            .iter()
            .map(|(_, request)| request.clone())
            .collect()
    }
}

impl CommandBackend for RecordingBackend {
    fn start_operation(&self, id: &OperationId, request: &StartRequest) -> Result<(), Error> {
        if let Some(message) = &self.fail_with {
            return Err(BackendError::LaunchFailed {
                operation: request.title(),
                message: message.clone(),
            }
            .into());
        }
        self.started
            .lock()
            .unwrap()
            .push((id.clone(), request.clone()));
        Ok(())
    }
}

/// Hands out a fixed sequence of ids
#[derive(Debug)]
struct SequenceIds(Mutex<VecDeque<&'static str>>);

impl SequenceIds {
    fn new(ids: &[&'static str]) -> Self {
        Self(Mutex::new(ids.iter().copied().collect()))
    }
}

impl IdGenerator for SequenceIds {
    fn generate(&self, _operation_type: &str) -> OperationId {
        let next = self.0.lock().unwrap().pop_front().unwrap_or("exhausted");
        OperationId::from(next)
    }
}

struct Harness {
    service: OperationsService,
    backend: Arc<RecordingBackend>,
    backend_tx: BackendSender,
    events: EventReceiver,
    clock: ManualClock,
}

const NOW_MS: i64 = 1_700_000_000_000;

fn harness_from(
    backend: RecordingBackend,
    configure: impl FnOnce(OperationsServiceBuilder) -> OperationsServiceBuilder,
) -> Harness {
    let clock = ManualClock::new(NOW_MS);
    let backend = Arc::new(backend);
    let (backend_tx, backend_rx) = backend_channel();
    let (tx, events) = rscoop_events::channel();

    let builder = OperationsService::builder()
        .with_config(Config::default())
        .with_clock(Arc::new(clock.clone()))
        .with_event_sender(tx)
        .with_backend(backend.clone())
        .with_backend_events(backend_rx);

    Harness {
        service: configure(builder).build().unwrap(),
        backend,
        backend_tx,
        events,
        clock,
    }
}

fn harness_with(backend: RecordingBackend, ids: Option<Arc<dyn IdGenerator>>) -> Harness {
    harness_from(backend, |builder| match ids {
        Some(ids) => builder.with_id_generator(ids),
        None => builder,
    })
}

fn auto_update_config(auto_update: AutoUpdateConfig) -> Config {
    Config {
        auto_update,
        ..Config::default()
    }
}

/// Next scheduled-update notification, skipping registry events
async fn next_auto_update(rx: &mut EventReceiver) -> AutoUpdateEvent {
    loop {
        let message = rx.recv().await.expect("event channel closed");
        if let AppEvent::AutoUpdate(event) = message.event {
            return event;
        }
    }
}

fn harness() -> Harness {
    harness_with(RecordingBackend::default(), None)
}

fn operation_events(rx: &mut EventReceiver) -> Vec<OperationEvent> {
    let mut events = Vec::new();
    while let Ok(message) = rx.try_recv() {
        if let AppEvent::Operation(event) = message.event {
            events.push(event);
        }
    }
    events
}

/// Yield until the correlator has caught up with `condition`
async fn settle(condition: impl Fn() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_concurrent_installs_route_output_independently() {
    let mut h = harness();
    let manager = h.service.manager().clone();

    let a = h
        .service
        .start_operation(&StartRequest::for_package(OperationType::Install, "A"))
        .unwrap();
    let b = h
        .service
        .start_operation(&StartRequest::for_package(OperationType::Install, "B"))
        .unwrap();
    assert_ne!(a, b);
    assert_eq!(h.backend.started(), vec![a.clone(), b.clone()]);
    assert_eq!(manager.active_operations_count(), 2);
    assert!(manager.check_multi_instance_warning());

    h.backend_tx.send(BackendEvent::output(a.as_str(), "x", "stdout")).unwrap();
    h.backend_tx.send(BackendEvent::output(b.as_str(), "y", "stdout")).unwrap();
    h.backend_tx.send(BackendEvent::finished(a.as_str(), true, "ok")).unwrap();
    settle(|| manager.get(&a).is_some_and(|op| op.is_terminal())).await;
    settle(|| manager.get(&b).is_some_and(|op| op.output().len() == 1)).await;

    let op_a = manager.get(&a).unwrap();
    let op_b = manager.get(&b).unwrap();
    assert_eq!(op_a.output().iter().map(|o| o.line.as_str()).collect::<Vec<_>>(), ["x"]);
    assert_eq!(op_b.output().iter().map(|o| o.line.as_str()).collect::<Vec<_>>(), ["y"]);
    assert_eq!(op_a.status(), OperationStatus::Success);
    assert_eq!(op_b.status(), OperationStatus::InProgress);
    assert_eq!(manager.active_operations_count(), 1);

    let events = operation_events(&mut h.events);
    assert!(events.iter().any(|e| matches!(
        e,
        OperationEvent::MultiInstanceWarning { active_count: 2, .. }
    )));
    h.service.shutdown().await;
}

#[tokio::test]
async fn test_minimized_operation_stays_active_until_closed() {
    let h = harness();
    let manager = h.service.manager().clone();
    let id = h
        .service
        .start_operation(&StartRequest::new(OperationType::UpdateAll))
        .unwrap();

    assert_eq!(manager.toggle_minimize(&id), Some(true));
    assert_eq!(manager.active_operations_count(), 1);

    h.backend_tx
        .send(BackendEvent::finished(id.as_str(), false, "exit code 1"))
        .unwrap();
    settle(|| manager.get(&id).is_some_and(|op| op.is_terminal())).await;

    let op = manager.get(&id).unwrap();
    assert_eq!(op.status(), OperationStatus::Error);
    assert!(op.is_minimized());
    assert_eq!(manager.active_operations_count(), 1);
    assert_eq!(manager.get_active_operations()[0].id(), &id);

    assert!(manager.remove_operation(&id));
    assert_eq!(manager.active_operations_count(), 0);

    // late events for the closed operation are dropped
    h.backend_tx.send(BackendEvent::output(id.as_str(), "late", "stdout")).unwrap();
    tokio::task::yield_now().await;
    assert!(manager.is_empty());
    h.service.shutdown().await;
}

#[tokio::test]
async fn test_completion_after_closing_running_operation_is_dropped() {
    let mut h = harness();
    let manager = h.service.manager().clone();
    let closed = h
        .service
        .start_operation(&StartRequest::for_package(OperationType::Install, "git"))
        .unwrap();
    let other = h
        .service
        .start_operation(&StartRequest::for_package(OperationType::Install, "7zip"))
        .unwrap();

    assert!(manager.remove_operation(&closed));
    assert_eq!(manager.active_operations_count(), 1);
    operation_events(&mut h.events);

    h.backend_tx
        .send(BackendEvent::finished(closed.as_str(), true, "ok"))
        .unwrap();
    // the correlator handles events in order, so once this lands the stray one was seen
    h.backend_tx
        .send(BackendEvent::output(other.as_str(), "marker", "stdout"))
        .unwrap();
    settle(|| manager.get(&other).is_some_and(|op| op.output().len() == 1)).await;

    assert!(!manager.contains(&closed));
    assert_eq!(manager.len(), 1);
    assert!(!operation_events(&mut h.events)
        .iter()
        .any(|e| matches!(e, OperationEvent::Finished { .. })));

    assert!(manager.remove_operation(&other));
    assert_eq!(manager.active_operations_count(), 0);
    h.service.shutdown().await;
}

#[tokio::test]
async fn test_chatty_operation_truncates_output() {
    let h = harness();
    let manager = h.service.manager().clone();
    let id = h
        .service
        .start_operation(&StartRequest::new(OperationType::Cleanup))
        .unwrap();

    for i in 1..=960 {
        h.backend_tx
            .send(BackendEvent::output(id.as_str(), format!("L{i}"), "stdout"))
            .unwrap();
    }
    h.backend_tx.send(BackendEvent::finished(id.as_str(), true, "done")).unwrap();
    settle(|| manager.get(&id).is_some_and(|op| op.is_terminal())).await;

    let op = manager.get(&id).unwrap();
    let lines: Vec<_> = op.output().iter().map(|o| o.line.clone()).collect();
    assert_eq!(lines.len(), 60);
    assert_eq!(lines.first().map(String::as_str), Some("L901"));
    assert_eq!(lines.last().map(String::as_str), Some("L960"));
    assert_eq!(op.output().omitted(), 900);
    h.service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_reaper_evicts_after_retention() {
    let h = harness();
    let manager = h.service.manager().clone();
    let done = h
        .service
        .start_operation(&StartRequest::for_package(OperationType::Uninstall, "git"))
        .unwrap();
    let running = h
        .service
        .start_operation(&StartRequest::for_package(OperationType::Install, "7zip"))
        .unwrap();
    assert!(manager.set_operation_result(&done, OperationResult::success("ok")));

    // within retention: the first sweep keeps it
    h.clock.advance(Duration::from_secs(200));
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(manager.contains(&done));

    h.clock.advance(Duration::from_secs(101));
    tokio::time::sleep(Duration::from_secs(60)).await;
    settle(|| !manager.contains(&done)).await;
    assert!(manager.contains(&running));
    h.service.shutdown().await;
}

#[tokio::test]
async fn test_launch_failure_finishes_immediately() {
    let h = harness_with(RecordingBackend::failing("program not found"), None);
    let manager = h.service.manager().clone();
    let id = h
        .service
        .start_operation(&StartRequest::for_package(OperationType::Install, "git"))
        .unwrap();

    let op = manager.get(&id).unwrap();
    assert_eq!(op.status(), OperationStatus::Error);
    let summary = &op.result().unwrap().summary;
    assert!(summary.starts_with("Failed to start Installing git: "));
    assert!(summary.contains("program not found"));
    assert_eq!(manager.active_operations_count(), 0);
    h.service.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_id_is_regenerated() {
    let ids: Arc<dyn IdGenerator> = Arc::new(SequenceIds::new(&["op-1", "op-1", "op-2"]));
    let h = harness_with(RecordingBackend::default(), Some(ids));
    let manager = h.service.manager().clone();

    let first = h
        .service
        .start_operation(&StartRequest::new(OperationType::UpdateBuckets))
        .unwrap();
    let second = h
        .service
        .start_operation(&StartRequest::new(OperationType::UpdateBuckets))
        .unwrap();
    assert_eq!(first.as_str(), "op-1");
    assert_eq!(second.as_str(), "op-2");
    assert_eq!(manager.len(), 2);
    h.service.shutdown().await;
}

#[tokio::test]
async fn test_collisions_exhaust_attempts() {
    let ids: Arc<dyn IdGenerator> = Arc::new(SequenceIds::new(&["op-1", "op-1", "op-1", "op-1"]));
    let h = harness_with(RecordingBackend::default(), Some(ids));
    h.service
        .start_operation(&StartRequest::new(OperationType::Cleanup))
        .unwrap();

    let err = h
        .service
        .start_operation(&StartRequest::new(OperationType::Cleanup))
        .unwrap_err();
    assert!(matches!(err, Error::Ops(OpsError::IdSpaceExhausted { attempts: 3 })));
    assert_eq!(h.backend.started().len(), 1);
    h.service.shutdown().await;
}

#[tokio::test]
async fn test_invalid_request_is_rejected() {
    let h = harness();
    let err = h
        .service
        .start_operation(&StartRequest::new(OperationType::Install))
        .unwrap_err();
    assert!(matches!(err, Error::Ops(OpsError::InvalidRequest { .. })));
    assert!(h.service.manager().is_empty());
    h.service.shutdown().await;
}

#[tokio::test]
async fn test_builder_requires_backend() {
    let err = OperationsService::builder().build().unwrap_err();
    assert!(matches!(
        err,
        Error::Ops(OpsError::MissingComponent { ref component }) if component == "backend"
    ));
}

#[tokio::test]
async fn test_warning_dismissal_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store = WarningStore::new(dir.path().join("warning.toml"));

    let warning = WarningCoordinator::load(store.clone(), MultiInstanceWarningConfig::default())
        .await
        .unwrap();
    let manager = OperationManager::new(Arc::new(ManualClock::new(0)), warning, None);
    for name in ["a", "b"] {
        manager
            .add_operation(NewOperation::new(OperationId::from(name), name))
            .unwrap();
    }
    assert!(manager.check_multi_instance_warning());
    manager.dismiss_multi_instance_warning().await.unwrap();
    assert!(!manager.check_multi_instance_warning());

    let reloaded = WarningCoordinator::load(store, MultiInstanceWarningConfig::default())
        .await
        .unwrap();
    assert!(!reloaded.should_warn(5));

    let config = manager
        .update_multi_instance_warning(&WarningPatch {
            enabled: Some(true),
            threshold: Some(3),
            ..WarningPatch::default()
        })
        .await
        .unwrap();
    assert!(!config.dismissed);
    assert!(!manager.check_multi_instance_warning());
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_update_refreshes_buckets_then_packages() {
    let dir = tempfile::tempdir().unwrap();
    let store = AutoUpdateStore::new(dir.path().join("auto_update.toml"));
    // last run half an hour ago
    store
        .save(&AutoUpdateState {
            last_run_ms: Some(NOW_MS - 30 * 60_000),
        })
        .await
        .unwrap();

    let config = auto_update_config(AutoUpdateConfig {
        interval: "1h".parse().unwrap(),
        update_all: true,
        silent: false,
    });
    let mut h = harness_from(RecordingBackend::default(), |builder| {
        builder
            .with_config(config)
            .with_auto_update_store(store.clone())
            .with_scheduled_updates(true)
    });
    let manager = h.service.manager().clone();
    assert!(h.service.is_scheduling_updates());

    tokio::time::sleep(Duration::from_secs(29 * 60)).await;
    assert!(h.backend.started().is_empty());

    tokio::time::sleep(Duration::from_secs(2 * 60)).await;
    assert!(matches!(
        next_auto_update(&mut h.events).await,
        AutoUpdateEvent::RunStarted { update_all: true }
    ));
    let AutoUpdateEvent::StepStarted { id: buckets, operation } = next_auto_update(&mut h.events).await
    else {
        panic!("expected the bucket step to start");
    };
    assert_eq!(operation, OperationType::UpdateBuckets);
    assert_eq!(h.backend.requests()[0].operation_type, OperationType::UpdateBuckets);
    assert!(!manager.get(&buckets).unwrap().is_minimized());

    h.backend_tx
        .send(BackendEvent::finished(buckets.as_str(), true, "ok"))
        .unwrap();
    let AutoUpdateEvent::StepStarted { id: packages, operation } = next_auto_update(&mut h.events).await
    else {
        panic!("expected the package step to start");
    };
    assert_eq!(operation, OperationType::UpdateAll);
    assert_eq!(
        store.load().await.unwrap().last_run_ms,
        Some(NOW_MS),
        "run recorded once buckets finished"
    );

    h.backend_tx
        .send(BackendEvent::finished(packages.as_str(), true, "ok"))
        .unwrap();
    assert!(matches!(
        next_auto_update(&mut h.events).await,
        AutoUpdateEvent::RunFinished { success: true }
    ));

    // the next run waits a full interval
    assert_eq!(h.backend.started().len(), 2);
    tokio::time::sleep(Duration::from_secs(2 * 3_600)).await;
    settle(|| h.backend.started().len() == 3).await;
    h.service.shutdown().await;
}

#[tokio::test]
async fn test_silent_update_stops_after_failed_bucket_refresh() {
    let dir = tempfile::tempdir().unwrap();
    let store = AutoUpdateStore::new(dir.path().join("auto_update.toml"));
    let config = auto_update_config(AutoUpdateConfig {
        interval: UpdateInterval::Off,
        update_all: true,
        silent: true,
    });
    let mut h = harness_from(RecordingBackend::failing("scoop not found"), |builder| {
        builder
            .with_config(config)
            .with_auto_update_store(store.clone())
            .with_scheduled_updates(true)
    });
    assert!(!h.service.is_scheduling_updates());

    let run = h.service.auto_updater().run_once().await;
    assert!(!run.succeeded());
    assert!(run.packages.is_none());
    let StepOutcome::Finished { id, result } = &run.buckets else {
        panic!("launch failures still finish the operation");
    };
    assert!(result.summary.starts_with("Failed to start Updating buckets"));
    assert!(h.service.manager().get(id).unwrap().is_minimized());
    assert_eq!(store.load().await.unwrap().last_run_ms, Some(NOW_MS));

    let mut silent = true;
    while let Ok(message) = h.events.try_recv() {
        silent &= !matches!(message.event, AppEvent::AutoUpdate(_));
    }
    assert!(silent, "silent runs emit no auto-update events");
    h.service.shutdown().await;
}

#[tokio::test]
async fn test_closing_bucket_step_ends_run() {
    let h = harness_from(RecordingBackend::default(), |builder| {
        builder.with_config(auto_update_config(AutoUpdateConfig {
            update_all: true,
            ..AutoUpdateConfig::default()
        }))
    });
    let manager = h.service.manager().clone();
    let backend = h.backend.clone();

    let updater = h.service.auto_updater();
    let (run, ()) = tokio::join!(updater.run_once(), async {
        settle(|| backend.started().len() == 1).await;
        manager.remove_operation(&backend.started()[0]);
    });

    assert!(matches!(run.buckets, StepOutcome::Closed { .. }));
    assert!(run.packages.is_none());
    assert_eq!(h.backend.started().len(), 1);
    h.service.shutdown().await;
}

#[test]
fn test_output_source_aliases() {
    assert_eq!("command".parse::<OutputSource>().unwrap(), OutputSource::CommandEcho);
    assert!("telemetry".parse::<OutputSource>().is_err());
}

#[derive(Debug, Clone)]
enum Step {
    Add,
    Finish(usize),
    Toggle(usize),
    Remove(usize),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => Just(Step::Add),
        2 => any::<usize>().prop_map(Step::Finish),
        2 => any::<usize>().prop_map(Step::Toggle),
        1 => any::<usize>().prop_map(Step::Remove),
    ]
}

proptest! {
    #[test]
    fn prop_active_count_matches_definition(steps in prop::collection::vec(step(), 1..60)) {
        let manager = OperationManager::new(
            Arc::new(ManualClock::new(0)),
            WarningCoordinator::default(),
            None,
        );
        let mut ids: Vec<OperationId> = Vec::new();

        for (n, step) in steps.into_iter().enumerate() {
            match step {
                Step::Add => {
                    let id = OperationId::from(format!("op-{n}"));
                    manager.add_operation(NewOperation::new(id.clone(), "op")).unwrap();
                    ids.push(id);
                }
                Step::Finish(i) if !ids.is_empty() => {
                    manager.set_operation_result(&ids[i % ids.len()], OperationResult::success("ok"));
                }
                Step::Toggle(i) if !ids.is_empty() => {
                    manager.toggle_minimize(&ids[i % ids.len()]);
                }
                Step::Remove(i) if !ids.is_empty() => {
                    manager.remove_operation(&ids[i % ids.len()]);
                }
                _ => {}
            }

            let expected = manager
                .operations()
                .iter()
                .filter(|op| op.status() == OperationStatus::InProgress || op.is_minimized())
                .count();
            prop_assert_eq!(manager.active_operations_count(), expected);
            prop_assert!(manager.operations().iter().all(|op| op.updated_at() >= op.created_at()));
        }
    }
}
