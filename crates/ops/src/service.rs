//! Wiring of registry, correlator, reaper and backend

use crate::auto_update::AutoUpdater;
use crate::backend::CommandBackend;
use crate::clock::{Clock, SystemClock};
use crate::correlator::EventCorrelator;
use crate::id::{IdGenerator, RandomIdGenerator};
use crate::manager::OperationManager;
use crate::reaper::{Reaper, ReaperConfig};
use crate::state::NewOperation;
use crate::task::TaskHandle;
use crate::warning::WarningCoordinator;
use rscoop_config::{AutoUpdateConfig, AutoUpdateStore, Config};
use rscoop_errors::{Error, OpsError, UserFacingError};
use rscoop_events::{BackendReceiver, EventSender};
use rscoop_types::{OperationId, OperationResult, StartRequest};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Registers operations and hands them to the backend.
///
/// Cheap to clone; the scheduled updater holds one to start its steps.
#[derive(Debug, Clone)]
pub struct Launcher {
    manager: OperationManager,
    ids: Arc<dyn IdGenerator>,
    backend: Arc<dyn CommandBackend>,
    max_id_attempts: u32,
}

impl Launcher {
    #[must_use]
    pub fn manager(&self) -> &OperationManager {
        &self.manager
    }

    /// Register an operation and hand it to the backend.
    ///
    /// A backend that fails to launch does not make this call fail: the
    /// operation is finished immediately with an error result so it still
    /// shows up to the user.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is invalid or no unique id could be
    /// allocated.
    pub fn start_operation(&self, request: &StartRequest) -> Result<OperationId, Error> {
        request.validate()?;
        let title = request.title();
        let id = self.register(request, &title)?;

        if let Err(e) = self.backend.start_operation(&id, request) {
            tracing::error!(operation_id = %id, error = %e, "failed to launch operation");
            let summary = format!("Failed to start {title}: {}", e.user_message());
            self.manager
                .set_operation_result(&id, OperationResult::failure(summary));
        }
        Ok(id)
    }

    fn register(&self, request: &StartRequest, title: &str) -> Result<OperationId, OpsError> {
        let tag = request.effective_type().tag();
        for attempt in 1..=self.max_id_attempts {
            let id = self.ids.generate(tag);
            let new = NewOperation::new(id.clone(), title).minimized(request.minimized);
            match self.manager.add_operation(new) {
                Ok(()) => return Ok(id),
                Err(OpsError::DuplicateOperation { .. }) => {
                    tracing::debug!(operation_id = %id, attempt, "id collision, regenerating");
                }
                Err(e) => return Err(e),
            }
        }
        Err(OpsError::IdSpaceExhausted {
            attempts: self.max_id_attempts,
        })
    }
}

/// Running operations subsystem
#[derive(Debug)]
pub struct OperationsService {
    launcher: Launcher,
    auto_update: AutoUpdateConfig,
    auto_update_store: Option<AutoUpdateStore>,
    correlator: JoinHandle<()>,
    reaper: TaskHandle,
    scheduler: Option<TaskHandle>,
}

impl OperationsService {
    #[must_use]
    pub fn builder() -> OperationsServiceBuilder {
        OperationsServiceBuilder::new()
    }

    /// Shared handle to the registry
    #[must_use]
    pub fn manager(&self) -> &OperationManager {
        self.launcher.manager()
    }

    /// See [`Launcher::start_operation`]
    ///
    /// # Errors
    ///
    /// Returns an error if the request is invalid or no unique id could be
    /// allocated.
    pub fn start_operation(&self, request: &StartRequest) -> Result<OperationId, Error> {
        self.launcher.start_operation(request)
    }

    /// Updater for running the configured bucket refresh on demand
    #[must_use]
    pub fn auto_updater(&self) -> AutoUpdater {
        AutoUpdater::new(
            self.launcher.clone(),
            self.auto_update,
            self.auto_update_store.clone(),
        )
    }

    /// Whether the bucket refresh schedule is running
    #[must_use]
    pub fn is_scheduling_updates(&self) -> bool {
        self.scheduler.as_ref().is_some_and(TaskHandle::is_running)
    }

    /// Stop background tasks
    pub async fn shutdown(self) {
        if let Some(scheduler) = self.scheduler {
            scheduler.stop().await;
        }
        self.reaper.stop().await;
        self.correlator.abort();
        tracing::debug!("operations service shut down");
    }
}

/// Builder for [`OperationsService`]
///
/// The backend and the receiving end of its event channel are required;
/// everything else has a default.
#[derive(Debug, Default)]
pub struct OperationsServiceBuilder {
    config: Option<Config>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    warning: Option<WarningCoordinator>,
    tx: Option<EventSender>,
    backend: Option<Arc<dyn CommandBackend>>,
    backend_events: Option<BackendReceiver>,
    auto_update_store: Option<AutoUpdateStore>,
    schedule_updates: bool,
}

impl OperationsServiceBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    #[must_use]
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Use a loaded (possibly persisted) warning coordinator instead of the
    /// config's `[warning]` section
    #[must_use]
    pub fn with_warning(mut self, warning: WarningCoordinator) -> Self {
        self.warning = Some(warning);
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn CommandBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    #[must_use]
    pub fn with_backend_events(mut self, rx: BackendReceiver) -> Self {
        self.backend_events = Some(rx);
        self
    }

    /// Where the last bucket refresh is recorded; without one it is only
    /// known for the life of the process
    #[must_use]
    pub fn with_auto_update_store(mut self, store: AutoUpdateStore) -> Self {
        self.auto_update_store = Some(store);
        self
    }

    /// Run the `[auto_update]` schedule in the background (off by default)
    #[must_use]
    pub fn with_scheduled_updates(mut self, enabled: bool) -> Self {
        self.schedule_updates = enabled;
        self
    }

    /// Build the service and start the correlator and reaper tasks, plus
    /// the update schedule when enabled and its interval is not `off`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `OpsError::MissingComponent` if the backend or its event
    /// receiver was not provided.
    pub fn build(self) -> Result<OperationsService, Error> {
        let backend = self.backend.ok_or_else(|| OpsError::MissingComponent {
            component: "backend".to_string(),
        })?;
        let backend_events = self
            .backend_events
            .ok_or_else(|| OpsError::MissingComponent {
                component: "backend_events".to_string(),
            })?;

        let config = self.config.unwrap_or_default();
        config.validate()?;

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(RandomIdGenerator::new(Arc::clone(&clock))) as Arc<dyn IdGenerator>);
        let warning = self
            .warning
            .unwrap_or_else(|| WarningCoordinator::in_memory(config.warning));

        let manager = OperationManager::new(clock, warning, self.tx);
        let correlator = EventCorrelator::new(manager.clone()).spawn(backend_events);
        let reaper = Reaper::new(manager.clone(), ReaperConfig::from(&config.operations)).spawn();

        let launcher = Launcher {
            manager,
            ids,
            backend,
            max_id_attempts: config.operations.max_id_attempts,
        };
        let scheduler = if self.schedule_updates {
            AutoUpdater::new(
                launcher.clone(),
                config.auto_update,
                self.auto_update_store.clone(),
            )
            .spawn()
        } else {
            None
        };

        tracing::debug!(
            retention_secs = config.operations.retention_secs,
            reaper_interval_secs = config.operations.reaper_interval_secs,
            auto_update_interval = %config.auto_update.interval,
            scheduled = scheduler.is_some(),
            "operations service started"
        );

        Ok(OperationsService {
            launcher,
            auto_update: config.auto_update,
            auto_update_store: self.auto_update_store,
            correlator,
            reaper,
            scheduler,
        })
    }
}
