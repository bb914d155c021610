//! Owner handle for the service's background loops

use std::future::Future;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A spawned loop that can be asked to stop; dropping the handle aborts it
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl TaskHandle {
    /// Spawn `run` on the current runtime. The loop must exit once the
    /// receiver it is given resolves.
    pub(crate) fn spawn<F, Fut>(name: &'static str, run: F) -> Self
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(shutdown_rx));
        Self {
            name,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Signal the loop and wait for it to exit
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(task = self.name, error = %e, "background task ended abnormally");
            }
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
