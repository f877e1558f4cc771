//! Detached, tracked execution of dispatches off the HTTP path.

use std::sync::Arc;
use std::time::Duration;

use pipeline::{EventSink, ForgeEvent};
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::orchestrator::{DispatchOrchestrator, DispatchOutcome};

/// Runs each submitted event as its own detached task.
///
/// Tasks are unordered and share nothing but the read-only orchestrator.
/// They are tracked so that shutdown can wait for in-flight dispatches instead
/// of silently dropping them.
#[derive(Debug, Clone)]
pub struct BackgroundDispatcher {
    orchestrator: Arc<DispatchOrchestrator>,
    tracker: TaskTracker,
}

impl BackgroundDispatcher {
    /// Creates a dispatcher driving `orchestrator`.
    pub fn new(orchestrator: DispatchOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            tracker: TaskTracker::new(),
        }
    }

    /// Number of dispatches still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Waits up to `timeout` for every in-flight dispatch to finish.
    ///
    /// Returns `true` if all of them finished in time. Dispatches still running
    /// after the timeout are abandoned to process exit.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let in_flight = self.tracker.len();
        if in_flight > 0 {
            info!(in_flight, "Waiting for in-flight dispatches");
        }

        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    remaining = self.tracker.len(),
                    timeout = ?timeout,
                    "Shutdown drain timed out with dispatches still running"
                );
                false
            }
        }
    }
}

impl EventSink for BackgroundDispatcher {
    fn submit(&self, event: ForgeEvent) {
        let orchestrator = Arc::clone(&self.orchestrator);
        let source = event.source;
        let event_type = event.event_type.clone();

        self.tracker.spawn(async move {
            match orchestrator.handle(event).await {
                Ok(DispatchOutcome::FilteredOut) => {}
                Ok(DispatchOutcome::Completed {
                    repository_cloned, ..
                }) => {
                    info!(%source, %event_type, repository_cloned, "Dispatch completed");
                }
                Err(e) => {
                    error!(%source, %event_type, error = %e, "Failed to handle event");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pipeline::{
        AgentInvocation, AgentInvoker, AgentReport, CloneUrl, EventType, ForgeSource,
        ForgebotError, RepositoryProvisioner,
    };

    use super::*;
    use crate::workspace::TempWorkspaceManager;

    struct NoClone;

    #[async_trait]
    impl RepositoryProvisioner for NoClone {
        async fn clone_repository(&self, _: &CloneUrl, _: &Path) -> Result<(), ForgebotError> {
            Ok(())
        }
    }

    struct SlowAgent {
        delay: Duration,
        finished: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AgentInvoker for SlowAgent {
        async fn invoke(&self, _: &AgentInvocation) -> Result<AgentReport, ForgebotError> {
            tokio::time::sleep(self.delay).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(AgentReport {
                output: String::new(),
                duration: self.delay,
            })
        }
    }

    fn dispatcher(root: &Path, delay: Duration, finished: Arc<AtomicUsize>) -> BackgroundDispatcher {
        BackgroundDispatcher::new(DispatchOrchestrator::new(
            Arc::new(TempWorkspaceManager::new(root)),
            Arc::new(NoClone),
            Arc::new(SlowAgent { delay, finished }),
        ))
    }

    fn push_event() -> ForgeEvent {
        ForgeEvent::new(
            ForgeSource::GitHub,
            EventType::new("push").unwrap(),
            Default::default(),
        )
    }

    #[tokio::test]
    async fn submit_returns_immediately_and_drain_waits() {
        let root = tempfile::tempdir().unwrap();
        let finished = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(root.path(), Duration::from_millis(200), finished.clone());

        for _ in 0..3 {
            dispatcher.submit(push_event());
        }
        assert_eq!(finished.load(Ordering::SeqCst), 0);
        assert_eq!(dispatcher.in_flight(), 3);

        assert!(dispatcher.drain(Duration::from_secs(5)).await);
        assert_eq!(finished.load(Ordering::SeqCst), 3);
        assert_eq!(dispatcher.in_flight(), 0);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn drain_gives_up_after_timeout() {
        let root = tempfile::tempdir().unwrap();
        let finished = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(root.path(), Duration::from_secs(30), finished);

        dispatcher.submit(push_event());
        assert!(!dispatcher.drain(Duration::from_millis(50)).await);
        assert_eq!(dispatcher.in_flight(), 1);
    }
}
