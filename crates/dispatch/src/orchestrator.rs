//! The per-event dispatch state machine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pipeline::{
    is_self_generated, needs_repository, repository_clone_url, AgentInvocation, AgentInvoker,
    AgentReport, Capabilities, DispatchId, EventContext, ForgeEvent, ForgebotError,
    RepositoryProvisioner, WorkspaceManager, REPOSITORY_DIR_NAME,
};
use tracing::{debug, info, info_span, Instrument};

use crate::context::{write_context, CONTEXT_FILE_NAME};
use crate::workspace::WorkspaceLease;

/// States a dispatch moves through. Transitions are strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStage {
    /// Event accepted from the HTTP layer.
    Received,
    /// Event was generated by the bot itself and dropped.
    FilteredOut,
    /// Event passed the self-event filter.
    Proceeding,
    /// Workspace directory exists and is owned by this dispatch.
    WorkspaceAcquired,
    /// Repository cloned into the workspace.
    RepoCloned,
    /// No clone needed, or no clone URL in the payload.
    RepoSkipped,
    /// Context file written.
    ContextWritten,
    /// Agent process handed the workspace.
    AgentInvoked,
}

/// How a dispatch ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The event was self-generated; nothing else happened.
    FilteredOut,
    /// The agent ran and exited successfully.
    Completed {
        /// Whether the repository was cloned into the workspace.
        repository_cloned: bool,
        /// What the agent reported.
        report: AgentReport,
    },
}

/// Runs one dispatch per call against the injected ports.
///
/// Holds no per-dispatch state, so one orchestrator serves any number of
/// concurrent dispatches.
#[derive(Clone)]
pub struct DispatchOrchestrator {
    workspaces: Arc<dyn WorkspaceManager>,
    provisioner: Arc<dyn RepositoryProvisioner>,
    agent: Arc<dyn AgentInvoker>,
    capabilities: Capabilities,
}

impl DispatchOrchestrator {
    /// Creates an orchestrator granting the agent [`Capabilities::AUTONOMOUS`].
    pub fn new(
        workspaces: Arc<dyn WorkspaceManager>,
        provisioner: Arc<dyn RepositoryProvisioner>,
        agent: Arc<dyn AgentInvoker>,
    ) -> Self {
        Self {
            workspaces,
            provisioner,
            agent,
            capabilities: Capabilities::AUTONOMOUS,
        }
    }

    /// Dispatches `event` to completion.
    ///
    /// Self-generated events return [`DispatchOutcome::FilteredOut`] without
    /// touching the filesystem. Any failure after the workspace is acquired
    /// still releases it before this returns.
    pub async fn handle(&self, event: ForgeEvent) -> Result<DispatchOutcome, ForgebotError> {
        let dispatch_id = DispatchId::new_random();
        let span = info_span!(
            "dispatch",
            %dispatch_id,
            source = %event.source,
            event_type = %event.event_type
        );
        self.run(dispatch_id, event).instrument(span).await
    }

    async fn run(
        &self,
        dispatch_id: DispatchId,
        event: ForgeEvent,
    ) -> Result<DispatchOutcome, ForgebotError> {
        enter(DispatchStage::Received);
        if is_self_generated(&event.event_type, &event.payload) {
            enter(DispatchStage::FilteredOut);
            info!("Skipping self-generated event");
            return Ok(DispatchOutcome::FilteredOut);
        }
        enter(DispatchStage::Proceeding);

        let lease = WorkspaceLease::acquire(Arc::clone(&self.workspaces), dispatch_id)?;
        enter(DispatchStage::WorkspaceAcquired);

        let result = self.in_workspace(dispatch_id, event, lease.path()).await;
        lease.release().await;
        result
    }

    /// Everything that happens while the dispatch owns `workspace`.
    async fn in_workspace(
        &self,
        dispatch_id: DispatchId,
        event: ForgeEvent,
        workspace: &Path,
    ) -> Result<DispatchOutcome, ForgebotError> {
        let repository_dir = workspace.join(REPOSITORY_DIR_NAME);
        let repository_cloned = self.provision(&event, &repository_dir).await?;
        enter(if repository_cloned {
            DispatchStage::RepoCloned
        } else {
            DispatchStage::RepoSkipped
        });

        let context = EventContext::new(event, workspace, self.capabilities);
        write_context(&context).await?;
        enter(DispatchStage::ContextWritten);

        let invocation = if repository_cloned {
            AgentInvocation {
                dispatch_id,
                workspace: workspace.to_path_buf(),
                working_directory: repository_dir,
                context_file: Path::new("..").join(CONTEXT_FILE_NAME),
            }
        } else {
            AgentInvocation {
                dispatch_id,
                workspace: workspace.to_path_buf(),
                working_directory: workspace.to_path_buf(),
                context_file: PathBuf::from(CONTEXT_FILE_NAME),
            }
        };

        let report = self.agent.invoke(&invocation).await?;
        enter(DispatchStage::AgentInvoked);

        Ok(DispatchOutcome::Completed {
            repository_cloned,
            report,
        })
    }

    /// Clones the event's repository when its type needs one.
    ///
    /// Returns whether a clone was made. A clone failure is fatal: the agent
    /// relies on the repository being present whenever the event type needs it.
    async fn provision(
        &self,
        event: &ForgeEvent,
        repository_dir: &Path,
    ) -> Result<bool, ForgebotError> {
        if !needs_repository(&event.event_type) {
            debug!("Event type does not need the repository");
            return Ok(false);
        }

        let Some(url) = repository_clone_url(&event.payload) else {
            info!("Payload has no repository clone URL, continuing without a clone");
            return Ok(false);
        };

        self.provisioner
            .clone_repository(&url, repository_dir)
            .await?;
        Ok(true)
    }
}

impl std::fmt::Debug for DispatchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchOrchestrator")
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

fn enter(stage: DispatchStage) {
    debug!(?stage, "dispatch stage");
}
