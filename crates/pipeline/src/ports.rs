//! Port traits implemented by infrastructure crates.
//!
//! The dispatch orchestrator only ever talks to these traits, which keeps the
//! filesystem, `git`, and the agent subprocess swappable in tests.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::{CloneUrl, DispatchId, ForgeEvent, ForgebotError};

/// Name of the workspace subdirectory a repository is cloned into.
pub const REPOSITORY_DIR_NAME: &str = "repository";

/// Allocates and tears down per-dispatch workspaces.
///
/// Both operations are synchronous: allocation is a single `mkdir`, and
/// release must be callable from `Drop` so it runs on every exit path of a
/// dispatch, including panics and task cancellation.
pub trait WorkspaceManager: Send + Sync {
    /// Creates a uniquely named, empty directory owned by `dispatch`.
    fn acquire(&self, dispatch: DispatchId) -> Result<PathBuf, ForgebotError>;

    /// Recursively removes a workspace created by [`WorkspaceManager::acquire`].
    ///
    /// Best effort: failures are logged by the implementation, never returned.
    fn release(&self, workspace: &Path);
}

/// Populates a workspace with a working copy of a repository.
#[async_trait]
pub trait RepositoryProvisioner: Send + Sync {
    /// Clones `url` into `destination`, which must not exist yet.
    async fn clone_repository(&self, url: &CloneUrl, destination: &Path)
        -> Result<(), ForgebotError>;
}

/// Everything the external agent needs to start working on a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInvocation {
    /// Dispatch being handed over.
    pub dispatch_id: DispatchId,
    /// Workspace root.
    pub workspace: PathBuf,
    /// Directory the agent process starts in: the repository clone when one
    /// was provisioned, otherwise the workspace root.
    pub working_directory: PathBuf,
    /// Path of the context file, relative to `working_directory`.
    pub context_file: PathBuf,
}

/// What the agent process reported back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReport {
    /// Combined stdout and stderr.
    pub output: String,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

/// Hands a prepared workspace to the external agent.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Runs the agent to completion.
    ///
    /// Returns an `Agent` error if the process cannot be launched, times out,
    /// or exits unsuccessfully.
    async fn invoke(&self, invocation: &AgentInvocation) -> Result<AgentReport, ForgebotError>;
}

/// Accepts verified events for asynchronous dispatch.
///
/// Called from the HTTP acceptance path, so implementations must return
/// immediately and never wait for the dispatch to finish.
pub trait EventSink: Send + Sync {
    /// Schedules `event` for dispatch.
    fn submit(&self, event: ForgeEvent);
}
