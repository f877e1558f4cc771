//! forgebot dispatch orchestration.
//!
//! One dispatch is the complete processing of one accepted webhook event:
//!
//! ```text
//! Received -> (FilteredOut | Proceeding) -> WorkspaceAcquired
//!          -> (RepoCloned | RepoSkipped) -> ContextWritten -> AgentInvoked -> Terminal
//! ```
//!
//! with the workspace released on the transition into `Terminal` from any point
//! after `WorkspaceAcquired`.
//!
//! - [`DispatchOrchestrator`] runs that state machine against the
//!   [`pipeline`] port traits.
//! - [`TempWorkspaceManager`] and [`WorkspaceLease`] give each dispatch an
//!   exclusively owned directory that is removed on every exit path.
//! - [`BackgroundDispatcher`] implements [`pipeline::EventSink`]: it detaches
//!   one task per event from the HTTP path and tracks them so shutdown can
//!   drain in-flight work.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Sequences calls between business logic in the
//! [`pipeline`] crate and the infrastructure traits. Contains no forge, git or
//! agent details of its own.

mod background;
mod context;
mod orchestrator;
mod workspace;

pub use background::BackgroundDispatcher;
pub use context::{write_context, CONTEXT_FILE_NAME};
pub use orchestrator::{DispatchOrchestrator, DispatchOutcome, DispatchStage};
pub use workspace::{TempWorkspaceManager, WorkspaceLease, WORKSPACE_PREFIX};
