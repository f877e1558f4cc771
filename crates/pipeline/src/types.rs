//! Shared value types for the forgebot ingestion domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (e.g. a payload is always a JSON object,
//! a context is immutable once built) and flow through the dispatch pipeline.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::EventType;

// ---------------------------------------------------------------------------
// Forge source
// ---------------------------------------------------------------------------

/// The forge flavour that sent a webhook.
///
/// Derived once per request from header inspection; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForgeSource {
    /// GitHub-style deliveries (`X-GitHub-Event`, `X-Hub-Signature-256`).
    ///
    /// Also the fallback when no recognisable header is present.
    #[default]
    GitHub,
    /// Gitee-style deliveries (`X-Gitee-Event`, `X-Gitee-Token` / `X-Gitee-Signature`).
    Gitee,
}

impl ForgeSource {
    /// Returns the lowercase wire name (`"github"` / `"gitee"`).
    pub fn as_str(self) -> &'static str {
        match self {
            ForgeSource::GitHub => "github",
            ForgeSource::Gitee => "gitee",
        }
    }
}

impl std::fmt::Display for ForgeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A decoded webhook payload.
///
/// The type itself enforces the invariant that a payload is always a JSON
/// object, never an array or scalar.
pub type EventPayload = Map<String, Value>;

/// One verified, classified and decoded webhook event.
#[derive(Debug, Clone, PartialEq)]
pub struct ForgeEvent {
    /// Forge that delivered the event.
    pub source: ForgeSource,
    /// Forge-specific event name.
    pub event_type: EventType,
    /// Decoded body.
    pub payload: EventPayload,
}

impl ForgeEvent {
    /// Creates a new [`ForgeEvent`].
    pub fn new(source: ForgeSource, event_type: EventType, payload: EventPayload) -> Self {
        Self {
            source,
            event_type,
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// What the external agent is permitted to do.
///
/// Constant across all events; carried in every [`EventContext`] so the agent
/// never has to assume defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// May open pull requests.
    pub can_create_pr: bool,
    /// May comment on, label or edit issues.
    pub can_modify_issues: bool,
    /// May create and apply labels.
    pub can_manage_labels: bool,
    /// May trigger CI / automation workflows.
    pub can_trigger_actions: bool,
    /// Has read/write access to the whole repository.
    pub has_full_repo_access: bool,
    /// May clone the repository.
    pub can_clone_repo: bool,
    /// May push branches.
    pub can_push_changes: bool,
}

impl Capabilities {
    /// The capability set granted to the autonomous agent in this version.
    pub const AUTONOMOUS: Capabilities = Capabilities {
        can_create_pr: true,
        can_modify_issues: true,
        can_manage_labels: true,
        can_trigger_actions: true,
        has_full_repo_access: true,
        can_clone_repo: true,
        can_push_changes: true,
    };
}

// ---------------------------------------------------------------------------

/// Name and e-mail the agent commits under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotIdentity {
    /// Display name (`git config user.name`).
    pub name: String,
    /// Commit e-mail (`git config user.email`).
    pub email: String,
}

impl BotIdentity {
    /// Creates a new [`BotIdentity`].
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Event context
// ---------------------------------------------------------------------------

/// Durable record handed to the external agent through the workspace.
///
/// Built once per dispatch from a [`ForgeEvent`] and the allocated workspace;
/// immutable afterwards and owned by exactly one dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventContext {
    event_type: EventType,
    source: ForgeSource,
    payload: EventPayload,
    workspace: PathBuf,
    capabilities: Capabilities,
    timestamp: Timestamp,
}

impl EventContext {
    /// Builds the context for `event` dispatched into `workspace`.
    pub fn new(event: ForgeEvent, workspace: impl Into<PathBuf>, capabilities: Capabilities) -> Self {
        Self {
            event_type: event.event_type,
            source: event.source,
            payload: event.payload,
            workspace: workspace.into(),
            capabilities,
            timestamp: Timestamp::now(),
        }
    }

    /// Workspace root for this dispatch.
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
