//! Core ingestion domain for forgebot.
//!
//! This crate contains every domain concept used while turning a forge webhook
//! into a dispatch for the external agent: identifiers, the event and context
//! value types, the event-type taxonomy, the self-event filter, and the error
//! taxonomy. Infrastructure crates implement the port traits defined here; they
//! never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`EventType`, `CloneUrl`, `DispatchId`) |
//! | [`types`] | Shared value types (`ForgeEvent`, `EventContext`, `Capabilities`, etc.) |
//! | [`payload`] | Defensive accessors into decoded webhook payloads |
//! | [`redact`] | Credential scrubbing for logged and reported text |
//! | [`taxonomy`] | Which event types need a repository clone, which carry comments |
//! | [`self_events`] | Detection of events the bot generated itself |
//! | [`ports`] | Traits implemented by infrastructure crates |
//! | [`errors`] | Error taxonomy and retry-policy types |

pub mod errors;
pub mod identifiers;
pub mod payload;
pub mod ports;
pub mod redact;
pub mod self_events;
pub mod taxonomy;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{ForgebotError, RetryPolicy};
pub use identifiers::{CloneUrl, DispatchId, EventType};
pub use payload::{comment_author_login, repository_clone_url};
pub use ports::{
    AgentInvocation, AgentInvoker, AgentReport, EventSink, RepositoryProvisioner,
    WorkspaceManager, REPOSITORY_DIR_NAME,
};
pub use redact::{redact, REDACTED};
pub use self_events::{is_bot_login, is_self_generated, BOT_LOGIN_KEYWORDS};
pub use taxonomy::{
    is_comment_event, needs_repository, COMMENT_EVENT_TYPES, REPOSITORY_REQUIREMENTS,
};
pub use types::{
    BotIdentity, Capabilities, EventContext, EventPayload, ForgeEvent, ForgeSource, Timestamp,
};
