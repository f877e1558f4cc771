//! Event-type taxonomy.
//!
//! Both tables are static data rather than branches so they can be extended
//! (or later externalised) without touching dispatch control flow.

use tracing::info;

use crate::EventType;

/// Whether dispatching an event of the given type requires a repository clone.
///
/// Covers GitHub event names and Gitee hook names. Anything not listed is
/// treated as needing the repository.
pub const REPOSITORY_REQUIREMENTS: &[(&str, bool)] = &[
    // GitHub
    ("issues", true),
    ("issue_comment", true),
    ("pull_request", true),
    ("pull_request_review", true),
    ("pull_request_review_comment", true),
    ("push", false),
    ("create", false),
    ("delete", false),
    ("star", false),
    ("watch", false),
    ("fork", false),
    // Gitee
    ("Issue Hook", true),
    ("Note Hook", true),
    ("Merge Request Hook", true),
    ("Push Hook", false),
    ("Tag Push Hook", false),
];

/// Event types that carry a comment authored by `payload.comment.user`.
///
/// Only these can be generated by the bot itself.
pub const COMMENT_EVENT_TYPES: &[&str] = &[
    "issue_comment",
    "pull_request_review_comment",
    "Note Hook",
];

/// Returns whether `event_type` needs the repository cloned into the workspace.
///
/// Unknown event types default to `true`: acting on an unfamiliar event shape
/// without repository context is unsafe.
pub fn needs_repository(event_type: &EventType) -> bool {
    match REPOSITORY_REQUIREMENTS
        .iter()
        .find(|(name, _)| *name == event_type.as_str())
    {
        Some((_, needed)) => *needed,
        None => {
            info!(event_type = %event_type, "Unknown event type, assuming repository needed");
            true
        }
    }
}

/// Returns whether `event_type` is a comment-bearing event.
pub fn is_comment_event(event_type: &EventType) -> bool {
    COMMENT_EVENT_TYPES.contains(&event_type.as_str())
}
