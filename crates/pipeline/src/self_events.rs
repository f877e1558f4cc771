//! Self-generated event detection.
//!
//! The agent comments on issues and pull requests. Without this filter those
//! comments would come back as webhooks and trigger the agent again, forever.
//! The check leans towards *not* reacting when the actor looks automated, but
//! never blocks an event just because actor data is missing.

use tracing::info;

use crate::payload::comment_author_login;
use crate::taxonomy::is_comment_event;
use crate::{EventPayload, EventType};

/// Lower-case substrings that mark a login as an automation actor.
///
/// `"[bot]"` is the forge's app-account suffix convention; it is listed
/// separately from `"bot"` so the table documents both.
pub const BOT_LOGIN_KEYWORDS: &[&str] = &["bot", "claude", "github-actions", "[bot]"];

/// Returns `true` if `login` matches any of [`BOT_LOGIN_KEYWORDS`],
/// case-insensitively.
pub fn is_bot_login(login: &str) -> bool {
    let login = login.to_lowercase();
    BOT_LOGIN_KEYWORDS
        .iter()
        .any(|keyword| login.contains(keyword))
}

/// Returns `true` if the event was produced by the bot itself and must be
/// dropped.
///
/// Only comment-bearing event types are inspected; the bot never performs the
/// actions behind the other event types. A missing or mis-typed actor is
/// treated as not self-generated.
pub fn is_self_generated(event_type: &EventType, payload: &EventPayload) -> bool {
    if !is_comment_event(event_type) {
        return false;
    }

    match comment_author_login(payload) {
        Some(login) if is_bot_login(login) => {
            info!(event_type = %event_type, login, "Ignoring self-generated comment");
            true
        }
        _ => false,
    }
}
