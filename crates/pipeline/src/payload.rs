//! Defensive accessors into decoded webhook payloads.
//!
//! Payloads are arbitrary JSON. Every accessor here returns `None` when any
//! level of nesting is absent or has the wrong shape; none of them can fail.

use serde_json::Value;

use crate::{CloneUrl, EventPayload};

/// Login of the user who authored the comment carried by the event
/// (`payload.comment.user.login`).
pub fn comment_author_login(payload: &EventPayload) -> Option<&str> {
    payload
        .get("comment")
        .and_then(|comment| comment.pointer("/user/login"))
        .and_then(Value::as_str)
}

/// The repository clone URL carried by the event.
///
/// Reads `payload.repository.clone_url`, falling back to
/// `payload.repository.git_http_url` which Gitee sends on some hooks.
pub fn repository_clone_url(payload: &EventPayload) -> Option<CloneUrl> {
    let repository = payload.get("repository")?;
    ["clone_url", "git_http_url"]
        .iter()
        .filter_map(|field| repository.get(*field).and_then(Value::as_str))
        .find_map(CloneUrl::new)
}
