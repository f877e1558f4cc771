//! Forge detection and event-type extraction from request headers.
//!
//! Both decisions look at headers only. Detection must run before the body is
//! verified, since it selects which verification scheme applies.

use axum::http::HeaderMap;
use pipeline::{EventType, ForgeSource};

/// GitHub event name header.
pub const GITHUB_EVENT_HEADER: &str = "x-github-event";
/// GitHub HMAC-SHA256 signature header (`sha256=<hex>`).
pub const GITHUB_SIGNATURE_HEADER: &str = "x-hub-signature-256";
/// Gitee event name header.
pub const GITEE_EVENT_HEADER: &str = "x-gitee-event";
/// Gitee shared-token header.
pub const GITEE_TOKEN_HEADER: &str = "x-gitee-token";
/// Gitee HMAC-SHA256 signature header.
pub const GITEE_SIGNATURE_HEADER: &str = "x-gitee-signature";

/// Decides which forge sent the request.
///
/// A GitHub event header wins. Otherwise a Gitee event or token header means
/// Gitee. Anything else falls back to GitHub, whose verification then rejects
/// the request unless it carries a valid GitHub signature.
pub fn detect_source(headers: &HeaderMap) -> ForgeSource {
    if has_value(headers, GITHUB_EVENT_HEADER) {
        return ForgeSource::GitHub;
    }
    if has_value(headers, GITEE_EVENT_HEADER) || has_value(headers, GITEE_TOKEN_HEADER) {
        return ForgeSource::Gitee;
    }
    ForgeSource::GitHub
}

/// Reads the event name for `source`, or `None` if the header is absent,
/// empty or not valid UTF-8.
pub fn event_type(headers: &HeaderMap, source: ForgeSource) -> Option<EventType> {
    let name = match source {
        ForgeSource::GitHub => GITHUB_EVENT_HEADER,
        ForgeSource::Gitee => GITEE_EVENT_HEADER,
    };
    header_str(headers, name).and_then(EventType::new)
}

pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn has_value(headers: &HeaderMap, name: &str) -> bool {
    header_str(headers, name).is_some()
}
