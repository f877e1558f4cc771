//! Scrubbing of credentials from text that leaves the process.
//!
//! Subprocess output and error messages can echo back the access token (git
//! prints the remote URL on failure, and an agent may print anything). All of
//! it passes through [`redact`] before it is logged or stored in an error.

/// Placeholder written in place of a secret.
pub const REDACTED: &str = "***";

/// Replaces every occurrence of each non-empty secret in `text` with
/// [`REDACTED`].
///
/// Longer secrets are replaced first so a secret that contains another one is
/// never left half-visible.
pub fn redact(text: &str, secrets: &[&str]) -> String {
    let mut ordered: Vec<&str> = secrets.iter().copied().filter(|s| !s.is_empty()).collect();
    ordered.sort_by_key(|s| std::cmp::Reverse(s.len()));

    ordered
        .into_iter()
        .fold(text.to_owned(), |acc, secret| acc.replace(secret, REDACTED))
}
