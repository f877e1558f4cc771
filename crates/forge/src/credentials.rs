//! Access-token injection into clone URLs.

use url::Url;

/// Hosts whose HTTPS clone URLs get the access token injected.
pub const CREDENTIAL_HOSTS: &[&str] = &["github.com", "gitee.com"];

/// Rewrites `url` to carry `token` as its userinfo
/// (`https://github.com/o/r` becomes `https://<token>@github.com/o/r`).
///
/// URLs are returned unchanged when they are not HTTPS URLs on one of
/// [`CREDENTIAL_HOSTS`], already carry credentials, or cannot be parsed.
pub fn authenticated_clone_url(url: &str, token: &str) -> String {
    if token.is_empty() {
        return url.to_owned();
    }

    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_owned();
    };

    let known_host = parsed
        .host_str()
        .is_some_and(|host| CREDENTIAL_HOSTS.contains(&host));
    let has_credentials = !parsed.username().is_empty() || parsed.password().is_some();

    if parsed.scheme() != "https" || !known_host || has_credentials {
        return url.to_owned();
    }

    if parsed.set_username(token).is_err() {
        return url.to_owned();
    }
    parsed.into()
}
