//! forgebot forge adapter.
//!
//! The thin slice of forge integration the dispatch pipeline needs:
//!
//! - [`decode_payload`]: turns a verified webhook body into an
//!   [`pipeline::EventPayload`], rejecting anything that is not a JSON object.
//! - [`authenticated_clone_url`]: injects the access token into GitHub and
//!   Gitee HTTPS clone URLs.
//! - [`GitCloneProvisioner`]: implements [`pipeline::RepositoryProvisioner`]
//!   by running a shallow, non-interactive `git clone` under a timeout.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules. The
//! [`pipeline`] crate sees only [`pipeline::RepositoryProvisioner`].

mod clone;
mod credentials;
mod payload;

pub use clone::GitCloneProvisioner;
pub use credentials::{authenticated_clone_url, CREDENTIAL_HOSTS};
pub use payload::decode_payload;
