//! forgebot webhook receiver.
//!
//! The accept path for one delivery is:
//!
//! ```text
//! detect source (headers) -> verify (raw body) -> event type (headers)
//!     -> decode payload -> EventSink::submit -> 200
//! ```
//!
//! Verification or decode failures answer 400 and nothing is submitted.
//! Everything after `submit` happens off the request path, so the sender only
//! ever sees whether the delivery was accepted.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`source`] | GitHub vs Gitee detection and event-type extraction |
//! | [`signature`] | [`WebhookVerifier`]: HMAC-SHA256 and Gitee token checks |
//! | [`routes`] | axum [`router`] with `POST /webhook` and `GET /health` |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP, header names and signature schemes live here. The
//! [`pipeline`] crate sees only [`pipeline::ForgeEvent`] and
//! [`pipeline::EventSink`].

mod error;
pub mod routes;
pub mod signature;
pub mod source;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::{router, WebhookState, DEFAULT_MAX_BODY_BYTES, WEBHOOK_SOURCE_KEY};
pub use signature::{format_signature_header, parse_signature_header, WebhookVerifier};
pub use source::{detect_source, event_type};
