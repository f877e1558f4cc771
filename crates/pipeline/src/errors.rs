//! Error and retry-policy types for the forgebot ingestion domain.
//!
//! [`ForgebotError`] is the single taxonomy for the whole pipeline. The first
//! two variants are client-facing (the webhook sender sees a 400); the rest
//! happen after the HTTP response has been sent and are observability events
//! only.
//!
//! [`RetryPolicy`] is a cross-cutting concern: the provisioner consults it to
//! decide whether a failed clone may be attempted again.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// ## Rules
///
/// - `Retryable` errors: transient network failures while cloning.
/// - `NonRetryable` errors: everything else. Authentication and decode failures
///   are the sender's problem; workspace and agent failures end the dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means retry
        /// immediately or apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried; the dispatch ends.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Pipeline errors
// ---------------------------------------------------------------------------

/// Errors produced while accepting or dispatching a webhook event.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum ForgebotError {
    /// Bad or missing signature or token. Always a client-facing 400.
    #[error("Authentication failed: {reason}")]
    Authentication {
        /// What was wrong with the credentials on the request.
        reason: String,
    },

    /// The verified body is not a JSON object, or the request could not be
    /// classified. Always a client-facing 400.
    #[error("Failed to decode webhook: {reason}")]
    Decode {
        /// Description of the decode failure.
        reason: String,
    },

    /// The per-dispatch workspace could not be created or written to.
    #[error("Workspace error: {message}")]
    Workspace {
        /// Description of the filesystem failure.
        message: String,
    },

    /// The repository was required but could not be cloned.
    #[error("Repository provisioning failed: {message}")]
    Provisioning {
        /// Description of the clone failure (credentials redacted).
        message: String,
        /// `true` when the failure looks like a transient network condition.
        transient: bool,
    },

    /// The external agent could not be launched, timed out, or exited non-zero.
    #[error("Agent invocation failed: {message}")]
    Agent {
        /// Description of the failure.
        message: String,
        /// Exit code of the agent process, when it ran to completion.
        exit_code: Option<i32>,
    },

    /// The runtime configuration is invalid.
    ///
    /// Produced at startup; the server never starts with an invalid config.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}

impl ForgebotError {
    /// Shorthand for [`ForgebotError::Authentication`].
    pub fn authentication(reason: impl Into<String>) -> Self {
        Self::Authentication {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`ForgebotError::Decode`].
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`ForgebotError::Workspace`].
    pub fn workspace(message: impl Into<String>) -> Self {
        Self::Workspace {
            message: message.into(),
        }
    }

    /// Shorthand for [`ForgebotError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if the error is reported back to the webhook sender.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::Decode { .. })
    }

    /// Whether the failed operation may be attempted again.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Provisioning {
                transient: true, ..
            } => RetryPolicy::Retryable {
                after: Some(Duration::from_secs(2)),
            },
            _ => RetryPolicy::NonRetryable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_authentication_and_decode_are_client_errors() {
        assert!(ForgebotError::authentication("x").is_client_error());
        assert!(ForgebotError::decode("x").is_client_error());
        assert!(!ForgebotError::workspace("x").is_client_error());
        assert!(!ForgebotError::Agent {
            message: "x".into(),
            exit_code: Some(1)
        }
        .is_client_error());
    }

    #[test]
    fn only_transient_provisioning_failures_are_retryable() {
        let transient = ForgebotError::Provisioning {
            message: "could not resolve host".into(),
            transient: true,
        };
        let permanent = ForgebotError::Provisioning {
            message: "repository not found".into(),
            transient: false,
        };

        assert!(matches!(
            transient.retry_policy(),
            RetryPolicy::Retryable { .. }
        ));
        assert_eq!(permanent.retry_policy(), RetryPolicy::NonRetryable);
        assert_eq!(
            ForgebotError::authentication("bad").retry_policy(),
            RetryPolicy::NonRetryable
        );
    }
}
