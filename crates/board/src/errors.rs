//! Top-level error and retry-policy types for the board domain.
//!
//! [`BoardError`] covers conditions that fail a reconciliation run. Errors that
//! are recovered locally are defined in their respective modules:
//! [`crate::ports::ServiceError`], [`crate::formula::FormulaError`] and
//! [`crate::template::TemplateError`].
//!
//! [`RetryPolicy`] is a cross-cutting concern: every service error can say
//! whether re-issuing the call is safe.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ports::ServiceError;
use crate::template::TemplateError;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// - `Retryable`: timeouts, connection failures, 5xx and rate-limit responses.
/// - `NonRetryable`: authentication failures, malformed requests, decode errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt (e.g. from `Retry-After`).
        /// `None` means apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, RetryPolicy::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// Run-level errors
// ---------------------------------------------------------------------------

/// Errors that fail a reconciliation run.
///
/// Collection, lookup, formula and single-action failures never surface here;
/// they are absorbed by the reconciler and show up only in logs and in the
/// per-action outcomes of the result.
#[derive(Debug, Error)]
pub enum BoardError {
    /// Required invocation input (credential, repository identity) is missing
    /// or malformed. Produced before any network activity.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// The board template could not be decoded or failed validation.
    #[error("Invalid board template")]
    Template(#[from] TemplateError),

    /// Creating a new board, or one of its required fields, failed.
    #[error("Board creation failed while {step}")]
    Creation {
        /// Human-readable description of the step that failed.
        step: String,
        #[source]
        source: ServiceError,
    },

    /// The run did not finish within its overall deadline.
    #[error("Reconciliation did not finish within {}s", .after.as_secs())]
    DeadlineExceeded {
        /// The configured deadline.
        after: Duration,
    },
}

impl BoardError {
    /// Shorthand for [`BoardError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        BoardError::Configuration {
            message: message.into(),
        }
    }
}
