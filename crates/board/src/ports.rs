//! Port traits implemented by infrastructure crates.
//!
//! The domain never talks to the board service directly; it goes through
//! [`RepositoryService`]. The `github` crate supplies the production
//! implementation, tests supply in-memory fakes.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    BoardBlueprint, BoardHandle, BoardId, ContributorStat, FieldId, FieldSpec, Issue,
    OptimizationKind, PullRequest, RepositoryId, RetryPolicy, Timestamp,
};

/// Failure reported by the board service.
///
/// Every operation can fail with this error; callers decide per operation
/// whether it is fatal, retried or ignored.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    /// The request never produced a response (DNS, TLS, connection reset).
    #[error("transport failure: {message}")]
    Transport { message: String },

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The service answered with a non-success HTTP status.
    #[error("service returned HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        /// Delay requested by the service before retrying (`Retry-After`).
        retry_after: Option<Duration>,
    },

    /// The service answered successfully but reported query errors.
    #[error("query failed: {}", .messages.join("; "))]
    Query { messages: Vec<String> },

    /// The response could not be decoded.
    #[error("could not decode response: {message}")]
    Decode { message: String },

    /// A referenced entity does not exist.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// The operation is not supported for the given input.
    #[error("unsupported operation: {message}")]
    Unsupported { message: String },
}

impl ServiceError {
    /// Classifies whether re-issuing the failed call is safe.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            ServiceError::Transport { .. } | ServiceError::Timeout => {
                RetryPolicy::Retryable { after: None }
            }
            ServiceError::Http {
                status,
                retry_after,
                ..
            } if *status == 429 || *status >= 500 => RetryPolicy::Retryable {
                after: *retry_after,
            },
            // Secondary rate limits arrive as 403 with a Retry-After header.
            ServiceError::Http {
                status: 403,
                retry_after: Some(after),
                ..
            } => RetryPolicy::Retryable { after: Some(*after) },
            _ => RetryPolicy::NonRetryable,
        }
    }
}

/// Repository activity and project-board operations of the hosting service.
#[async_trait]
pub trait RepositoryService: Send + Sync {
    /// Contributors of the repository with their contribution counts.
    async fn list_contributors(
        &self,
        repo: &RepositoryId,
    ) -> Result<Vec<ContributorStat>, ServiceError>;

    /// Issues updated since `since`, excluding pull requests.
    async fn list_issues(
        &self,
        repo: &RepositoryId,
        since: Timestamp,
    ) -> Result<Vec<Issue>, ServiceError>;

    /// Most recent pull requests in any state.
    async fn list_pull_requests(
        &self,
        repo: &RepositoryId,
    ) -> Result<Vec<PullRequest>, ServiceError>;

    /// Non-closed boards linked to the repository, in the service's order.
    async fn find_active_boards(
        &self,
        repo: &RepositoryId,
    ) -> Result<Vec<BoardHandle>, ServiceError>;

    /// Current structure (fields, options, views) of a board.
    async fn describe_board(&self, board: &BoardId) -> Result<BoardHandle, ServiceError>;

    /// Creates an empty board linked to the repository.
    async fn create_board(
        &self,
        repo: &RepositoryId,
        blueprint: &BoardBlueprint,
    ) -> Result<BoardHandle, ServiceError>;

    /// Adds a field to a board and returns its id.
    async fn add_field(&self, board: &BoardId, spec: &FieldSpec) -> Result<FieldId, ServiceError>;

    /// Applies one planned change to a board.
    async fn apply_optimization(
        &self,
        board: &BoardId,
        change: &OptimizationKind,
    ) -> Result<(), ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16, retry_after: Option<Duration>) -> ServiceError {
        ServiceError::Http {
            status,
            message: String::new(),
            retry_after,
        }
    }

    #[test]
    fn server_errors_and_rate_limits_are_retryable() {
        assert!(http(502, None).retry_policy().is_retryable());
        assert_eq!(
            http(429, Some(Duration::from_secs(7))).retry_policy(),
            RetryPolicy::Retryable {
                after: Some(Duration::from_secs(7))
            }
        );
        assert!(http(403, Some(Duration::from_secs(60))).retry_policy().is_retryable());
        assert!(ServiceError::Timeout.retry_policy().is_retryable());
    }

    #[test]
    fn client_errors_are_not_retryable() {
        assert_eq!(http(401, None).retry_policy(), RetryPolicy::NonRetryable);
        assert_eq!(http(403, None).retry_policy(), RetryPolicy::NonRetryable);
        assert_eq!(
            ServiceError::Decode {
                message: "bad".into()
            }
            .retry_policy(),
            RetryPolicy::NonRetryable
        );
    }
}
