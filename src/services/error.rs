use chrono::{DateTime, Utc};
use thiserror::Error;

use super::git_platforms::GitHubError;
use super::streak_store::StoreError;

/// Failures surfaced to callers of the streak and commit services
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("GitHub user or repository not found")]
    NotFound,
    #[error("GitHub refused the request; sign in again")]
    Unauthorized,
    #[error("GitHub rate limit exceeded")]
    RateLimited { reset_at: Option<DateTime<Utc>> },
    #[error("authentication is required for this operation")]
    AuthenticationRequired,
    #[error("{year}-{month} is not a valid calendar month")]
    InvalidMonth { year: i32, month: u32 },
    #[error("{0}")]
    Upstream(GitHubError),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl From<GitHubError> for ServiceError {
    fn from(error: GitHubError) -> Self {
        match error {
            GitHubError::NotFound => ServiceError::NotFound,
            GitHubError::Unauthorized { .. } => ServiceError::Unauthorized,
            GitHubError::RateLimited { reset_at } => ServiceError::RateLimited { reset_at },
            other => ServiceError::Upstream(other),
        }
    }
}
