pub mod github;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use github::GitHubClient;

/// How a call to GitHub is authenticated
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Anonymous,
    Bearer(String),
}

impl Credential {
    /// Build a credential from an optional token; blank tokens count as anonymous
    pub fn from_token(token: Option<&str>) -> Self {
        match token.map(str::trim) {
            Some(token) if !token.is_empty() => Credential::Bearer(token.to_string()),
            _ => Credential::Anonymous,
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Credential::Anonymous => None,
            Credential::Bearer(token) => Some(token),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Credential::Bearer(_))
    }
}

// Keep tokens out of logs
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Anonymous => f.write_str("Anonymous"),
            Credential::Bearer(_) => f.write_str("Bearer(***)"),
        }
    }
}

/// Repository information from the repository listing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
}

/// A commit as returned by the commit listing, reduced to what we use
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub message: String,
    pub authored_at: DateTime<Utc>,
}

/// Filter for listing commits of one repository
#[derive(Clone, Debug)]
pub struct CommitQuery<'a> {
    pub author: &'a str,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub per_page: u32,
}

/// Bytes of code per language in one repository
pub type LanguageBytes = BTreeMap<String, u64>;

/// Coarse classes callers react to differently
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    Other,
}

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("not found on GitHub")]
    NotFound,
    #[error("GitHub rejected the credentials (status {status})")]
    Unauthorized { status: u16 },
    #[error("GitHub rate limit exceeded")]
    RateLimited { reset_at: Option<DateTime<Utc>> },
    #[error("GitHub API request failed with status {status}")]
    Upstream { status: u16 },
    #[error("network error talking to GitHub: {0}")]
    Network(#[from] reqwest::Error),
    #[error("GitHub returned a body that is not JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

impl GitHubError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GitHubError::NotFound => ErrorKind::NotFound,
            GitHubError::Unauthorized { .. } | GitHubError::RateLimited { .. } => {
                ErrorKind::Unauthorized
            }
            GitHubError::Upstream { .. } | GitHubError::Network(_) | GitHubError::Decode(_) => {
                ErrorKind::Other
            }
        }
    }
}

/// Read access to the GitHub REST API
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// List a user's repositories, most recently updated first
    async fn list_repositories(
        &self,
        username: &str,
        per_page: u32,
        credential: &Credential,
    ) -> Result<Vec<Repository>, GitHubError>;

    /// List commits of `repo_full_name` ("owner/name") matching `query`
    async fn list_commits(
        &self,
        repo_full_name: &str,
        query: &CommitQuery<'_>,
        credential: &Credential,
    ) -> Result<Vec<Commit>, GitHubError>;

    /// Bytes of code per language detected in `repo_full_name`
    async fn list_languages(
        &self,
        repo_full_name: &str,
        credential: &Credential,
    ) -> Result<LanguageBytes, GitHubError>;
}

#[cfg(test)]
pub mod fake {
    //! Scripted in-memory stand-in for the GitHub API.

    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Repository, since, until and per_page of one commit listing
    pub type RecordedQuery = (String, Option<DateTime<Utc>>, Option<DateTime<Utc>>, u32);

    #[derive(Default)]
    pub struct FakeGitHub {
        repos: Mutex<Option<Result<Vec<Repository>, ErrorKind>>>,
        commits: Mutex<HashMap<String, Result<Vec<Commit>, ErrorKind>>>,
        unfiltered: Mutex<HashSet<String>>,
        languages: Mutex<HashMap<String, Result<LanguageBytes, ErrorKind>>>,
        pub language_calls: AtomicUsize,
        pub repo_calls: AtomicUsize,
        pub commit_calls: AtomicUsize,
        pub commit_queries: Mutex<Vec<RecordedQuery>>,
        pub credentials_seen: Mutex<Vec<Credential>>,
    }

    fn error_for(kind: ErrorKind) -> GitHubError {
        match kind {
            ErrorKind::NotFound => GitHubError::NotFound,
            ErrorKind::Unauthorized => GitHubError::Unauthorized { status: 401 },
            ErrorKind::Other => GitHubError::Upstream { status: 502 },
        }
    }

    impl FakeGitHub {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_repos(self, names: &[&str]) -> Self {
            let repos = names
                .iter()
                .map(|full_name| Repository {
                    name: full_name.rsplit('/').next().unwrap_or(full_name).to_string(),
                    full_name: full_name.to_string(),
                })
                .collect();
            *self.repos.lock().unwrap() = Some(Ok(repos));
            self
        }

        pub fn with_repo_error(self, kind: ErrorKind) -> Self {
            *self.repos.lock().unwrap() = Some(Err(kind));
            self
        }

        /// Commits for `repo`, one per RFC 3339 timestamp, newest first as GitHub returns them
        pub fn with_commits(self, repo: &str, timestamps: &[&str]) -> Self {
            let mut commits: Vec<Commit> = timestamps
                .iter()
                .enumerate()
                .map(|(i, ts)| Commit {
                    sha: format!("{:07x}{}", i + 1, "abcdef0123456789"),
                    message: format!("commit {}\n\nbody", i + 1),
                    authored_at: DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc),
                })
                .collect();
            commits.sort_by(|a, b| b.authored_at.cmp(&a.authored_at));
            self.commits
                .lock()
                .unwrap()
                .insert(repo.to_string(), Ok(commits));
            self
        }

        /// Commits returned as-is, ignoring the query's date bounds
        pub fn with_unfiltered_commits(self, repo: &str, commits: Vec<Commit>) -> Self {
            self.unfiltered.lock().unwrap().insert(repo.to_string());
            self.commits
                .lock()
                .unwrap()
                .insert(repo.to_string(), Ok(commits));
            self
        }

        pub fn with_languages(self, repo: &str, languages: &[(&str, u64)]) -> Self {
            let languages = languages
                .iter()
                .map(|(name, bytes)| (name.to_string(), *bytes))
                .collect();
            self.languages
                .lock()
                .unwrap()
                .insert(repo.to_string(), Ok(languages));
            self
        }

        pub fn with_language_error(self, repo: &str, kind: ErrorKind) -> Self {
            self.languages
                .lock()
                .unwrap()
                .insert(repo.to_string(), Err(kind));
            self
        }

        pub fn with_commit_error(self, repo: &str, kind: ErrorKind) -> Self {
            self.commits
                .lock()
                .unwrap()
                .insert(repo.to_string(), Err(kind));
            self
        }
    }

    #[async_trait]
    impl GitHubApi for FakeGitHub {
        async fn list_repositories(
            &self,
            _username: &str,
            per_page: u32,
            credential: &Credential,
        ) -> Result<Vec<Repository>, GitHubError> {
            self.repo_calls.fetch_add(1, Ordering::SeqCst);
            self.credentials_seen.lock().unwrap().push(credential.clone());
            match self.repos.lock().unwrap().clone() {
                Some(Ok(repos)) => Ok(repos.into_iter().take(per_page as usize).collect()),
                Some(Err(kind)) => Err(error_for(kind)),
                None => Ok(Vec::new()),
            }
        }

        async fn list_commits(
            &self,
            repo_full_name: &str,
            query: &CommitQuery<'_>,
            credential: &Credential,
        ) -> Result<Vec<Commit>, GitHubError> {
            self.commit_calls.fetch_add(1, Ordering::SeqCst);
            self.credentials_seen.lock().unwrap().push(credential.clone());
            self.commit_queries.lock().unwrap().push((
                repo_full_name.to_string(),
                query.since,
                query.until,
                query.per_page,
            ));
            let unfiltered = self.unfiltered.lock().unwrap().contains(repo_full_name);
            match self.commits.lock().unwrap().get(repo_full_name).cloned() {
                Some(Ok(commits)) if unfiltered => Ok(commits),
                Some(Ok(commits)) => Ok(commits
                    .into_iter()
                    .filter(|c| query.since.map_or(true, |since| c.authored_at >= since))
                    .filter(|c| query.until.map_or(true, |until| c.authored_at <= until))
                    .take(query.per_page as usize)
                    .collect()),
                Some(Err(kind)) => Err(error_for(kind)),
                None => Ok(Vec::new()),
            }
        }

        async fn list_languages(
            &self,
            repo_full_name: &str,
            credential: &Credential,
        ) -> Result<LanguageBytes, GitHubError> {
            self.language_calls.fetch_add(1, Ordering::SeqCst);
            self.credentials_seen.lock().unwrap().push(credential.clone());
            match self.languages.lock().unwrap().get(repo_full_name).cloned() {
                Some(Ok(languages)) => Ok(languages),
                Some(Err(kind)) => Err(error_for(kind)),
                None => Ok(LanguageBytes::new()),
            }
        }
    }
}
