use std::sync::Arc;

use chrono::{DateTime, Months, Utc};
use futures_util::stream::{self, StreamExt};

use super::commit_days::ActiveDaySet;
use super::git_platforms::{Commit, CommitQuery, Credential, GitHubApi, GitHubError, Repository};
use crate::utils::clock::Clock;
use crate::utils::config::StreakSettings;

/// Which repositories and which slice of their history to read
#[derive(Clone, Debug)]
pub struct ScanWindow {
    /// `per_page` of the repository listing
    pub list_size: u32,
    /// Leading repositories of the listing whose commits are fetched
    pub repos: usize,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub per_repo: u32,
}

/// Commits gathered from a user's most recently updated repositories
#[derive(Debug, Default)]
pub struct RepoScan {
    pub repositories: Vec<Repository>,
    /// Repositories whose commit listing succeeded, in listing order
    pub commits: Vec<(Repository, Vec<Commit>)>,
    pub failed: usize,
}

impl RepoScan {
    pub fn all_commits(&self) -> impl Iterator<Item = &Commit> + '_ {
        self.commits.iter().flat_map(|(_, commits)| commits.iter())
    }
}

/// Collects the days on which a user committed, across their recent repositories
pub struct CommitAggregator {
    github: Arc<dyn GitHubApi>,
    clock: Arc<dyn Clock>,
    settings: StreakSettings,
}

impl CommitAggregator {
    pub fn new(github: Arc<dyn GitHubApi>, clock: Arc<dyn Clock>, settings: StreakSettings) -> Self {
        Self {
            github,
            clock,
            settings,
        }
    }

    pub fn github(&self) -> &Arc<dyn GitHubApi> {
        &self.github
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn settings(&self) -> &StreakSettings {
        &self.settings
    }

    /// Start of the lookback window as of now
    pub fn lookback_start(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        now.checked_sub_months(Months::new(self.settings.lookback_months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Build the set of local calendar days with at least one commit by `username`
    /// inside the lookback window.
    ///
    /// A failing repository listing is returned as an error; a failing commit
    /// listing for one repository only drops that repository.
    pub async fn aggregate(
        &self,
        username: &str,
        credential: &Credential,
    ) -> Result<ActiveDaySet, GitHubError> {
        let since = self.lookback_start();
        let window = ScanWindow {
            list_size: self.settings.repo_list_size,
            repos: self.settings.repos_to_scan(),
            since: Some(since),
            until: None,
            per_repo: self.settings.max_commits_per_repo,
        };

        let scan = self.scan(username, credential, &window).await?;

        // GitHub filters `since` on the committer date; rebased commits can
        // still carry an older author date
        let mut days = ActiveDaySet::new();
        for commit in scan.all_commits().filter(|c| c.authored_at >= since) {
            days.record(commit.authored_at, self.clock.as_ref());
        }

        log::info!(
            "📊 {}: {} active days from {} repositories ({} skipped)",
            username,
            days.len(),
            scan.commits.len(),
            scan.failed
        );

        Ok(days)
    }

    /// List the user's repositories and fetch commits for the leading ones.
    ///
    /// Commit fetches run with at most `fetch_concurrency` requests in flight.
    pub async fn scan(
        &self,
        username: &str,
        credential: &Credential,
        window: &ScanWindow,
    ) -> Result<RepoScan, GitHubError> {
        let repositories = self
            .github
            .list_repositories(username, window.list_size, credential)
            .await
            .map_err(|e| {
                log::error!("Failed to list repositories for {}: {}", username, e);
                e
            })?;

        if repositories.is_empty() {
            log::info!("No repositories found for {}", username);
            return Ok(RepoScan::default());
        }

        let query = CommitQuery {
            author: username,
            since: window.since,
            until: window.until,
            per_page: window.per_repo,
        };

        let results: Vec<(usize, Result<Vec<Commit>, GitHubError>)> = stream::iter(
            repositories.iter().take(window.repos).enumerate(),
        )
        .map(|(index, repo)| {
            let query = &query;
            async move {
                let result = self
                    .github
                    .list_commits(&repo.full_name, query, credential)
                    .await;
                (index, result)
            }
        })
        .buffer_unordered(self.settings.fetch_concurrency.max(1))
        .collect()
        .await;

        let mut ordered = results;
        ordered.sort_by_key(|(index, _)| *index);

        let mut scan = RepoScan {
            repositories: Vec::new(),
            commits: Vec::new(),
            failed: 0,
        };

        for (index, result) in ordered {
            let repo = &repositories[index];
            match result {
                Ok(commits) => scan.commits.push((repo.clone(), commits)),
                Err(e) => {
                    log::warn!("⚠️  Skipping {}: {}", repo.full_name, e);
                    scan.failed += 1;
                }
            }
        }

        scan.repositories = repositories;
        Ok(scan)
    }
}
