use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use serde::Serialize;

use super::commit_aggregation::{CommitAggregator, ScanWindow};
use super::commit_days::{ActiveDaySet, CommitDay};
use super::error::ServiceError;
use super::git_platforms::{Commit, CommitQuery, Credential};

/// One of today's commits
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitSummary {
    pub repo: String,
    pub sha: String,
    pub message: String,
    pub date: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastCommit {
    #[serde(flatten)]
    pub commit: CommitSummary,
    pub is_today: bool,
}

/// Answer to "did this user commit today?"
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayReport {
    pub date: Option<NaiveDate>,
    pub today_count: usize,
    pub repos_with_commits: usize,
    pub repos_checked: usize,
    pub commits: Vec<CommitSummary>,
    pub last_commit: Option<LastCommit>,
}

/// Quick commit lookups over a user's most recently updated repositories
pub struct CommitCheckService {
    aggregator: Arc<CommitAggregator>,
}

impl CommitCheckService {
    pub fn new(aggregator: Arc<CommitAggregator>) -> Self {
        Self { aggregator }
    }

    /// Current local day as seen by the service clock
    pub fn today(&self) -> NaiveDate {
        self.aggregator.clock().today()
    }

    /// Count the user's commits made during the current local day
    pub async fn check_today(
        &self,
        username: &str,
        credential: &Credential,
    ) -> Result<TodayReport, ServiceError> {
        let clock = self.aggregator.clock();
        let today = clock.today();
        let start = clock.start_of_local_day(today);
        let end = today
            .succ_opt()
            .map(|tomorrow| clock.start_of_local_day(tomorrow) - Duration::seconds(1))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let limit = self.aggregator.settings().today_check_max_repos;
        let window = ScanWindow {
            list_size: limit,
            repos: limit as usize,
            since: Some(start),
            until: Some(end),
            per_repo: self.aggregator.settings().max_commits_per_repo,
        };

        let scan = self.aggregator.scan(username, credential, &window).await?;

        let mut report = TodayReport {
            date: Some(today),
            repos_checked: scan.commits.len() + scan.failed,
            ..TodayReport::default()
        };

        for (repo, commits) in &scan.commits {
            let todays: Vec<&Commit> = commits
                .iter()
                .filter(|c| clock.local_day(c.authored_at) == today)
                .collect();
            if todays.is_empty() {
                continue;
            }
            report.repos_with_commits += 1;
            report.today_count += todays.len();
            report
                .commits
                .extend(todays.into_iter().map(|c| summarize(&repo.name, c)));
        }
        report.commits.sort_by(|a, b| b.date.cmp(&a.date));

        if let Some(latest_repo) = scan.repositories.first() {
            let query = CommitQuery {
                author: username,
                since: None,
                until: None,
                per_page: 1,
            };
            match self
                .aggregator
                .github()
                .list_commits(&latest_repo.full_name, &query, credential)
                .await
            {
                Ok(commits) => {
                    report.last_commit = commits.first().map(|c| LastCommit {
                        commit: summarize(&latest_repo.name, c),
                        is_today: clock.local_day(c.authored_at) == today,
                    });
                }
                Err(e) => log::warn!("Could not fetch latest commit of {}: {}", latest_repo.full_name, e),
            }
        }

        log::info!(
            "{} made {} commits today across {} repositories",
            username,
            report.today_count,
            report.repos_with_commits
        );

        Ok(report)
    }

    /// Local days within the month starting at `first_day` on which the user committed
    pub async fn month_days(
        &self,
        username: &str,
        first_day: NaiveDate,
        credential: &Credential,
    ) -> Result<Vec<CommitDay>, ServiceError> {
        let clock = self.aggregator.clock();
        let Some(next_month) = first_day.checked_add_months(Months::new(1)) else {
            return Err(ServiceError::InvalidMonth {
                year: first_day.year(),
                month: first_day.month(),
            });
        };

        let limit = self.aggregator.settings().today_check_max_repos;
        let window = ScanWindow {
            list_size: limit,
            repos: limit as usize,
            since: Some(clock.start_of_local_day(first_day)),
            until: Some(clock.start_of_local_day(next_month)),
            per_repo: self.aggregator.settings().max_commits_per_repo,
        };

        let scan = self.aggregator.scan(username, credential, &window).await?;

        let mut days = ActiveDaySet::new();
        for commit in scan.all_commits() {
            let day = clock.local_day(commit.authored_at);
            if day >= first_day && day < next_month {
                days.insert(day);
            }
        }

        Ok(days.iter().copied().collect())
    }
}

fn summarize(repo: &str, commit: &Commit) -> CommitSummary {
    CommitSummary {
        repo: repo.to_string(),
        sha: commit.sha.chars().take(7).collect(),
        message: commit.message.lines().next().unwrap_or_default().to_string(),
        date: commit.authored_at,
    }
}
