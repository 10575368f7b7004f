use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde::Serialize;

use super::commit_aggregation::CommitAggregator;
use super::error::ServiceError;
use super::git_platforms::{Credential, ErrorKind};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LanguageShare {
    pub name: String,
    pub bytes: u64,
    /// Share of all counted bytes, rounded to one decimal
    pub percentage: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageReport {
    pub languages: Vec<LanguageShare>,
    pub total_bytes: u64,
    pub repos_checked: usize,
    /// Some repositories were refused by GitHub, usually a rate limit
    pub partial: bool,
}

/// Sums the languages GitHub detects across a user's recent repositories
pub struct LanguageStatsService {
    aggregator: Arc<CommitAggregator>,
}

impl LanguageStatsService {
    pub fn new(aggregator: Arc<CommitAggregator>) -> Self {
        Self { aggregator }
    }

    pub async fn language_stats(
        &self,
        username: &str,
        credential: &Credential,
    ) -> Result<LanguageReport, ServiceError> {
        let github = self.aggregator.github();
        let settings = self.aggregator.settings();

        let repositories = github
            .list_repositories(username, settings.language_repo_list_size, credential)
            .await
            .map_err(|e| {
                log::error!("Failed to list repositories for {}: {}", username, e);
                e
            })?;

        let results: Vec<_> = stream::iter(repositories.iter())
            .map(|repo| async move {
                (repo, github.list_languages(&repo.full_name, credential).await)
            })
            .buffer_unordered(settings.fetch_concurrency.max(1))
            .collect()
            .await;

        let mut totals: BTreeMap<String, u64> = BTreeMap::new();
        let mut partial = false;
        for (repo, result) in results {
            match result {
                Ok(languages) => {
                    for (language, bytes) in languages {
                        *totals.entry(language).or_default() += bytes;
                    }
                }
                Err(e) => {
                    log::warn!("⚠️  Skipping languages of {}: {}", repo.full_name, e);
                    if e.kind() == ErrorKind::Unauthorized {
                        partial = true;
                    }
                }
            }
        }

        let report = build_report(totals, repositories.len(), partial);
        log::info!(
            "🔤 {}: {} languages over {} repositories",
            username,
            report.languages.len(),
            report.repos_checked
        );

        Ok(report)
    }
}

fn build_report(totals: BTreeMap<String, u64>, repos_checked: usize, partial: bool) -> LanguageReport {
    let total_bytes: u64 = totals.values().sum();

    let mut languages: Vec<LanguageShare> = totals
        .into_iter()
        .map(|(name, bytes)| LanguageShare {
            percentage: percentage(bytes, total_bytes),
            name,
            bytes,
        })
        .collect();
    // BTreeMap order keeps ties sorted by name
    languages.sort_by(|a, b| b.bytes.cmp(&a.bytes));

    LanguageReport {
        languages,
        total_bytes,
        repos_checked,
        partial,
    }
}

fn percentage(bytes: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (bytes as f64 * 1000.0 / total as f64).round() / 10.0
}
