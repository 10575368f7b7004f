use std::env;
use std::str::FromStr;

use chrono::Duration;
use thiserror::Error;

use crate::utils::validators;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
    #[error("{name} must be at least 1")]
    Zero { name: &'static str },
    #[error("{name} must be at most {max}")]
    TooLarge { name: &'static str, max: String },
    #[error("GITHUB_API_URL is not usable: {0}")]
    ApiUrl(anyhow::Error),
}

pub const MAX_LOOKBACK_MONTHS: u32 = 120;
pub const MAX_CACHE_TTL_HOURS: i64 = 24 * 365;
/// GitHub's largest `per_page`
pub const MAX_PAGE_SIZE: u32 = 100;

/// Bounds applied when scanning a user's repositories for commits
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreakSettings {
    /// `per_page` of the repository listing
    pub repo_list_size: u32,
    /// How many of the listed repositories get their commits fetched
    pub max_repos: u32,
    pub max_commits_per_repo: u32,
    pub lookback_months: u32,
    pub cache_ttl_hours: i64,
    /// Per-repository commit requests kept in flight at once
    pub fetch_concurrency: usize,
    /// Repositories inspected by the today check and the month calendar
    pub today_check_max_repos: u32,
    /// Repositories whose languages are summed by the language breakdown
    pub language_repo_list_size: u32,
}

impl StreakSettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::hours(self.cache_ttl_hours.clamp(0, MAX_CACHE_TTL_HOURS))
    }

    /// Repositories actually scanned, never more than were listed
    pub fn repos_to_scan(&self) -> usize {
        self.max_repos.min(self.repo_list_size) as usize
    }
}

impl Default for StreakSettings {
    fn default() -> Self {
        Self {
            repo_list_size: 20,
            max_repos: 10,
            max_commits_per_repo: 100,
            lookback_months: 6,
            cache_ttl_hours: 24,
            fetch_concurrency: 1,
            today_check_max_repos: 5,
            language_repo_list_size: 100,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    pub github_api_url: String,
    pub http_timeout_secs: u64,
    pub streak: StreakSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let defaults = StreakSettings::default();
        let streak = StreakSettings {
            repo_list_size: positive("STREAK_REPO_LIST_SIZE", defaults.repo_list_size)?,
            max_repos: positive("STREAK_MAX_REPOS", defaults.max_repos)?,
            max_commits_per_repo: positive(
                "STREAK_MAX_COMMITS_PER_REPO",
                defaults.max_commits_per_repo,
            )?,
            lookback_months: bounded(
                "STREAK_LOOKBACK_MONTHS",
                defaults.lookback_months,
                MAX_LOOKBACK_MONTHS,
            )?,
            cache_ttl_hours: bounded(
                "STREAK_CACHE_TTL_HOURS",
                defaults.cache_ttl_hours,
                MAX_CACHE_TTL_HOURS,
            )?,
            fetch_concurrency: positive("STREAK_FETCH_CONCURRENCY", defaults.fetch_concurrency)?,
            today_check_max_repos: positive(
                "TODAY_CHECK_MAX_REPOS",
                defaults.today_check_max_repos,
            )?,
            language_repo_list_size: bounded(
                "LANGUAGE_STATS_REPO_LIST_SIZE",
                defaults.language_repo_list_size,
                MAX_PAGE_SIZE,
            )?,
        };

        let github_api_url = env::var("GITHUB_API_URL")
            .unwrap_or_else(|_| "https://api.github.com".to_string());
        validators::validate_url(&github_api_url).map_err(ConfigError::ApiUrl)?;

        Ok(Config {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parsed("PORT", 8080)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            github_api_url: github_api_url.trim_end_matches('/').to_string(),
            http_timeout_secs: positive("HTTP_TIMEOUT_SECS", 10)?,
            streak,
        })
    }
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

fn positive<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + From<u8>,
{
    let value = parsed(name, default)?;
    if value < T::from(1u8) {
        return Err(ConfigError::Zero { name });
    }
    Ok(value)
}

fn bounded<T>(name: &'static str, default: T, max: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + From<u8> + ToString,
{
    let value = positive(name, default)?;
    if value > max {
        return Err(ConfigError::TooLarge {
            name,
            max: max.to_string(),
        });
    }
    Ok(value)
}
