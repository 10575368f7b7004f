use super::{Commit, CommitQuery, Credential, GitHubApi, GitHubError, LanguageBytes, Repository};
use crate::utils::http_client::create_http_client;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;

/// REST client for api.github.com (or a compatible base URL)
pub struct GitHubClient {
    http: Client,
    api_base_url: String,
}

impl GitHubClient {
    pub fn new(api_base_url: &str, timeout_secs: u64) -> Result<Self, GitHubError> {
        Ok(Self {
            http: create_http_client(timeout_secs)?,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get(&self, path: &str, credential: &Credential) -> RequestBuilder {
        let request = self
            .http
            .get(format!("{}{}", self.api_base_url, path))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");

        match credential.token() {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Send a request and return its JSON body, mapping failures to `GitHubError`
    async fn fetch_json(&self, request: RequestBuilder) -> Result<serde_json::Value, GitHubError> {
        let response = request.send().await?;

        if let Some(error) = classify_status(response.status(), response.headers()) {
            return Err(error);
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn fetch_array(&self, request: RequestBuilder) -> Result<Vec<serde_json::Value>, GitHubError> {
        match self.fetch_json(request).await? {
            serde_json::Value::Array(items) => Ok(items),
            other => {
                log::warn!("⚠️  Expected a JSON array from GitHub, got {}", json_type(&other));
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn list_repositories(
        &self,
        username: &str,
        per_page: u32,
        credential: &Credential,
    ) -> Result<Vec<Repository>, GitHubError> {
        let request = self
            .get(&format!("/users/{}/repos", urlencoding::encode(username)), credential)
            .query(&[
                ("sort", "updated".to_string()),
                ("per_page", per_page.to_string()),
            ]);

        let items = self.fetch_array(request).await?;
        let repos: Vec<Repository> = items.into_iter().filter_map(parse_repository).collect();

        log::debug!("📦 GitHub listed {} repositories for {}", repos.len(), username);

        Ok(repos)
    }

    async fn list_commits(
        &self,
        repo_full_name: &str,
        query: &CommitQuery<'_>,
        credential: &Credential,
    ) -> Result<Vec<Commit>, GitHubError> {
        let mut params = vec![
            ("author", query.author.to_string()),
            ("per_page", query.per_page.to_string()),
        ];
        if let Some(since) = query.since {
            params.push(("since", since.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(until) = query.until {
            params.push(("until", until.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }

        let request = self
            .get(&format!("/repos/{}/commits", encode_repo_path(repo_full_name)), credential)
            .query(&params);

        let items = self.fetch_array(request).await?;
        let commits: Vec<Commit> = items.into_iter().filter_map(parse_commit).collect();

        log::debug!("📥 Fetched {} commits from {}", commits.len(), repo_full_name);

        Ok(commits)
    }

    async fn list_languages(
        &self,
        repo_full_name: &str,
        credential: &Credential,
    ) -> Result<LanguageBytes, GitHubError> {
        let request = self.get(
            &format!("/repos/{}/languages", encode_repo_path(repo_full_name)),
            credential,
        );

        let languages = parse_languages(self.fetch_json(request).await?);
        log::debug!("🔤 {} uses {} languages", repo_full_name, languages.len());

        Ok(languages)
    }
}

/// Map a non-success response to the error class callers care about
pub(crate) fn classify_status(status: StatusCode, headers: &HeaderMap) -> Option<GitHubError> {
    if status.is_success() {
        return None;
    }

    let rate_limit_exhausted = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "0")
        .unwrap_or(false);

    let error = match status {
        StatusCode::NOT_FOUND => GitHubError::NotFound,
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
            if rate_limit_exhausted || status == StatusCode::TOO_MANY_REQUESTS =>
        {
            GitHubError::RateLimited {
                reset_at: rate_limit_reset(headers),
            }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GitHubError::Unauthorized {
            status: status.as_u16(),
        },
        _ => GitHubError::Upstream {
            status: status.as_u16(),
        },
    };

    Some(error)
}

fn rate_limit_reset(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    headers
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

fn encode_repo_path(full_name: &str) -> String {
    full_name
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

// GitHub API response types. Every field is optional so one odd entry
// only drops that entry.

#[derive(Debug, Deserialize)]
struct GitHubRepo {
    name: Option<String>,
    full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubCommit {
    sha: Option<String>,
    commit: Option<GitHubCommitDetail>,
}

#[derive(Debug, Deserialize)]
struct GitHubCommitDetail {
    author: Option<GitHubCommitAuthor>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubCommitAuthor {
    date: Option<String>,
}

fn parse_repository(value: serde_json::Value) -> Option<Repository> {
    let repo: GitHubRepo = serde_json::from_value(value).ok()?;
    let full_name = repo.full_name.filter(|n| n.contains('/'))?;
    let name = repo
        .name
        .unwrap_or_else(|| full_name.rsplit('/').next().unwrap_or_default().to_string());

    Some(Repository { name, full_name })
}

fn parse_commit(value: serde_json::Value) -> Option<Commit> {
    let commit: GitHubCommit = serde_json::from_value(value).ok()?;
    let detail = commit.commit?;
    let date = detail.author?.date?;
    let authored_at = DateTime::parse_from_rfc3339(&date).ok()?.with_timezone(&Utc);

    Some(Commit {
        sha: commit.sha.unwrap_or_default(),
        message: detail.message.unwrap_or_default(),
        authored_at,
    })
}

/// Language name to byte count; non-numeric values are skipped
fn parse_languages(value: serde_json::Value) -> LanguageBytes {
    match value {
        serde_json::Value::Object(map) => map
            .into_iter()
            .filter_map(|(language, bytes)| bytes.as_u64().map(|b| (language, b)))
            .collect(),
        other => {
            log::warn!("⚠️  Expected a JSON object of languages, got {}", json_type(&other));
            LanguageBytes::new()
        }
    }
}
