/// Source-hosting API boundary
///
/// The aggregator only talks to `GithubApi`, so tests can swap in fakes.
/// `GithubClient` is the production implementation over the REST v3 and
/// GraphQL v4 endpoints, riding the flat rate-limit policy of
/// `RateLimitedClient`.
use crate::client::RateLimitedClient;
use crate::core::{
    ContributionCalendar, ContributionDay, GithubError, GithubProfile, Organization, RepoDetail,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

/// Repositories requested per listing page
pub const REPOS_PER_PAGE: usize = 100;

/// Events requested per feed page
pub const EVENTS_PER_PAGE: usize = 100;

/// One entry of the public event feed, reduced to what classification
/// needs
#[derive(Debug, Clone)]
pub struct PublicEvent {
    /// Event type name, e.g. "PushEvent"
    pub kind: String,

    /// Repository full name the event happened in
    pub repo_name: String,

    /// Payload action, e.g. "opened"
    pub action: Option<String>,

    /// Commits carried by a push payload
    pub commit_count: u64,
}

/// Read-side interface to the source-hosting provider
#[async_trait]
pub trait GithubApi: Send + Sync {
    async fn fetch_profile(&self, username: &str) -> Result<GithubProfile, GithubError>;

    /// One page of the repository listing, without language maps
    async fn fetch_repo_page(
        &self,
        username: &str,
        page: usize,
    ) -> Result<Vec<RepoDetail>, GithubError>;

    /// Per-language code size for one repository
    async fn fetch_languages(
        &self,
        full_name: &str,
    ) -> Result<HashMap<String, u64>, GithubError>;

    async fn fetch_organizations(&self, username: &str) -> Result<Vec<Organization>, GithubError>;

    /// One page of the public event feed
    async fn fetch_event_page(
        &self,
        username: &str,
        page: usize,
    ) -> Result<Vec<PublicEvent>, GithubError>;

    /// Day-by-day contribution calendar for the window
    async fn fetch_contribution_calendar(
        &self,
        username: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ContributionCalendar, GithubError>;
}

/// REST + GraphQL client for the hosted API
#[derive(Debug, Clone)]
pub struct GithubClient {
    client: RateLimitedClient,
    rest_url: String,
    graphql_url: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(client: RateLimitedClient, token: Option<String>) -> Self {
        Self {
            client,
            rest_url: "https://api.github.com".to_string(),
            graphql_url: "https://api.github.com/graphql".to_string(),
            token,
        }
    }

    /// Point the client at a different host, used against test fixtures
    pub fn with_base_urls(mut self, rest_url: String, graphql_url: String) -> Self {
        self.rest_url = rest_url;
        self.graphql_url = graphql_url;
        self
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("beaver-engine"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        if let Some(token) = &self.token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers
    }

    async fn get(&self, path: &str) -> Result<Value, GithubError> {
        let url = format!("{}{}", self.rest_url, path);
        debug!("GET {}", url);
        Ok(self.client.get_json(&url, self.headers()).await?)
    }
}

#[async_trait]
impl GithubApi for GithubClient {
    async fn fetch_profile(&self, username: &str) -> Result<GithubProfile, GithubError> {
        let value = self.get(&format!("/users/{}", username)).await?;
        serde_json::from_value(value).map_err(|e| GithubError::Payload(e.to_string()))
    }

    async fn fetch_repo_page(
        &self,
        username: &str,
        page: usize,
    ) -> Result<Vec<RepoDetail>, GithubError> {
        let value = self
            .get(&format!(
                "/users/{}/repos?per_page={}&page={}&sort=updated",
                username, REPOS_PER_PAGE, page
            ))
            .await?;
        serde_json::from_value(value).map_err(|e| GithubError::Payload(e.to_string()))
    }

    async fn fetch_languages(
        &self,
        full_name: &str,
    ) -> Result<HashMap<String, u64>, GithubError> {
        let value = self.get(&format!("/repos/{}/languages", full_name)).await?;
        serde_json::from_value(value).map_err(|e| GithubError::Payload(e.to_string()))
    }

    async fn fetch_organizations(&self, username: &str) -> Result<Vec<Organization>, GithubError> {
        let value = self.get(&format!("/users/{}/orgs", username)).await?;
        serde_json::from_value(value).map_err(|e| GithubError::Payload(e.to_string()))
    }

    async fn fetch_event_page(
        &self,
        username: &str,
        page: usize,
    ) -> Result<Vec<PublicEvent>, GithubError> {
        let value = self
            .get(&format!(
                "/users/{}/events/public?per_page={}&page={}",
                username, EVENTS_PER_PAGE, page
            ))
            .await?;

        let entries = value
            .as_array()
            .ok_or_else(|| GithubError::Payload("event feed is not an array".to_string()))?;

        let events = entries
            .iter()
            .filter_map(|entry| {
                Some(PublicEvent {
                    kind: entry.get("type")?.as_str()?.to_string(),
                    repo_name: entry
                        .pointer("/repo/name")?
                        .as_str()?
                        .to_string(),
                    action: entry
                        .pointer("/payload/action")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    commit_count: entry
                        .pointer("/payload/size")
                        .and_then(Value::as_u64)
                        .unwrap_or(0),
                })
            })
            .collect();

        Ok(events)
    }

    async fn fetch_contribution_calendar(
        &self,
        username: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ContributionCalendar, GithubError> {
        let query = r#"
            query($login: String!, $from: DateTime!, $to: DateTime!) {
                user(login: $login) {
                    contributionsCollection(from: $from, to: $to) {
                        contributionCalendar {
                            totalContributions
                            weeks {
                                contributionDays {
                                    date
                                    contributionCount
                                }
                            }
                        }
                    }
                }
            }
        "#;
        let body = json!({
            "query": query,
            "variables": {
                "login": username,
                "from": from.to_rfc3339(),
                "to": to.to_rfc3339(),
            }
        });

        let value = self
            .client
            .post_json(&self.graphql_url, self.headers(), &body)
            .await?;

        let calendar = value
            .pointer("/data/user/contributionsCollection/contributionCalendar")
            .ok_or_else(|| {
                GithubError::Payload("contribution calendar missing from response".to_string())
            })?;

        let total_contributions = calendar
            .get("totalContributions")
            .and_then(Value::as_u64)
            .unwrap_or(0);

        let days = calendar
            .pointer("/weeks")
            .and_then(Value::as_array)
            .map(|weeks| {
                weeks
                    .iter()
                    .filter_map(|week| week.pointer("/contributionDays").and_then(Value::as_array))
                    .flatten()
                    .filter_map(|day| {
                        Some(ContributionDay {
                            date: day.get("date")?.as_str()?.to_string(),
                            count: day.get("contributionCount")?.as_u64()?,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(ContributionCalendar {
            total_contributions,
            days,
        })
    }
}
