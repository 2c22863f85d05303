/// Off-chain statistics aggregation
///
/// Pulls a user's profile, repositories (with per-repository language
/// maps), organizations, public-event contribution statistics and the
/// contribution calendar, and folds them into running totals.
use crate::core::{
    ContributionCalendar, ContributionStats, GithubError, GithubProfile, Organization,
    RepositorySummary,
};
use crate::github::api::{GithubApi, PublicEvent, EVENTS_PER_PAGE, REPOS_PER_PAGE};
use chrono::{Duration, Utc};
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// The public event feed serves at most 300 events
const MAX_EVENT_PAGES: usize = 3;

/// Days covered by the contribution calendar window
const CALENDAR_WINDOW_DAYS: i64 = 365;

/// Everything the off-chain side contributes to the user bundle
#[derive(Debug, Clone)]
pub struct GithubBundle {
    pub profile: GithubProfile,
    pub repositories: RepositorySummary,
    pub organizations: Vec<Organization>,
    pub contributions: ContributionStats,
    pub calendar: ContributionCalendar,
}

/// Aggregates one user's off-chain statistics from the API boundary
pub struct GithubAggregator {
    api: Arc<dyn GithubApi>,
}

impl GithubAggregator {
    pub fn new(api: Arc<dyn GithubApi>) -> Self {
        Self { api }
    }

    /// Fetch all off-chain pieces for one user. The independent calls
    /// run concurrently; any failure fails the aggregation.
    #[instrument(skip(self))]
    pub async fn aggregate(&self, username: &str) -> Result<GithubBundle, GithubError> {
        let (profile, repositories, organizations, contributions, calendar) = tokio::try_join!(
            self.api.fetch_profile(username),
            self.repositories(username),
            self.api.fetch_organizations(username),
            self.contributions(username),
            self.calendar(username),
        )?;

        info!(
            "aggregated {}: {} repos, {} orgs, {} calendar contributions",
            username,
            repositories.repos.len(),
            organizations.len(),
            calendar.total_contributions
        );

        Ok(GithubBundle {
            profile,
            repositories,
            organizations,
            contributions,
            calendar,
        })
    }

    /// All repositories with language maps and running totals
    pub async fn repositories(&self, username: &str) -> Result<RepositorySummary, GithubError> {
        let mut repos = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.api.fetch_repo_page(username, page).await?;
            let finished = batch.len() < REPOS_PER_PAGE;
            repos.extend(batch);
            if finished {
                break;
            }
            page += 1;
        }
        debug!("{}: {} repositories over {} pages", username, repos.len(), page);

        // Per-repository language fetches fan out concurrently
        let language_maps = join_all(
            repos
                .iter()
                .map(|repo| self.api.fetch_languages(&repo.full_name)),
        )
        .await;

        let mut summary = RepositorySummary::default();
        for (mut repo, languages) in repos.into_iter().zip(language_maps) {
            repo.languages = languages?;

            summary.total_stars += repo.stargazers_count;
            summary.total_forks += repo.forks_count;
            for (language, size) in &repo.languages {
                *summary
                    .language_totals
                    .entry(language.clone())
                    .or_insert(0) += size;
            }
            summary.repos.push(repo);
        }

        Ok(summary)
    }

    /// Contribution statistics classified from the public event feed
    pub async fn contributions(&self, username: &str) -> Result<ContributionStats, GithubError> {
        let mut stats = ContributionStats::default();
        let mut page = 1;
        loop {
            let events = self.api.fetch_event_page(username, page).await?;
            let finished = events.len() < EVENTS_PER_PAGE || page >= MAX_EVENT_PAGES;
            for event in &events {
                classify_event(&mut stats, event);
            }
            if finished {
                break;
            }
            page += 1;
        }
        Ok(stats)
    }

    /// Contribution calendar for the trailing window
    pub async fn calendar(&self, username: &str) -> Result<ContributionCalendar, GithubError> {
        let to = Utc::now();
        let from = to - Duration::days(CALENDAR_WINDOW_DAYS);
        self.api
            .fetch_contribution_calendar(username, from, to)
            .await
    }
}

/// Fold one public event into the running statistics. Event kinds that
/// do not count toward contributions leave the per-repository map
/// untouched, keeping it sparse.
fn classify_event(stats: &mut ContributionStats, event: &PublicEvent) {
    let opened = event.action.as_deref() == Some("opened");
    match event.kind.as_str() {
        "PushEvent" => {
            stats.total_commits += event.commit_count;
            stats
                .by_repository
                .entry(event.repo_name.clone())
                .or_default()
                .commits += event.commit_count;
        }
        "PullRequestEvent" if opened => {
            stats.total_pull_requests += 1;
            stats
                .by_repository
                .entry(event.repo_name.clone())
                .or_default()
                .pull_requests += 1;
        }
        "IssuesEvent" if opened => {
            stats.total_issues += 1;
            stats
                .by_repository
                .entry(event.repo_name.clone())
                .or_default()
                .issues += 1;
        }
        "PullRequestReviewCommentEvent" => {
            stats.total_reviews += 1;
            stats
                .by_repository
                .entry(event.repo_name.clone())
                .or_default()
                .reviews += 1;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ContributionDay, RepoDetail};
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::collections::HashMap;

    struct FakeApi {
        repo_count: usize,
        events: Vec<PublicEvent>,
    }

    fn repo(index: usize) -> RepoDetail {
        RepoDetail {
            name: format!("repo-{}", index),
            full_name: format!("octocat/repo-{}", index),
            description: None,
            stargazers_count: 2,
            forks_count: 1,
            language: Some("Rust".to_string()),
            languages: HashMap::new(),
            fork: false,
            html_url: None,
        }
    }

    fn event(kind: &str, repo: &str, action: Option<&str>, commits: u64) -> PublicEvent {
        PublicEvent {
            kind: kind.to_string(),
            repo_name: repo.to_string(),
            action: action.map(str::to_string),
            commit_count: commits,
        }
    }

    #[async_trait]
    impl GithubApi for FakeApi {
        async fn fetch_profile(&self, username: &str) -> Result<GithubProfile, GithubError> {
            Ok(GithubProfile {
                login: username.to_string(),
                followers: 10,
                ..GithubProfile::default()
            })
        }

        async fn fetch_repo_page(
            &self,
            _username: &str,
            page: usize,
        ) -> Result<Vec<RepoDetail>, GithubError> {
            let start = (page - 1) * REPOS_PER_PAGE;
            let end = self.repo_count.min(start + REPOS_PER_PAGE);
            Ok((start..end).map(repo).collect())
        }

        async fn fetch_languages(
            &self,
            full_name: &str,
        ) -> Result<HashMap<String, u64>, GithubError> {
            let mut languages = HashMap::new();
            languages.insert("Rust".to_string(), 1000);
            if full_name.ends_with("-0") {
                languages.insert("Solidity".to_string(), 500);
            }
            Ok(languages)
        }

        async fn fetch_organizations(
            &self,
            _username: &str,
        ) -> Result<Vec<Organization>, GithubError> {
            Ok(vec![Organization {
                login: "rustacea".to_string(),
                avatar_url: None,
                description: None,
            }])
        }

        async fn fetch_event_page(
            &self,
            _username: &str,
            page: usize,
        ) -> Result<Vec<PublicEvent>, GithubError> {
            if page == 1 {
                Ok(self.events.clone())
            } else {
                Ok(Vec::new())
            }
        }

        async fn fetch_contribution_calendar(
            &self,
            _username: &str,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> Result<ContributionCalendar, GithubError> {
            Ok(ContributionCalendar {
                total_contributions: 123,
                days: vec![ContributionDay {
                    date: "2026-01-01".to_string(),
                    count: 3,
                }],
            })
        }
    }

    #[tokio::test]
    async fn repositories_paginate_and_accumulate_totals() {
        let aggregator = GithubAggregator::new(Arc::new(FakeApi {
            repo_count: 150,
            events: Vec::new(),
        }));

        let summary = aggregator.repositories("octocat").await.unwrap();

        assert_eq!(summary.repos.len(), 150);
        assert_eq!(summary.total_stars, 300);
        assert_eq!(summary.total_forks, 150);
        assert_eq!(summary.language_totals["Rust"], 150_000);
        assert_eq!(summary.language_totals["Solidity"], 500);
        assert!(!summary.repos[0].languages.is_empty());
    }

    #[tokio::test]
    async fn events_classify_into_contribution_stats() {
        let aggregator = GithubAggregator::new(Arc::new(FakeApi {
            repo_count: 0,
            events: vec![
                event("PushEvent", "octocat/repo-a", None, 3),
                event("PullRequestEvent", "octocat/repo-a", Some("opened"), 0),
                event("PullRequestEvent", "octocat/repo-a", Some("closed"), 0),
                event("IssuesEvent", "octocat/repo-b", Some("opened"), 0),
                event("PullRequestReviewCommentEvent", "octocat/repo-b", None, 0),
                event("WatchEvent", "octocat/repo-c", Some("started"), 0),
            ],
        }));

        let stats = aggregator.contributions("octocat").await.unwrap();

        assert_eq!(stats.total_commits, 3);
        assert_eq!(stats.total_pull_requests, 1);
        assert_eq!(stats.total_issues, 1);
        assert_eq!(stats.total_reviews, 1);

        let repo_a = &stats.by_repository["octocat/repo-a"];
        assert_eq!(repo_a.commits, 3);
        assert_eq!(repo_a.pull_requests, 1);

        // Repositories touched only by non-counting events stay out
        assert!(!stats.by_repository.contains_key("octocat/repo-c"));
    }

    #[tokio::test]
    async fn aggregate_joins_all_pieces() {
        let aggregator = GithubAggregator::new(Arc::new(FakeApi {
            repo_count: 2,
            events: vec![event("PushEvent", "octocat/repo-0", None, 1)],
        }));

        let bundle = aggregator.aggregate("octocat").await.unwrap();

        assert_eq!(bundle.profile.login, "octocat");
        assert_eq!(bundle.repositories.repos.len(), 2);
        assert_eq!(bundle.organizations.len(), 1);
        assert_eq!(bundle.contributions.total_commits, 1);
        assert_eq!(bundle.calendar.total_contributions, 123);
    }
}
