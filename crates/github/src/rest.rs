//! REST payloads (only the fields the tuner reads) and their domain mapping.

use board::{
    ContributorLogin, ContributorStat, Issue, IssueNumber, PullRequest, PullRequestNumber,
    RepositoryId, Timestamp,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;

/// Page size used for every collection endpoint. Only the first page is read.
pub(crate) const PAGE_SIZE: u32 = 100;

pub(crate) fn contributors_path(repo: &RepositoryId) -> String {
    format!("/repos/{}/{}/contributors", repo.owner(), repo.name())
}

pub(crate) fn issues_path(repo: &RepositoryId) -> String {
    format!("/repos/{}/{}/issues", repo.owner(), repo.name())
}

pub(crate) fn pulls_path(repo: &RepositoryId) -> String {
    format!("/repos/{}/{}/pulls", repo.owner(), repo.name())
}

pub(crate) fn repository_path(repo: &RepositoryId) -> String {
    format!("/repos/{}/{}", repo.owner(), repo.name())
}

/// Query for the first page of a collection.
pub(crate) fn page_query() -> Vec<(&'static str, String)> {
    vec![("per_page", PAGE_SIZE.to_string())]
}

/// Query for the first page of issues and pull requests in any state,
/// optionally restricted to those updated since `since`.
pub(crate) fn activity_query(since: Option<Timestamp>) -> Vec<(&'static str, String)> {
    let mut query = vec![("state", "all".to_string())];
    if let Some(since) = since {
        query.push((
            "since",
            since.as_datetime().to_rfc3339_opts(SecondsFormat::Secs, true),
        ));
    }
    query.extend(page_query());
    query
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct ContributorPayload {
    /// Absent for anonymous contributors.
    login: Option<String>,
    contributions: u32,
}

impl ContributorPayload {
    /// Anonymous contributors have no login and are dropped.
    pub(crate) fn into_domain(self) -> Option<ContributorStat> {
        Some(ContributorStat {
            login: ContributorLogin::new(self.login?)?,
            contributions: self.contributions,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct IssuePayload {
    number: u64,
    title: String,
    created_at: DateTime<Utc>,
    /// Present when the "issue" is actually a pull request.
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

impl IssuePayload {
    /// Pull requests listed by the issues endpoint are dropped.
    pub(crate) fn into_domain(self) -> Option<Issue> {
        if self.pull_request.is_some() {
            return None;
        }
        Some(Issue {
            number: IssueNumber::new(self.number),
            title: self.title,
            created_at: Timestamp::from_utc(self.created_at),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PullRequestPayload {
    number: u64,
    created_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
}

impl PullRequestPayload {
    pub(crate) fn into_domain(self) -> PullRequest {
        PullRequest {
            number: PullRequestNumber::new(self.number),
            created_at: Timestamp::from_utc(self.created_at),
            merged_at: self.merged_at.map(Timestamp::from_utc),
        }
    }
}

/// Node ids needed to create a board linked to the repository.
#[derive(Debug, Deserialize)]
pub(crate) struct RepositoryPayload {
    pub(crate) node_id: String,
    pub(crate) owner: OwnerPayload,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OwnerPayload {
    pub(crate) node_id: String,
}
