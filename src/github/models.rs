//! The subset of GitHub REST v3 payloads the sync relies on.

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub stargazers_count: u64,

    /// Only present on the single-repository endpoint, and only for forks.
    #[serde(default)]
    pub parent: Option<ParentRepository>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParentRepository {
    pub full_name: String,
}

/// A GitHub user, organization or bot account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    pub login: String,
    pub id: u64,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Commit {
    /// `None` when the commit email is not linked to a GitHub account.
    #[serde(default)]
    pub author: Option<Account>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub user: Option<Account>,
    pub base: PullRequestBase,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestBase {
    #[serde(rename = "ref")]
    pub branch: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: u64,
    #[serde(default)]
    pub user: Option<Account>,

    /// Present when the "issue" is really a pull request.
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

impl Issue {
    #[must_use]
    pub const fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryContributor {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub org: Option<EventOrganization>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventOrganization {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Topics {
    #[serde(default)]
    pub names: Vec<String>,
}
