//! Per-repository contributor statistics.

use super::client::{GitHubClient, LOG_TARGET};
use super::contribution_map::{Contributor, RepoContributor};
use super::models::{Commit, Event, PullRequest};
use crate::fetch::FetchError;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// At most this many pages of a user's public events are scanned for organization activity.
pub const MAX_EVENT_PAGES: u32 = 5;

/// Collects contributors for the repositories of one organization.
///
/// Parent contributor sets and per-user activity are cached for the lifetime of the aggregator,
/// which the sync driver keeps for exactly one run.
#[derive(Debug)]
pub struct ContributorAggregator<'a> {
    github: &'a GitHubClient,
    organization: String,
    today: NaiveDate,
    parent_contributors: Mutex<HashMap<String, Arc<HashSet<String>>>>,
    last_activity: Mutex<HashMap<String, Option<i64>>>,
}

impl<'a> ContributorAggregator<'a> {
    #[must_use]
    pub fn new(github: &'a GitHubClient, organization: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            github,
            organization: organization.into(),
            today: now.date_naive(),
            parent_contributors: Mutex::new(HashMap::new()),
            last_activity: Mutex::new(HashMap::new()),
        }
    }

    /// Contributors of `full_name` with commit, merged pull request and issue counts.
    ///
    /// For forks, logins that contributed to the parent repository are not credited. A private or
    /// missing repository yields an empty list.
    pub async fn repository_contributors(&self, full_name: &str) -> Result<Vec<RepoContributor>, FetchError> {
        let start_time = std::time::Instant::now();
        let repo = self.github.repository(full_name).await?;
        let default_branch = repo.default_branch.as_deref();

        let excluded = match repo.parent.as_ref().filter(|_| repo.fork) {
            Some(parent) => self.parent_contributors(&parent.full_name).await?,
            None => Arc::default(),
        };

        let commits = match self.github.commits(full_name, default_branch).await {
            Ok(commits) => commits,
            Err(e) if e.is_not_found_or_forbidden() => {
                log::warn!(target: LOG_TARGET, "Repository '{full_name}' is private or missing, no contributors recorded: {e}");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut tally = count_commits(&commits, &excluded);
        if tally.is_empty() {
            return Ok(Vec::new());
        }

        let logins: HashSet<&str> = tally.keys().map(String::as_str).collect();
        let merged = self.merged_pull_requests(full_name, default_branch, &logins).await?;
        let issues = self.issue_counts(full_name, &logins).await?;

        for (login, entry) in &mut tally {
            entry.contributor.pull_request_count = merged.get(login.as_str()).copied().unwrap_or(0);
            entry.contributor.issue_count = issues.get(login.as_str()).copied().unwrap_or(0);
            entry.contributor.last_active_days = self.last_active_days(login).await;
        }

        log::debug!(
            target: LOG_TARGET,
            "Collected {} contributor(s) for '{full_name}' from {} commit(s) in {:.3}s",
            tally.len(),
            commits.len(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(tally.into_values().collect())
    }

    async fn parent_contributors(&self, parent: &str) -> Result<Arc<HashSet<String>>, FetchError> {
        if let Some(cached) = self.parent_contributors.lock().expect("lock poisoned").get(parent) {
            return Ok(Arc::clone(cached));
        }

        let logins: HashSet<String> = match self.github.contributors(parent).await {
            Ok(contributors) => contributors.into_iter().map(|c| c.login).collect(),
            Err(e) if e.is_not_found_or_forbidden() => {
                log::warn!(target: LOG_TARGET, "Parent repository '{parent}' is not accessible, nothing excluded: {e}");
                HashSet::new()
            }
            Err(e) => return Err(e),
        };

        log::debug!(target: LOG_TARGET, "Excluding {} parent contributor(s) of '{parent}'", logins.len());
        let logins = Arc::new(logins);
        let _ = self
            .parent_contributors
            .lock()
            .expect("lock poisoned")
            .insert(parent.to_string(), Arc::clone(&logins));
        Ok(logins)
    }

    /// Count closed pull requests into the default branch whose detail confirms they were merged.
    async fn merged_pull_requests(
        &self,
        full_name: &str,
        default_branch: Option<&str>,
        logins: &HashSet<&str>,
    ) -> Result<HashMap<String, u64>, FetchError> {
        let closed = self.github.closed_pull_requests(full_name).await?;
        let mut counts = HashMap::new();

        for pull in closed.iter().filter(|p| is_candidate(p, default_branch, logins)) {
            let detail = self.github.pull_request(full_name, pull.number).await?;
            if detail.merged_at.is_some()
                && let Some(user) = &pull.user
            {
                *counts.entry(user.login.clone()).or_insert(0) += 1;
            }
        }

        Ok(counts)
    }

    async fn issue_counts(&self, full_name: &str, logins: &HashSet<&str>) -> Result<HashMap<String, u64>, FetchError> {
        let issues = self.github.issues(full_name).await?;
        let mut counts = HashMap::new();

        for issue in issues.iter().filter(|i| !i.is_pull_request()) {
            if let Some(user) = issue.user.as_ref().filter(|u| logins.contains(u.login.as_str())) {
                *counts.entry(user.login.clone()).or_insert(0) += 1;
            }
        }

        Ok(counts)
    }

    /// Days since the user's most recent public event in the organization.
    ///
    /// A failed event fetch is logged and treated as unknown.
    async fn last_active_days(&self, login: &str) -> Option<i64> {
        if let Some(cached) = self.last_activity.lock().expect("lock poisoned").get(login) {
            return *cached;
        }

        let days = match self.github.user_events(login, MAX_EVENT_PAGES).await {
            Ok(events) => days_since_org_activity(&events, &self.organization, self.today),
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not read public events of '{login}': {e}");
                None
            }
        };

        let _ = self.last_activity.lock().expect("lock poisoned").insert(login.to_string(), days);
        days
    }
}

fn is_candidate(pull: &PullRequest, default_branch: Option<&str>, logins: &HashSet<&str>) -> bool {
    let targets_default = default_branch.is_none_or(|branch| pull.base.branch == branch);
    let by_contributor = pull.user.as_ref().is_some_and(|u| logins.contains(u.login.as_str()));
    targets_default && by_contributor
}

/// Fold commits into per-login contributors, skipping unlinked and excluded authors.
fn count_commits(commits: &[Commit], excluded: &HashSet<String>) -> BTreeMap<String, RepoContributor> {
    let mut tally: BTreeMap<String, RepoContributor> = BTreeMap::new();

    for author in commits.iter().filter_map(|c| c.author.as_ref()) {
        if excluded.contains(&author.login) {
            continue;
        }

        tally
            .entry(author.login.clone())
            .or_insert_with(|| RepoContributor {
                contributor: Contributor {
                    login: author.login.clone(),
                    id: author.id,
                    avatar_url: author.avatar_url.clone(),
                    html_url: author.html_url.clone(),
                    contributions: 0,
                    pull_request_count: 0,
                    issue_count: 0,
                    last_active_days: None,
                },
                account_type: author.kind.clone(),
            })
            .contributor
            .contributions += 1;
    }

    tally
}

/// Whole calendar days between the latest event in `organization` and `today`.
fn days_since_org_activity(events: &[Event], organization: &str, today: NaiveDate) -> Option<i64> {
    let latest = events
        .iter()
        .filter(|e| e.org.as_ref().is_some_and(|org| org.login.eq_ignore_ascii_case(organization)))
        .map(|e| e.created_at)
        .max()?;

    Some((today - latest.date_naive()).num_days().max(0))
}
