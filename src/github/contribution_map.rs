//! Organization-wide accumulation of per-repository contributors.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A contributor as persisted in `contributors.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub login: String,
    pub id: u64,
    pub avatar_url: String,
    pub html_url: String,

    /// Number of commits on default branches.
    pub contributions: u64,

    #[serde(rename = "pullRequestCount")]
    pub pull_request_count: u64,

    #[serde(rename = "issueCount")]
    pub issue_count: u64,

    /// Whole days since the contributor's latest public activity in the organization.
    #[serde(rename = "lastActiveDays")]
    pub last_active_days: Option<i64>,
}

/// A contributor as seen in a single repository, before bot filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoContributor {
    pub contributor: Contributor,

    /// GitHub account type (`User`, `Bot`, `Organization`).
    pub account_type: String,
}

impl RepoContributor {
    #[must_use]
    pub fn is_bot(&self) -> bool {
        self.account_type.eq_ignore_ascii_case("bot") || self.contributor.login.ends_with("[bot]")
    }
}

/// Accumulates contributors across repositories, keyed by login.
///
/// Merging sums the commit, pull request and issue counts. Identity fields keep the first value
/// seen. `lastActiveDays` keeps the most recent known activity.
#[derive(Debug, Default)]
pub struct ContributionMap {
    entries: HashMap<String, Contributor>,
}

impl ContributionMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one repository's counts for a contributor to the organization totals.
    pub fn merge(&mut self, contributor: Contributor) {
        match self.entries.get_mut(&contributor.login) {
            Some(existing) => {
                existing.contributions += contributor.contributions;
                existing.pull_request_count += contributor.pull_request_count;
                existing.issue_count += contributor.issue_count;
                existing.last_active_days = match (existing.last_active_days, contributor.last_active_days) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
            }
            None => {
                let _ = self.entries.insert(contributor.login.clone(), contributor);
            }
        }
    }

    pub fn merge_repository(&mut self, contributors: impl IntoIterator<Item = Contributor>) {
        for contributor in contributors {
            self.merge(contributor);
        }
    }

    /// Distinct logins merged so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flatten into the persisted order: most contributions first, then by login.
    #[must_use]
    pub fn into_sorted(self) -> Vec<Contributor> {
        let mut contributors: Vec<_> = self.entries.into_values().collect();
        contributors.sort_by(|a, b| b.contributions.cmp(&a.contributions).then_with(|| a.login.cmp(&b.login)));
        contributors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contributor(login: &str, contributions: u64, prs: u64, issues: u64, last_active: Option<i64>) -> Contributor {
        Contributor {
            login: login.to_string(),
            id: login.len() as u64,
            avatar_url: format!("https://avatars.example/{login}"),
            html_url: format!("https://github.com/{login}"),
            contributions,
            pull_request_count: prs,
            issue_count: issues,
            last_active_days: last_active,
        }
    }

    #[test]
    fn test_merge_sums_counts_across_repositories() {
        let mut map = ContributionMap::new();
        map.merge_repository([contributor("alice", 5, 1, 2, Some(10)), contributor("bob", 1, 0, 0, None)]);
        map.merge_repository([contributor("alice", 7, 2, 0, Some(3))]);

        assert_eq!(map.len(), 2);
        let merged = map.into_sorted();
        let alice = merged.iter().find(|c| c.login == "alice").unwrap();
        assert_eq!(alice.contributions, 12);
        assert_eq!(alice.pull_request_count, 3);
        assert_eq!(alice.issue_count, 2);
        assert_eq!(alice.last_active_days, Some(3));
    }

    #[test]
    fn test_known_activity_beats_unknown() {
        let mut map = ContributionMap::new();
        map.merge(contributor("carol", 1, 0, 0, None));
        map.merge(contributor("carol", 1, 0, 0, Some(40)));
        map.merge(contributor("carol", 1, 0, 0, None));
        assert_eq!(map.into_sorted()[0].last_active_days, Some(40));
    }

    #[test]
    fn test_into_sorted_orders_by_contributions_then_login() {
        let mut map = ContributionMap::new();
        map.merge_repository([
            contributor("zed", 3, 0, 0, None),
            contributor("amy", 3, 0, 0, None),
            contributor("max", 9, 0, 0, None),
        ]);

        let logins: Vec<_> = map.into_sorted().into_iter().map(|c| c.login).collect();
        assert_eq!(logins, vec!["max", "amy", "zed"]);
    }

    #[test]
    fn test_each_login_appears_once() {
        let mut map = ContributionMap::new();
        assert!(map.is_empty());
        for _ in 0..3 {
            map.merge_repository([contributor("dup", 1, 0, 0, None)]);
        }
        let sorted = map.into_sorted();
        assert_eq!(sorted.len(), 1);
        assert_eq!(sorted[0].contributions, 3);
    }

    #[test]
    fn test_bot_detection() {
        let bot = RepoContributor {
            contributor: contributor("github-actions[bot]", 1, 0, 0, None),
            account_type: "Bot".to_string(),
        };
        let named_bot = RepoContributor {
            contributor: contributor("renovate[bot]", 1, 0, 0, None),
            account_type: "User".to_string(),
        };
        let human = RepoContributor {
            contributor: contributor("alice", 1, 0, 0, None),
            account_type: "User".to_string(),
        };
        assert!(bot.is_bot());
        assert!(named_bot.is_bot());
        assert!(!human.is_bot());
    }

    #[test]
    fn test_serialized_field_names() {
        let value = serde_json::to_value(contributor("alice", 2, 1, 0, None)).unwrap();
        assert_eq!(value["pullRequestCount"], 1);
        assert_eq!(value["issueCount"], 0);
        assert!(value["lastActiveDays"].is_null());
        assert_eq!(value["avatar_url"], "https://avatars.example/alice");
    }
}
