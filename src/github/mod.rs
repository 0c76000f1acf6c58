//! GitHub access and contributor aggregation.

mod client;
mod contribution_map;
mod contributors;
mod models;
mod repo_ref;

pub use client::{GitHubClient, PAGE_SIZE};
pub use contribution_map::{ContributionMap, Contributor, RepoContributor};
pub use contributors::{ContributorAggregator, MAX_EVENT_PAGES};
pub use models::{Account, Commit, Event, Issue, PullRequest, Repository};
pub use repo_ref::RepoRef;
