//! Authenticated, paginated access to the GitHub REST v3 API.

use super::models::{Commit, Event, Issue, PullRequest, Repository, RepositoryContributor, Topics};
use crate::fetch::{FetchError, HttpClient, Request, Response, RetryPolicy};
use serde::de::DeserializeOwned;
use url::Url;
use url::form_urlencoded::byte_serialize;

/// Log target for the GitHub client
pub(super) const LOG_TARGET: &str = "github";

/// Label under which GitHub requests are tracked
const SOURCE: &str = "GitHub";

/// Items requested per page on every paginated endpoint.
pub const PAGE_SIZE: usize = 100;

const NO_CONTENT: u16 = 204;

const ACCEPT_V3: &str = "application/vnd.github+json";
const ACCEPT_TOPICS: &str = "application/vnd.github.mercy-preview+json";

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: HttpClient,
    api_url: String,
    token: Option<String>,
    retry: RetryPolicy,
}

impl GitHubClient {
    /// Create a client. Without a token every request fails with [`FetchError::MissingToken`].
    #[must_use]
    pub fn new(http: HttpClient, api_url: &Url, token: Option<String>, retry: RetryPolicy) -> Self {
        Self {
            http,
            api_url: api_url.as_str().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            retry,
        }
    }

    fn request(&self, path: &str, accept: &str) -> Result<Request, FetchError> {
        let token = self.token.as_deref().ok_or(FetchError::MissingToken)?;
        Ok(Request::get(SOURCE, format!("{}{path}", self.api_url))
            .accept(accept)
            .bearer(token))
    }

    async fn send(&self, path: &str, accept: &str) -> Result<Response, FetchError> {
        let request = self.request(path, accept)?;
        self.retry.run(path, || self.http.fetch(&request)).await
    }

    async fn get_with_accept<T: DeserializeOwned>(&self, path: &str, accept: &str) -> Result<T, FetchError> {
        self.send(path, accept).await?.json()
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        self.get_with_accept(path, ACCEPT_V3).await
    }

    /// One page of a list endpoint. `204 No Content` or an empty body is an empty page.
    async fn page<T: DeserializeOwned>(&self, path: &str, page: u32) -> Result<Vec<T>, FetchError> {
        let separator = if path.contains('?') { '&' } else { '?' };
        let response = self
            .send(&format!("{path}{separator}per_page={PAGE_SIZE}&page={page}"), ACCEPT_V3)
            .await?;

        if response.status() == NO_CONTENT || response.text().trim().is_empty() {
            return Ok(Vec::new());
        }
        response.json()
    }

    /// Fetch `path` page by page until a page comes back short, or `max_pages` pages were read.
    pub async fn paginate<T: DeserializeOwned>(&self, path: &str, max_pages: Option<u32>) -> Result<Vec<T>, FetchError> {
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let batch: Vec<T> = self.page(path, page).await?;
            let is_last_page = batch.len() < PAGE_SIZE;
            items.extend(batch);

            if is_last_page || max_pages.is_some_and(|max| page >= max) {
                break;
            }
            page += 1;
        }

        log::debug!(target: LOG_TARGET, "Read {} item(s) from '{path}' across {page} page(s)", items.len());
        Ok(items)
    }

    /// Repository metadata: default branch, fork parent, stars, archived flag.
    pub async fn repository(&self, full_name: &str) -> Result<Repository, FetchError> {
        self.get(&format!("/repos/{full_name}")).await
    }

    /// Repository topics, in the order GitHub lists them.
    pub async fn topics(&self, full_name: &str) -> Result<Vec<String>, FetchError> {
        let topics: Topics = self.get_with_accept(&format!("/repos/{full_name}/topics"), ACCEPT_TOPICS).await?;
        Ok(topics.names)
    }

    /// Every repository of the organization, archived ones included.
    pub async fn organization_repositories(&self, organization: &str) -> Result<Vec<Repository>, FetchError> {
        self.paginate(&format!("/orgs/{}/repos", encode(organization)), None).await
    }

    /// Contributor logins as GitHub ranks them. Empty for a repository without commits.
    pub async fn contributors(&self, full_name: &str) -> Result<Vec<RepositoryContributor>, FetchError> {
        self.paginate(&format!("/repos/{full_name}/contributors"), None).await
    }

    /// Commits reachable from `branch`, or from the default branch when `None`.
    pub async fn commits(&self, full_name: &str, branch: Option<&str>) -> Result<Vec<Commit>, FetchError> {
        let path = match branch {
            Some(branch) => format!("/repos/{full_name}/commits?sha={}", encode(branch)),
            None => format!("/repos/{full_name}/commits"),
        };
        self.paginate(&path, None).await
    }

    /// Closed pull requests, merged or not. The listing does not say which.
    pub async fn closed_pull_requests(&self, full_name: &str) -> Result<Vec<PullRequest>, FetchError> {
        self.paginate(&format!("/repos/{full_name}/pulls?state=closed"), None).await
    }

    /// The full pull request, which carries `merged_at`.
    pub async fn pull_request(&self, full_name: &str, number: u64) -> Result<PullRequest, FetchError> {
        self.get(&format!("/repos/{full_name}/pulls/{number}")).await
    }

    /// Issues in every state. GitHub includes pull requests in this listing.
    pub async fn issues(&self, full_name: &str) -> Result<Vec<Issue>, FetchError> {
        self.paginate(&format!("/repos/{full_name}/issues?state=all"), None).await
    }

    /// The user's most recent public events, newest first, reading at most `max_pages` pages.
    ///
    /// GitHub serves a bounded event history and rejects pages past it, so a failure after the
    /// first page ends the listing with the events read so far.
    pub async fn user_events(&self, login: &str, max_pages: u32) -> Result<Vec<Event>, FetchError> {
        let path = format!("/users/{}/events", encode(login));
        let mut events = Vec::new();

        for page in 1..=max_pages.max(1) {
            match self.page::<Event>(&path, page).await {
                Ok(batch) => {
                    let is_last_page = batch.len() < PAGE_SIZE;
                    events.extend(batch);
                    if is_last_page {
                        break;
                    }
                }
                Err(e) if page > 1 => {
                    log::debug!(target: LOG_TARGET, "Stopped reading events of '{login}' at page {page}: {e}");
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(events)
    }
}

fn encode(segment: &str) -> String {
    byte_serialize(segment.as_bytes()).collect()
}
