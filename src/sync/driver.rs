use super::SyncSummary;
use crate::cms::{CmsClient, Project, ProjectType};
use crate::config::Config;
use crate::fetch::{FetchError, HttpClient};
use crate::github::{ContributionMap, Contributor, ContributorAggregator, GitHubClient, RepoContributor, RepoRef};
use crate::packages::{
    DeclaredPackage, NpmProvider, PackageStats, PackageStatsAggregator, PepyScraper, PypiProvider, TotalDownloadsSource,
    flatten_packages, ranked,
};
use crate::snapshot::{Artifact, SnapshotWriter};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};
use strum::IntoEnumIterator;

/// Log target for the sync driver
const LOG_TARGET: &str = "sync";

/// GitHub topics kept per project.
pub const MAX_TAGS: usize = 5;

/// Tokens for the upstreams that need them.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub github_token: Option<String>,
    pub cms_token: Option<String>,
}

/// Runs one complete refresh of the snapshot files.
#[derive(Debug)]
pub struct SyncDriver<S> {
    config: Config,
    cms: CmsClient,
    github: GitHubClient,
    packages: PackageStatsAggregator<S>,
    writer: SnapshotWriter,
    artifacts: BTreeSet<Artifact>,
    now: DateTime<Utc>,
}

impl SyncDriver<PepyScraper> {
    /// A driver that scrapes PyPI totals from the configured totals page.
    #[must_use]
    pub fn new(config: Config, credentials: Credentials, http: &HttpClient, now: DateTime<Utc>) -> Self {
        let totals = PepyScraper::new(http.clone(), &config.pypi.totals_url);
        Self::with_totals_source(config, credentials, http, totals, now)
    }
}

impl<S: TotalDownloadsSource> SyncDriver<S> {
    #[must_use]
    pub fn with_totals_source(config: Config, credentials: Credentials, http: &HttpClient, totals: S, now: DateTime<Utc>) -> Self {
        let cms = CmsClient::new(http.clone(), config.cms.endpoint.clone(), credentials.cms_token);
        let github = GitHubClient::new(
            http.clone(),
            &config.github.api_url,
            credentials.github_token,
            config.github.retry.to_policy(),
        );

        let npm = NpmProvider::new(
            http.clone(),
            &config.npm.api_url,
            config.npm.queue.to_queue("npm"),
            config.npm.retry.to_policy(),
        );
        let pypi = PypiProvider::new(
            http.clone(),
            &config.pypi.api_url,
            config.pypi.queue.to_queue("pypi"),
            config.pypi.retry.to_policy(),
            totals,
        );

        Self {
            writer: SnapshotWriter::new(config.assets_dir.clone()),
            config,
            cms,
            github,
            packages: PackageStatsAggregator::new(npm, pypi),
            artifacts: Artifact::iter().collect(),
            now,
        }
    }

    /// Restrict the run to the given artifacts. An empty selection keeps all of them.
    #[must_use]
    pub fn only(mut self, artifacts: impl IntoIterator<Item = Artifact>) -> Self {
        let selected: BTreeSet<_> = artifacts.into_iter().collect();
        if !selected.is_empty() {
            self.artifacts = selected;
        }
        self
    }

    fn wants(&self, artifact: Artifact) -> bool {
        self.artifacts.contains(&artifact)
    }

    /// Collect everything, then write the selected snapshot files.
    ///
    /// Failing to read the CMS or to list the organization's repositories aborts the run before
    /// anything is written. Failures for a single project, repository or package only leave
    /// that unit out.
    pub async fn run(&self) -> Result<SyncSummary> {
        let start_time = std::time::Instant::now();
        let mut summary = SyncSummary::default();

        log::info!(
            target: LOG_TARGET,
            "Syncing '{}' into '{}' ({})",
            self.config.organization,
            self.writer.dir(),
            self.artifacts.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        );

        let mut current = if self.wants(Artifact::Projects) {
            self.cms
                .projects(ProjectType::Current, &self.config.cms.status)
                .await
                .context("fetching current projects from the CMS")?
        } else {
            Vec::new()
        };

        let upcoming = if self.wants(Artifact::UpcomingProjects) {
            self.cms
                .projects(ProjectType::Upcoming, &self.config.cms.status)
                .await
                .context("fetching upcoming projects from the CMS")?
        } else {
            Vec::new()
        };

        summary.current_projects = current.len();
        summary.upcoming_projects = upcoming.len();
        summary.unenriched_projects = self.enrich_projects(&mut current).await;

        let contributors = if self.wants(Artifact::Contributors) {
            let contributors = self.collect_contributors(&mut summary).await?;
            summary.contributors = contributors.len();
            contributors
        } else {
            Vec::new()
        };

        let declared = flatten_packages(&self.config.projects);
        summary.declared_packages = declared.len();

        let stats = if self.wants(Artifact::Stats) {
            self.collect_stats(&declared).await
        } else {
            Vec::new()
        };
        summary.package_stats = stats.len();

        for artifact in &self.artifacts {
            let path = match artifact {
                Artifact::Projects => self.writer.write(*artifact, &current)?,
                Artifact::UpcomingProjects => self.writer.write(*artifact, &upcoming)?,
                Artifact::Contributors => self.writer.write(*artifact, &contributors)?,
                Artifact::Packages => self.writer.write(*artifact, &declared)?,
                Artifact::Stats => self.writer.write(*artifact, &stats)?,
            };
            summary.written.push(path);
        }

        log::info!(target: LOG_TARGET, "Sync finished in {:.3}s", start_time.elapsed().as_secs_f64());
        Ok(summary)
    }

    /// Fill in stars and tags from GitHub. Returns how many projects could not be enriched.
    async fn enrich_projects(&self, projects: &mut [Project]) -> usize {
        let mut failures = 0;

        for project in projects.iter_mut() {
            let Some(repo) = project.github_repository_link.as_deref().and_then(RepoRef::from_github_url) else {
                log::debug!(target: LOG_TARGET, "Project '{}' has no GitHub repository", project.title);
                continue;
            };

            let full_name = repo.full_name();
            let enrichment = async {
                let repository = self.github.repository(&full_name).await?;
                let topics = self.github.topics(&full_name).await?;
                Ok::<_, FetchError>((repository.stargazers_count, topics))
            };

            match enrichment.await {
                Ok((stars, topics)) => {
                    project.stars = Some(stars);
                    project.tags = topics.into_iter().take(MAX_TAGS).collect();
                }
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Could not read stars and topics of '{full_name}' for '{}': {e}", project.title);
                    project.stars = None;
                    project.tags.clear();
                    failures += 1;
                }
            }
        }

        failures
    }

    async fn collect_contributors(&self, summary: &mut SyncSummary) -> Result<Vec<Contributor>> {
        let repositories = self
            .github
            .organization_repositories(&self.config.organization)
            .await
            .with_context(|| format!("listing the repositories of '{}'", self.config.organization))?;
        summary.repositories = repositories.len();
        log::info!(target: LOG_TARGET, "Found {} repositories in '{}'", repositories.len(), self.config.organization);

        let excluded: HashSet<String> = self
            .config
            .github
            .excluded_logins
            .iter()
            .map(|login| login.to_ascii_lowercase())
            .collect();

        let aggregator = ContributorAggregator::new(&self.github, self.config.organization.clone(), self.now);
        let mut map = ContributionMap::new();

        for repository in &repositories {
            if repository.archived && self.config.github.skip_archived {
                log::debug!(target: LOG_TARGET, "Skipping archived repository '{}'", repository.full_name);
                summary.archived_repositories += 1;
                continue;
            }

            match aggregator.repository_contributors(&repository.full_name).await {
                Ok(contributors) => {
                    map.merge_repository(
                        contributors
                            .into_iter()
                            .filter(|c| !is_excluded(c, &excluded))
                            .map(|c| c.contributor),
                    );
                }
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Skipping contributors of '{}': {e}", repository.full_name);
                    summary.failed_repositories += 1;
                }
            }
        }

        if map.is_empty() {
            log::warn!(target: LOG_TARGET, "No contributors found in '{}'", self.config.organization);
        } else {
            log::info!(target: LOG_TARGET, "Merged {} contributor(s) across the organization", map.len());
        }

        Ok(map.into_sorted())
    }

    async fn collect_stats(&self, declared: &[DeclaredPackage]) -> Vec<PackageStats> {
        ranked(self.packages.collect(declared).await)
    }
}

fn is_excluded(contributor: &RepoContributor, excluded_logins: &HashSet<String>) -> bool {
    contributor.is_bot() || excluded_logins.contains(&contributor.contributor.login.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::HttpSettings;
    use crate::packages::TotalDownloads;
    use camino::Utf8PathBuf;
    use chrono::TimeZone;
    use core::future::Future;
    use core::time::Duration;
    use serde_json::{Value, json};
    use url::Url;
    use wiremock::matchers::{body_partial_json, method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug)]
    struct FixedTotals;

    impl TotalDownloadsSource for FixedTotals {
        fn total_downloads(&self, _package: &str) -> impl Future<Output = TotalDownloads> + Send {
            async { TotalDownloads::Available(5_000) }
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn config(server: &MockServer, assets: &tempfile::TempDir) -> Config {
        let base = server.uri();
        Config::from_yaml(&format!(
            r#"
organization: acme
assets_dir: {assets}
cms:
  endpoint: {base}/graphql
github:
  api_url: {base}/gh
  excluded_logins: ["release-robot"]
  retry: {{ max_attempts: 1, initial_delay: 1ms, max_jitter: 0ms }}
npm:
  api_url: {base}/npm
  queue: {{ concurrency: 1, delay: 0ms }}
pypi:
  api_url: {base}/pypi
  totals_url: {base}/pepy
  queue: {{ concurrency: 1, delay: 0ms }}
http:
  timeout: 5s
  retries: 1
  backoff_step: 1ms
projects:
  - project: widgets
    packages:
      - {{ name: widgets-js, title: Widgets for JS, type: npm }}
      - {{ name: widgets-py, type: pypi }}
      - {{ name: widgets-old, type: npm }}
"#,
            assets = Utf8PathBuf::try_from(assets.path().join("out")).unwrap(),
        ))
        .unwrap()
    }

    fn driver(server: &MockServer, assets: &tempfile::TempDir, token: Option<&str>) -> SyncDriver<FixedTotals> {
        let http = HttpClient::new(HttpSettings::default()).unwrap();
        let credentials = Credentials {
            github_token: token.map(str::to_string),
            cms_token: None,
        };
        SyncDriver::with_totals_source(config(server, assets), credentials, &http, FixedTotals, now())
    }

    fn account(login: &str, id: u64, kind: &str) -> Value {
        json!({
            "login": login,
            "id": id,
            "avatar_url": format!("https://avatars.example/{login}"),
            "html_url": format!("https://github.com/{login}"),
            "type": kind
        })
    }

    async fn mount_json(server: &MockServer, at: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn mount_cms(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_partial_json(json!({ "variables": { "type": "current" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "projects": [
                { "id": 1, "title": "Widgets", "github_repository_link": "https://github.com/acme/widgets",
                  "project_type": "current", "status": "published" },
                { "id": 2, "title": "Gadgets", "github_repository_link": "https://github.com/acme/gadgets",
                  "project_type": "current", "status": "published" },
                { "id": 3, "title": "Docs only", "github_repository_link": null,
                  "project_type": "current", "status": "published" }
            ] } })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_partial_json(json!({ "variables": { "type": "upcoming" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "projects": [
                { "id": "next", "title": "Next", "project_type": "upcoming", "status": "published" }
            ] } })))
            .mount(server)
            .await;
    }

    async fn mount_repository(server: &MockServer, name: &str, commits: &[Value]) {
        let full_name = format!("acme/{name}");
        mount_json(
            server,
            &format!("/gh/repos/{full_name}"),
            json!({ "name": name, "full_name": full_name, "default_branch": "main", "stargazers_count": 12 }),
        )
        .await;
        mount_json(server, &format!("/gh/repos/{full_name}/commits"), json!(commits)).await;
        mount_json(server, &format!("/gh/repos/{full_name}/pulls"), json!([])).await;
        mount_json(server, &format!("/gh/repos/{full_name}/issues"), json!([])).await;
    }

    async fn mount_github(server: &MockServer) {
        mount_json(
            server,
            "/gh/orgs/acme/repos",
            json!([
                { "name": "widgets", "full_name": "acme/widgets" },
                { "name": "tools", "full_name": "acme/tools" },
                { "name": "legacy", "full_name": "acme/legacy", "archived": true },
                { "name": "broken", "full_name": "acme/broken" }
            ]),
        )
        .await;

        mount_repository(
            server,
            "widgets",
            &[
                json!({ "author": account("alice", 1, "User") }),
                json!({ "author": account("alice", 1, "User") }),
                json!({ "author": account("dependabot[bot]", 9, "Bot") }),
                json!({ "author": account("release-robot", 8, "User") }),
                json!({ "author": null }),
            ],
        )
        .await;
        mount_repository(
            server,
            "tools",
            &[
                json!({ "author": account("alice", 1, "User") }),
                json!({ "author": account("bob", 2, "User") }),
            ],
        )
        .await;
        mount_json(server, "/gh/repos/acme/widgets/topics", json!({ "names": ["a", "b", "c", "d", "e", "f"] })).await;

        Mock::given(method("GET"))
            .and(path("/gh/repos/acme/broken"))
            .respond_with(ResponseTemplate::new(422).set_body_string("unprocessable"))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/gh/repos/acme/gadgets"))
            .respond_with(ResponseTemplate::new(404))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/gh/users/[^/]+/events$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(server)
            .await;
    }

    async fn mount_packages(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path_regex(r"^/npm/downloads/range/[^/]+/widgets-js$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "downloads": [{ "downloads": 10 }] })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/npm/downloads/range/[^/]+/widgets-old$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "downloads": [] })))
            .mount(server)
            .await;
        mount_json(
            server,
            "/pypi/api/packages/widgets-py/recent",
            json!({ "data": { "last_day": 3, "last_week": 20, "last_month": 90 } }),
        )
        .await;
    }

    #[tokio::test]
    async fn test_full_run_writes_every_snapshot() {
        let server = MockServer::start().await;
        mount_cms(&server).await;
        mount_github(&server).await;
        mount_packages(&server).await;

        let assets = tempfile::tempdir().unwrap();
        let driver = driver(&server, &assets, Some("token"));
        let summary = driver.run().await.unwrap();

        assert_eq!(summary.current_projects, 3);
        assert_eq!(summary.upcoming_projects, 1);
        assert_eq!(summary.unenriched_projects, 1);
        assert_eq!(summary.repositories, 4);
        assert_eq!(summary.archived_repositories, 1);
        assert_eq!(summary.failed_repositories, 1);
        assert_eq!(summary.written.len(), 5);

        let writer = SnapshotWriter::new(Utf8PathBuf::try_from(assets.path().join("out")).unwrap());

        let projects: Vec<Project> = writer.read(Artifact::Projects).unwrap();
        assert_eq!(projects[0].stars, Some(12));
        assert_eq!(projects[0].tags, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(projects[1].stars, None);
        assert!(projects[1].tags.is_empty());
        assert_eq!(projects[2].stars, None);

        let upcoming: Vec<Project> = writer.read(Artifact::UpcomingProjects).unwrap();
        assert_eq!(upcoming.len(), 1);

        let contributors: Vec<Contributor> = writer.read(Artifact::Contributors).unwrap();
        let logins: Vec<_> = contributors.iter().map(|c| c.login.as_str()).collect();
        assert_eq!(logins, vec!["alice", "bob"]);
        assert_eq!(contributors[0].contributions, 3);
        assert_eq!(contributors[0].last_active_days, None);

        let packages: Vec<DeclaredPackage> = writer.read(Artifact::Packages).unwrap();
        assert_eq!(packages.len(), 3);
        assert_eq!(packages[1].title, "widgets-py");

        let stats: Vec<PackageStats> = writer.read(Artifact::Stats).unwrap();
        let names: Vec<_> = stats.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["widgets-py", "widgets-js"]);
        assert_eq!(stats[1].title, "Widgets for JS");
        assert_eq!(stats[0].total, 5_000);
        assert_eq!(stats[0].year, 1_080);
    }

    #[tokio::test]
    async fn test_cms_failure_writes_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad query"))
            .mount(&server)
            .await;

        let assets = tempfile::tempdir().unwrap();
        let err = driver(&server, &assets, Some("token")).run().await.unwrap_err();
        assert!(format!("{err:#}").contains("current projects"), "{err:#}");
        assert!(!assets.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_missing_github_token_is_fatal() {
        let server = MockServer::start().await;
        mount_cms(&server).await;
        mount_packages(&server).await;

        let assets = tempfile::tempdir().unwrap();
        let err = driver(&server, &assets, None).run().await.unwrap_err();
        assert!(format!("{err:#}").contains("GITHUB_TOKEN"), "{err:#}");
        assert!(!assets.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_repository_listing_failure_writes_nothing() {
        let server = MockServer::start().await;
        mount_cms(&server).await;
        mount_packages(&server).await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/gh/repos/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gh/orgs/acme/repos"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .expect(1)
            .mount(&server)
            .await;

        let assets = tempfile::tempdir().unwrap();
        let err = driver(&server, &assets, Some("token")).run().await.unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("listing the repositories of 'acme'"), "{message}");
        assert!(message.contains("502"), "{message}");
        assert!(!assets.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_only_stats_skips_cms_and_github() {
        let server = MockServer::start().await;
        mount_packages(&server).await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/gh/"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let assets = tempfile::tempdir().unwrap();
        let summary = driver(&server, &assets, None)
            .only([Artifact::Stats, Artifact::Packages])
            .run()
            .await
            .unwrap();

        assert_eq!(summary.package_stats, 2);
        let written: Vec<_> = summary.written.iter().filter_map(|p| p.file_name()).collect();
        assert_eq!(written, vec!["packages.json", "stats.json"]);
    }

    #[test]
    fn test_bots_and_excluded_logins_are_dropped() {
        let entry = |login: &str, kind: &str| RepoContributor {
            contributor: Contributor {
                login: login.to_string(),
                id: 1,
                avatar_url: String::new(),
                html_url: String::new(),
                contributions: 1,
                pull_request_count: 0,
                issue_count: 0,
                last_active_days: None,
            },
            account_type: kind.to_string(),
        };
        let excluded: HashSet<String> = ["release-robot".to_string()].into();

        assert!(is_excluded(&entry("renovate", "Bot"), &excluded));
        assert!(is_excluded(&entry("github-actions[bot]", "User"), &excluded));
        assert!(is_excluded(&entry("Release-Robot", "User"), &excluded));
        assert!(!is_excluded(&entry("alice", "User"), &excluded));
    }
}
