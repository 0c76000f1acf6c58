use super::PackageStats;
use crate::fetch::{FetchError, HttpClient, Request, RequestQueue, RetryPolicy};
use serde::Deserialize;
use url::Url;

/// Log target for the npm provider
const LOG_TARGET: &str = "npm";

/// Label under which npm requests are tracked
const SOURCE: &str = "npm";

/// A download-count window understood by the npm downloads API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadWindow {
    LastDay,
    LastWeek,
    LastYear,
    AllTime,
}

impl DownloadWindow {
    #[must_use]
    pub const fn period(self) -> &'static str {
        match self {
            Self::LastDay => "last-day",
            Self::LastWeek => "last-week",
            Self::LastYear => "last-year",
            Self::AllTime => "1000-01-01:3000-01-01",
        }
    }
}

#[derive(Debug, Deserialize)]
struct DownloadRange {
    #[serde(default)]
    downloads: Vec<DailyDownloads>,
}

#[derive(Debug, Deserialize)]
struct DailyDownloads {
    downloads: u64,
}

/// Download counts from the npm registry.
#[derive(Debug, Clone)]
pub struct NpmProvider {
    http: HttpClient,
    api_url: String,
    queue: RequestQueue,
    retry: RetryPolicy,
}

impl NpmProvider {
    #[must_use]
    pub fn new(http: HttpClient, api_url: &Url, queue: RequestQueue, retry: RetryPolicy) -> Self {
        Self {
            http,
            api_url: api_url.as_str().trim_end_matches('/').to_string(),
            queue,
            retry,
        }
    }

    /// Collect the four windows for `package`, one after the other.
    ///
    /// Returns `None` when the package has no downloads in the last day, week or year.
    pub async fn package_stats(&self, package: &str) -> Result<Option<PackageStats>, FetchError> {
        let day = self.window(package, DownloadWindow::LastDay).await?;
        let week = self.window(package, DownloadWindow::LastWeek).await?;
        let year = self.window(package, DownloadWindow::LastYear).await?;
        let total = self.window(package, DownloadWindow::AllTime).await?;

        let stats = PackageStats::npm(package, day, week, year, total);
        if !stats.has_downloads() {
            log::info!(target: LOG_TARGET, "Skipping '{package}': no downloads in the last year");
            return Ok(None);
        }

        log::debug!(target: LOG_TARGET, "'{package}': day={day} week={week} year={year} total={total}");
        Ok(Some(stats))
    }

    /// Total downloads of `package` in `window`.
    pub async fn window(&self, package: &str, window: DownloadWindow) -> Result<u64, FetchError> {
        let request = Request::get(
            SOURCE,
            format!("{}/downloads/range/{}/{package}", self.api_url, window.period()),
        )
        .accept("application/json");

        let label = format!("{package} ({})", window.period());
        let response = self
            .queue
            .add(self.retry.run(&label, || self.http.fetch(&request)))
            .await?;

        let range: DownloadRange = response.json()?;
        Ok(range.downloads.iter().map(|d| d.downloads).sum())
    }
}
