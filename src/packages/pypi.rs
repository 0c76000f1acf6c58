use super::totals::{TotalDownloads, TotalDownloadsSource};
use super::{Ecosystem, PackageStats, TotalSource};
use crate::fetch::{FetchError, HttpClient, Request, RequestQueue, RetryPolicy};
use serde::Deserialize;
use url::Url;
use url::form_urlencoded::byte_serialize;

/// Log target for the PyPI provider
const LOG_TARGET: &str = "pypi";

/// Label under which PyPI requests are tracked
const SOURCE: &str = "PyPI";

/// Recent download windows reported by the PyPI stats API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct RecentDownloads {
    #[serde(default)]
    pub last_day: u64,
    #[serde(default)]
    pub last_week: u64,
    #[serde(default)]
    pub last_month: u64,
}

#[derive(Debug, Deserialize)]
struct RecentEnvelope {
    data: RecentDownloads,
}

/// Download counts for PyPI packages, with all-time totals from a pluggable source.
#[derive(Debug, Clone)]
pub struct PypiProvider<S> {
    http: HttpClient,
    api_url: String,
    queue: RequestQueue,
    retry: RetryPolicy,
    totals: S,
}

impl<S: TotalDownloadsSource> PypiProvider<S> {
    #[must_use]
    pub fn new(http: HttpClient, api_url: &Url, queue: RequestQueue, retry: RetryPolicy, totals: S) -> Self {
        Self {
            http,
            api_url: api_url.as_str().trim_end_matches('/').to_string(),
            queue,
            retry,
            totals,
        }
    }

    /// Last day, week and month downloads from the stats API, queued and retried.
    pub async fn recent(&self, package: &str) -> Result<RecentDownloads, FetchError> {
        let encoded: String = byte_serialize(package.as_bytes()).collect();
        let request = Request::get(SOURCE, format!("{}/api/packages/{encoded}/recent", self.api_url)).accept("application/json");

        let response = self
            .queue
            .add(self.retry.run(package, || self.http.fetch(&request)))
            .await?;
        let envelope: RecentEnvelope = response.json()?;
        Ok(envelope.data)
    }

    /// Build the record for `package`, or `None` when it had no recent downloads.
    ///
    /// The yearly figure is approximated as twelve times the last month. The total comes from
    /// the totals source and falls back to the last month when the source has nothing useful.
    pub async fn package_stats(&self, package: &str) -> Result<Option<PackageStats>, FetchError> {
        let recent = self.recent(package).await?;
        let year = recent.last_month.saturating_mul(12);

        if recent.last_day == 0 && recent.last_week == 0 && year == 0 {
            log::info!(target: LOG_TARGET, "Skipping '{package}': no downloads in the last month");
            return Ok(None);
        }

        let (total, total_source) = match self.totals.total_downloads(package).await {
            TotalDownloads::Available(total) if total > 0 => (total, TotalSource::Reported),
            TotalDownloads::Available(_) => {
                log::warn!(target: LOG_TARGET, "The totals source reported zero for '{package}', using the last month instead");
                (recent.last_month, TotalSource::LastMonthFallback)
            }
            TotalDownloads::Unavailable(reason) => {
                log::warn!(target: LOG_TARGET, "No total for '{package}' ({reason}), using the last month instead");
                (recent.last_month, TotalSource::LastMonthFallback)
            }
        };

        Ok(Some(PackageStats {
            name: package.to_string(),
            title: package.to_string(),
            ecosystem: Ecosystem::Pypi,
            day: recent.last_day,
            week: recent.last_week,
            year,
            total,
            last_day: Some(recent.last_day),
            last_week: Some(recent.last_week),
            last_month: Some(recent.last_month),
            total_source: Some(total_source),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::HttpSettings;
    use core::future::Future;
    use core::sync::atomic::{AtomicU32, Ordering};
    use core::time::Duration;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Clone)]
    struct FixedTotal {
        result: TotalDownloads,
        calls: Arc<AtomicU32>,
    }

    impl FixedTotal {
        fn new(result: TotalDownloads) -> Self {
            Self {
                result,
                calls: Arc::new(AtomicU32::new(0)),
            }
        }
    }

    impl TotalDownloadsSource for FixedTotal {
        fn total_downloads(&self, _package: &str) -> impl Future<Output = TotalDownloads> + Send {
            let _ = self.calls.fetch_add(1, Ordering::SeqCst);
            let result = self.result.clone();
            async move { result }
        }
    }

    fn provider(server: &MockServer, totals: FixedTotal) -> PypiProvider<FixedTotal> {
        PypiProvider::new(
            HttpClient::new(HttpSettings::default()).unwrap(),
            &Url::parse(&server.uri()).unwrap(),
            RequestQueue::new("pypi", 1, Duration::ZERO),
            RetryPolicy::rate_limited(3, Duration::from_millis(10), Duration::from_millis(5)),
            totals,
        )
    }

    async fn mount_recent(server: &MockServer, package: &str, day: u64, week: u64, month: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/api/packages/{package}/recent")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "last_day": day, "last_week": week, "last_month": month },
                "package": package,
                "type": "recent_downloads"
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_reported_total() {
        let server = MockServer::start().await;
        mount_recent(&server, "acme-widgets", 10, 70, 300).await;

        let stats = provider(&server, FixedTotal::new(TotalDownloads::Available(12_345)))
            .package_stats("acme-widgets")
            .await
            .unwrap()
            .unwrap();

        assert_eq!((stats.day, stats.week, stats.year, stats.total), (10, 70, 3_600, 12_345));
        assert_eq!(stats.last_month, Some(300));
        assert_eq!(stats.total_source, Some(TotalSource::Reported));
        assert_eq!(stats.ecosystem, Ecosystem::Pypi);
    }

    #[tokio::test]
    async fn test_unavailable_total_falls_back_to_last_month() {
        let server = MockServer::start().await;
        mount_recent(&server, "acme-widgets", 1, 2, 3).await;

        let stats = provider(&server, FixedTotal::new(TotalDownloads::Unavailable("gone".to_string())))
            .package_stats("acme-widgets")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(stats.total, 3);
        assert_eq!(stats.total_source, Some(TotalSource::LastMonthFallback));
    }

    #[tokio::test]
    async fn test_zero_total_falls_back_to_last_month() {
        let server = MockServer::start().await;
        mount_recent(&server, "acme-widgets", 0, 0, 40).await;

        let stats = provider(&server, FixedTotal::new(TotalDownloads::Available(0)))
            .package_stats("acme-widgets")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(stats.total, 40);
        assert_eq!(stats.year, 480);
        assert_eq!(stats.total_source, Some(TotalSource::LastMonthFallback));
    }

    #[tokio::test]
    async fn test_no_recent_downloads_skips_totals() {
        let server = MockServer::start().await;
        mount_recent(&server, "abandoned", 0, 0, 0).await;

        let totals = FixedTotal::new(TotalDownloads::Available(1_000));
        let calls = Arc::clone(&totals.calls);
        let stats = provider(&server, totals).package_stats("abandoned").await.unwrap();

        assert_eq!(stats, None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_package_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let err = provider(&server, FixedTotal::new(TotalDownloads::Available(1)))
            .package_stats("missing")
            .await
            .unwrap_err();
        assert!(err.is_not_found_or_forbidden());
    }
}
