//! All-time download totals for PyPI packages.
//!
//! PyPI's own stats API only reports recent windows, so totals come from a third-party
//! aggregation page whose markup changes without notice. Failures here are soft: a source
//! reports [`TotalDownloads::Unavailable`] instead of an error.

use crate::fetch::{HttpClient, Request};
use core::fmt::Debug;
use core::future::Future;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;
use url::form_urlencoded::byte_serialize;

/// Log target for totals scraping
const LOG_TARGET: &str = "totals";

/// Label under which totals requests are tracked
const SOURCE: &str = "pepy";

static TOTAL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)total\s+downloads.{0,200}?>\s*([0-9][0-9,.]*\s*[kmb]?)\s*<").expect("valid total downloads pattern")
});

/// The outcome of asking a source for a package's all-time total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TotalDownloads {
    Available(u64),
    Unavailable(String),
}

/// Something that knows the all-time download count of a PyPI package.
pub trait TotalDownloadsSource: Send + Sync + Debug {
    fn total_downloads(&self, package: &str) -> impl Future<Output = TotalDownloads> + Send;
}

/// Reads the rendered "total downloads" figure from a pepy-style project page.
#[derive(Debug, Clone)]
pub struct PepyScraper {
    http: HttpClient,
    base_url: String,
}

impl PepyScraper {
    #[must_use]
    pub fn new(http: HttpClient, base_url: &Url) -> Self {
        Self {
            http,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
        }
    }
}

impl TotalDownloadsSource for PepyScraper {
    async fn total_downloads(&self, package: &str) -> TotalDownloads {
        let url = format!("{}/{}", self.base_url, byte_serialize(package.as_bytes()).collect::<String>());
        let response = match self.http.fetch(&Request::get(SOURCE, url).accept("text/html")).await {
            Ok(response) => response,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not load the totals page for '{package}': {e}");
                return TotalDownloads::Unavailable(e.to_string());
            }
        };

        match scrape_total(response.text()) {
            Some(total) => {
                log::debug!(target: LOG_TARGET, "Scraped a total of {total} download(s) for '{package}'");
                TotalDownloads::Available(total)
            }
            None => {
                log::warn!(target: LOG_TARGET, "The totals page for '{package}' has no recognizable total");
                TotalDownloads::Unavailable("total downloads figure not found on the page".to_string())
            }
        }
    }
}

/// Find the first "total downloads" figure in a rendered page.
#[must_use]
pub fn scrape_total(html: &str) -> Option<u64> {
    TOTAL_PATTERN
        .captures(html)
        .and_then(|captures| captures.get(1))
        .and_then(|figure| parse_compact_number(figure.as_str()))
}

/// Parse figures such as `1234`, `1,234,567`, `12.5k`, `3M` or `1.2 B`.
///
/// Without a suffix, `,` and `.` are both read as digit group separators.
#[must_use]
pub fn parse_compact_number(text: &str) -> Option<u64> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace() && *c != ',').collect();
    let suffix = compact.chars().last()?;
    let multiplier: u64 = match suffix.to_ascii_lowercase() {
        'k' => 1_000,
        'm' => 1_000_000,
        'b' => 1_000_000_000,
        _ => return compact.replace('.', "").parse().ok(),
    };

    let digits = compact.strip_suffix(suffix)?;
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    let whole: u64 = whole.parse().ok()?;
    let mut value = whole.checked_mul(multiplier)?;

    let mut scale = multiplier;
    for digit in fraction.chars() {
        scale /= 10;
        value = value.checked_add(u64::from(digit.to_digit(10)?) * scale)?;
    }

    Some(value)
}
