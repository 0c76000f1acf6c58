//! Timeout-bounded HTTP requests with linear-backoff retries.

use super::FetchError;
use crate::progress::RequestTracker;
use core::time::Duration;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

/// Log target for the HTTP layer
const LOG_TARGET: &str = "http";

pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    /// Upper bound for a single attempt, including reading the body.
    pub timeout: Duration,

    /// Total number of attempts for transient failures.
    pub retries: u32,

    /// Attempt `n` waits `backoff_step * n` before attempt `n + 1`.
    pub backoff_step: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retries: 3,
            backoff_step: Duration::from_secs(1),
        }
    }
}

/// A request description that can be replayed on every attempt.
#[derive(Debug, Clone)]
pub struct Request {
    source: &'static str,
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Option<serde_json::Value>,
}

impl Request {
    /// A GET request attributed to `source` for progress reporting.
    #[must_use]
    pub fn get(source: &'static str, url: impl Into<String>) -> Self {
        Self {
            source,
            method: Method::GET,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn post_json(source: &'static str, url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            source,
            method: Method::POST,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Some(body),
        }
    }

    /// Add a header. Values that are not valid header text are dropped with a warning.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                let _ = self.headers.insert(name, value);
            }
            Err(_) => log::warn!(target: LOG_TARGET, "Ignoring invalid value for header '{name}' on '{}'", self.url),
        }
        self
    }

    #[must_use]
    pub fn accept(self, media_type: &str) -> Self {
        self.header(ACCEPT, media_type)
    }

    #[must_use]
    pub fn bearer(self, token: &str) -> Self {
        self.header(AUTHORIZATION, &format!("Bearer {token}"))
    }
}

/// A successful response with its body already read.
#[derive(Debug, Clone)]
pub struct Response {
    url: String,
    status: u16,
    body: String,
}

impl Response {
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.body
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        serde_json::from_str(&self.body).map_err(|reason| FetchError::Decode {
            url: self.url.clone(),
            reason,
        })
    }
}

/// Shared HTTP client used for every upstream.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    settings: HttpSettings,
    tracker: Option<RequestTracker>,
}

impl HttpClient {
    pub fn new(settings: HttpSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            settings,
            tracker: None,
        })
    }

    /// Count every request in the given tracker.
    #[must_use]
    pub fn with_tracker(mut self, tracker: RequestTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Perform a request, retrying transient failures.
    ///
    /// Non-success statuses other than 5xx are returned immediately so callers can apply their own
    /// policy (rate-limit backoff, treating 404 as "absent", ...). Any failure is wrapped in
    /// [`FetchError::Failed`] carrying the URL and the number of attempts made.
    pub async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        if let Some(tracker) = &self.tracker {
            tracker.add_request(request.source);
        }

        let result = self.fetch_with_retries(request).await;

        if let Some(tracker) = &self.tracker {
            tracker.complete_request(request.source);
        }

        result
    }

    async fn fetch_with_retries(&self, request: &Request) -> Result<Response, FetchError> {
        let max_attempts = self.settings.retries.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt(request).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < max_attempts && e.is_transient() => {
                    let delay = self.settings.backoff_step.saturating_mul(attempt);
                    log::warn!(
                        target: LOG_TARGET,
                        "Attempt {attempt}/{max_attempts} for '{}' failed ({e}), retrying in {}ms",
                        request.url,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(FetchError::Failed {
                        url: request.url.clone(),
                        attempts: attempt,
                        last_error: Box::new(e),
                    });
                }
            }
        }
    }

    async fn attempt(&self, request: &Request) -> Result<Response, FetchError> {
        let start_time = std::time::Instant::now();
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .timeout(self.settings.timeout)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| self.classify(&e))?;
        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.map_err(|e| self.classify(&e))?;

        log::debug!(
            target: LOG_TARGET,
            "{} '{}' -> {} in {:.3}s",
            request.method,
            request.url,
            status.as_u16(),
            start_time.elapsed().as_secs_f64()
        );

        if status.is_success() {
            return Ok(Response {
                url: request.url.clone(),
                status: status.as_u16(),
                body,
            });
        }

        if status == StatusCode::TOO_MANY_REQUESTS || (status == StatusCode::FORBIDDEN && mentions_rate_limit(&body)) {
            return Err(FetchError::RateLimited {
                status: status.as_u16(),
                retry_after,
            });
        }

        Err(FetchError::Status {
            status: status.as_u16(),
            body,
        })
    }

    fn classify(&self, error: &reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(self.settings.timeout)
        } else {
            FetchError::Transport(error.to_string())
        }
    }
}

fn mentions_rate_limit(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("rate limit") || lower.contains("abuse detection")
}

/// Only the delay-seconds form of `Retry-After` is honored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
