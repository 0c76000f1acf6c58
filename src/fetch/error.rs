use core::time::Duration;
use thiserror::Error;

/// Everything that can go wrong while talking to an upstream API.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Terminal failure after the HTTP layer gave up on a request.
    #[error("request to '{url}' failed after {attempts} attempt(s): {last_error}")]
    Failed {
        url: String,
        attempts: u32,
        last_error: Box<Self>,
    },

    /// The connection could not be established or was interrupted.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request did not complete within the configured timeout.
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The server signaled throttling.
    #[error("rate limited (HTTP {status})")]
    RateLimited { status: u16, retry_after: Option<Duration> },

    /// The body did not have the expected shape.
    #[error("unexpected response from '{url}': {reason}")]
    Decode { url: String, reason: serde_json::Error },

    /// GitHub requests need a token.
    #[error("no GitHub token available, set GITHUB_TOKEN or pass --github-token")]
    MissingToken,
}

impl FetchError {
    /// The HTTP status behind this error, if the server answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Failed { last_error, .. } => last_error.status(),
            Self::Status { status, .. } | Self::RateLimited { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::Failed { last_error, .. } => last_error.is_rate_limited(),
            Self::RateLimited { .. } => true,
            _ => false,
        }
    }

    /// How long the server asked us to wait, when it said so.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Failed { last_error, .. } => last_error.retry_after(),
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// A private or missing resource. Rate limiting via 403 does not count.
    #[must_use]
    pub fn is_not_found_or_forbidden(&self) -> bool {
        !self.is_rate_limited() && matches!(self.status(), Some(403 | 404))
    }

    /// Requests sent before this error surfaced. Errors raised without the HTTP layer count as one.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Failed { attempts, .. } => *attempts,
            _ => 1,
        }
    }

    /// Restate a terminal failure with the number of requests sent across outer retries.
    #[must_use]
    pub fn with_attempts(self, total: u32) -> Self {
        match self {
            Self::Failed { url, last_error, .. } => Self::Failed {
                url,
                attempts: total,
                last_error,
            },
            other => other,
        }
    }

    /// Errors the HTTP layer retries on its own with linear backoff.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
