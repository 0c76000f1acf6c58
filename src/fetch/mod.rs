//! Network plumbing shared by every upstream source.

mod error;
mod http;
mod queue;
mod retry;

pub use error::FetchError;
pub use http::{HttpClient, HttpSettings, Request, Response, USER_AGENT};
pub use queue::RequestQueue;
pub use retry::{RetryClassifier, RetryPolicy};
