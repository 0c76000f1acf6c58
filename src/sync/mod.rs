//! Orchestration of a full snapshot refresh.

mod driver;
mod summary;

pub use driver::{Credentials, MAX_TAGS, SyncDriver};
pub use summary::SyncSummary;
