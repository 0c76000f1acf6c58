//! Request counting and progress display.

mod progress_reporter;
mod request_tracker;

pub use progress_reporter::ProgressReporter;
pub use request_tracker::{RequestCounts, RequestTracker};
