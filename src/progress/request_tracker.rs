//! Request tracking for monitoring outstanding HTTP requests.

use super::ProgressReporter;
use core::sync::atomic::{AtomicU64, Ordering};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct RequestCounter {
    issued: AtomicU64,
    completed: AtomicU64,
}

/// Issued/completed totals for one upstream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestCounts {
    pub issued: u64,
    pub completed: u64,
}

/// Tracks requests per upstream source ("CMS", "GitHub", "npm", "PyPI", ...) and mirrors the
/// totals into a [`ProgressReporter`].
#[derive(Debug, Clone)]
pub struct RequestTracker {
    counters: Arc<Mutex<BTreeMap<&'static str, Arc<RequestCounter>>>>,
    progress: ProgressReporter,
}

impl RequestTracker {
    #[must_use]
    pub fn new(progress: ProgressReporter) -> Self {
        Self {
            counters: Arc::new(Mutex::new(BTreeMap::new())),
            progress,
        }
    }

    fn counter(&self, source: &'static str) -> Arc<RequestCounter> {
        let mut counters = self.counters.lock().expect("lock poisoned");
        Arc::clone(counters.entry(source).or_default())
    }

    /// Record a request to `source` as issued.
    pub fn add_request(&self, source: &'static str) {
        let _ = self.counter(source).issued.fetch_add(1, Ordering::Relaxed);
        self.update_progress();
    }

    /// Record a request to `source` as finished, successful or not.
    pub fn complete_request(&self, source: &'static str) {
        let _ = self.counter(source).completed.fetch_add(1, Ordering::Relaxed);
        self.update_progress();
    }

    /// Current counts, keyed by source.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<&'static str, RequestCounts> {
        let counters = self.counters.lock().expect("lock poisoned");
        counters
            .iter()
            .map(|(source, counter)| {
                (
                    *source,
                    RequestCounts {
                        issued: counter.issued.load(Ordering::Relaxed),
                        completed: counter.completed.load(Ordering::Relaxed),
                    },
                )
            })
            .collect()
    }

    #[must_use]
    pub const fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    fn update_progress(&self) {
        let counts = self.counts();

        let total_issued: u64 = counts.values().map(|c| c.issued).sum();
        let total_completed: u64 = counts.values().map(|c| c.completed).sum();
        if total_issued == 0 {
            return;
        }

        // "X/Y name1, X/Y name2, ..."
        let message = counts
            .iter()
            .filter(|(_, c)| c.issued > 0)
            .map(|(source, c)| format!("{}/{} {source}", c.completed, c.issued))
            .collect::<Vec<_>>()
            .join(", ");

        self.progress.set_length(total_issued);
        self.progress.set_position(total_completed);
        self.progress.set_message(message);
    }
}
