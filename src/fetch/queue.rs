//! A FIFO request queue bounding concurrency against a single upstream.

use core::future::Future;
use core::time::Duration;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Log target for the request queue
const LOG_TARGET: &str = "queue";

/// Dispatches tasks in FIFO order with at most `concurrency` in flight.
///
/// Once a task completes, its slot stays occupied for `delay` before the next waiting task is
/// dispatched. The caller gets the task's outcome as soon as the task itself completes.
#[derive(Debug, Clone)]
pub struct RequestQueue {
    name: Arc<str>,
    slots: Arc<Semaphore>,
    delay: Duration,
}

impl RequestQueue {
    /// A queue named `name` for logs. A `concurrency` of zero is treated as one.
    #[must_use]
    pub fn new(name: &str, concurrency: usize, delay: Duration) -> Self {
        Self {
            name: Arc::from(name),
            slots: Arc::new(Semaphore::new(concurrency.max(1))),
            delay,
        }
    }

    /// Enqueue `task` and wait for its outcome.
    pub async fn add<F>(&self, task: F) -> F::Output
    where
        F: Future,
    {
        // tokio's semaphore hands out permits in request order, which gives us FIFO dispatch
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .expect("request queue semaphore is never closed");

        log::trace!(target: LOG_TARGET, "Dispatching task on the '{}' queue", self.name);
        let output = task.await;
        self.release_after_delay(permit);
        output
    }

    fn release_after_delay(&self, permit: OwnedSemaphorePermit) {
        if self.delay.is_zero() {
            drop(permit);
            return;
        }

        let delay = self.delay;
        _ = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            drop(permit);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use futures::future::join_all;
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[derive(Default)]
    struct Recorder {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        starts: Mutex<Vec<(usize, Instant)>>,
    }

    impl Recorder {
        async fn task(&self, id: usize, work: Duration) -> usize {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            let _ = self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.starts.lock().unwrap().push((id, Instant::now()));
            tokio::time::sleep(work).await;
            let _ = self.in_flight.fetch_sub(1, Ordering::SeqCst);
            id
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_slot_is_fifo_and_spaced() {
        let queue = RequestQueue::new("test", 1, Duration::from_millis(100));
        let recorder = Recorder::default();

        let results = join_all((0..4).map(|id| queue.add(recorder.task(id, Duration::from_millis(10))))).await;
        assert_eq!(results, vec![0, 1, 2, 3]);
        assert_eq!(recorder.max_in_flight.load(Ordering::SeqCst), 1);

        let starts = recorder.starts.lock().unwrap().clone();
        let order: Vec<_> = starts.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);

        for pair in starts.windows(2) {
            let gap = pair[1].1 - pair[0].1;
            assert!(gap >= Duration::from_millis(110), "dispatches only {gap:?} apart");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_bound_is_respected() {
        let queue = RequestQueue::new("test", 2, Duration::from_millis(50));
        let recorder = Recorder::default();

        let results = join_all((0..6).map(|id| queue.add(recorder.task(id, Duration::from_millis(20))))).await;
        assert_eq!(results.len(), 6);
        assert_eq!(recorder.max_in_flight.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_is_not_held_back_by_delay() {
        let queue = RequestQueue::new("test", 1, Duration::from_secs(60));
        let started = Instant::now();
        let value = queue.add(async { 5 }).await;
        assert_eq!(value, 5);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_errors_propagate_to_caller() {
        let queue = RequestQueue::new("test", 1, Duration::ZERO);
        let result: Result<(), &str> = queue.add(async { Err("boom") }).await;
        assert_eq!(result, Err("boom"));
    }
}
