//! Background worker for asynchronous rating recomputation.
//!
//! Rating writes enqueue their property id and return. The worker pops ids,
//! coalescing duplicates that are still waiting, and recomputes each summary
//! with a bounded number of attempts. Failures are logged; the rating write
//! that triggered them is never rolled back.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::aggregator::RatingAggregator;
use crate::config::AggregationConfig;
use crate::error::Error;
use crate::metrics::EngineMetrics;

/// How long `flush` waits between checks.
const FLUSH_WAIT: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
struct Pending {
    queue: VecDeque<String>,
    queued: HashSet<String>,
    in_flight: usize,
}

impl Pending {
    fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.in_flight == 0
    }
}

#[derive(Debug, Default)]
struct WorkQueue {
    state: Mutex<Pending>,
    ready: Condvar,
    idle: Condvar,
}

/// Background worker that recomputes rating summaries.
pub struct AggregationWorker {
    queue: Arc<WorkQueue>,
    /// Shutdown signal.
    shutdown: Arc<AtomicBool>,
    /// Cleared by the worker thread on exit.
    running: Arc<AtomicBool>,
    /// Worker thread handle.
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AggregationWorker {
    /// Start the worker thread.
    pub fn start(
        aggregator: Arc<RatingAggregator>,
        metrics: Arc<EngineMetrics>,
        config: &AggregationConfig,
    ) -> Result<Self, Error> {
        let queue = Arc::new(WorkQueue::default());
        let shutdown = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));

        let queue_clone = queue.clone();
        let shutdown_clone = shutdown.clone();
        let running_clone = running.clone();
        let poll_interval = config.poll_interval;
        let max_attempts = config.max_worker_attempts.max(1);

        let handle = thread::Builder::new()
            .name("stayhub-ratings".to_string())
            .spawn(move || {
                Self::worker_loop(
                    &aggregator,
                    &metrics,
                    &queue_clone,
                    &shutdown_clone,
                    poll_interval,
                    max_attempts,
                );
                running_clone.store(false, Ordering::SeqCst);
                queue_clone.idle.notify_all();
            })
            .map_err(|e| Error::Unavailable(format!("failed to spawn rating worker: {}", e)))?;

        Ok(Self {
            queue,
            shutdown,
            running,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Schedule a recomputation. Ids already waiting are coalesced.
    pub fn enqueue(&self, prop_id: &str) {
        let mut state = self.queue.state.lock();
        if state.queued.insert(prop_id.to_string()) {
            state.queue.push_back(prop_id.to_string());
            self.queue.ready.notify_one();
        }
    }

    /// Number of property ids waiting.
    pub fn pending(&self) -> usize {
        self.queue.state.lock().queue.len()
    }

    /// Block until every queued recomputation has finished.
    pub fn flush(&self) {
        let mut state = self.queue.state.lock();
        while !state.is_idle() {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            self.queue.idle.wait_for(&mut state, FLUSH_WAIT);
        }
    }

    /// Stop the worker after draining the queue.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.queue.ready.notify_all();
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }

    /// Check if the worker is still running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn worker_loop(
        aggregator: &RatingAggregator,
        metrics: &EngineMetrics,
        queue: &WorkQueue,
        shutdown: &AtomicBool,
        poll_interval: Duration,
        max_attempts: usize,
    ) {
        loop {
            let prop_id = {
                let mut state = queue.state.lock();
                match state.queue.pop_front() {
                    Some(id) => {
                        state.queued.remove(&id);
                        state.in_flight += 1;
                        id
                    }
                    None => {
                        if shutdown.load(Ordering::SeqCst) {
                            break;
                        }
                        queue.ready.wait_for(&mut state, poll_interval);
                        continue;
                    }
                }
            };

            Self::process(aggregator, metrics, &prop_id, poll_interval, max_attempts);

            let mut state = queue.state.lock();
            state.in_flight -= 1;
            if state.is_idle() {
                queue.idle.notify_all();
            }
        }

        tracing::debug!("rating worker stopped");
    }

    fn process(
        aggregator: &RatingAggregator,
        metrics: &EngineMetrics,
        prop_id: &str,
        backoff: Duration,
        max_attempts: usize,
    ) {
        for attempt in 1..=max_attempts {
            match aggregator.recompute(prop_id) {
                Ok(_) => return,
                Err(Error::NotFound { .. }) => {
                    tracing::debug!(prop_id, "property gone, skipping recompute");
                    return;
                }
                Err(e) if attempt == max_attempts => {
                    metrics.record_recompute_failure();
                    tracing::error!(
                        prop_id,
                        attempts = attempt,
                        error = ?e,
                        "failed to recompute rating summary"
                    );
                }
                Err(_) => thread::sleep(backoff),
            }
        }
    }
}

impl Drop for AggregationWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
