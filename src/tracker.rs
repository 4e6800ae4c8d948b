//! Statistics tracking for a run.
//!
//! One [`StatsTracker`] is shared by every submission task of a run. All
//! counters only ever grow, except the in-flight gauge, which is managed by
//! [`InFlightGuard`].

use crate::request::SubmitResult;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Statistics tracker for submissions.
#[derive(Debug)]
pub struct StatsTracker {
    /// Start time of the run.
    start_time: Instant,
    /// Elements handed to the dispatcher.
    submitted: AtomicU64,
    /// Requests answered with a 2xx status.
    success_count: AtomicU64,
    /// Requests that failed for any reason.
    failure_count: AtomicU64,
    /// Malformed elements that were never sent.
    skipped: AtomicU64,
    /// Total latency of successful requests in microseconds.
    total_latency_us: AtomicU64,
    /// Tasks currently running.
    in_flight: AtomicUsize,
    /// Highest value `in_flight` has reached.
    peak_in_flight: AtomicUsize,
    /// Completions in the last second (for RPS calculation).
    recent_requests: Mutex<VecDeque<Instant>>,
}

impl StatsTracker {
    /// Create a new statistics tracker.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            submitted: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            recent_requests: Mutex::new(VecDeque::new()),
        }
    }

    /// Record an element handed to the dispatcher.
    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a malformed element that was skipped.
    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of one submission.
    pub fn record(&self, outcome: &SubmitResult) {
        match outcome {
            Ok(response) => self.record_success(response.latency),
            Err(_) => self.record_failure(),
        }
    }

    /// Record a successful request.
    pub fn record_success(&self, latency: Duration) {
        self.success_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        self.record_recent();
    }

    /// Record a failed request.
    pub fn record_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        self.record_recent();
    }

    /// Mark a task as running until the guard is dropped.
    pub fn begin(&self) -> InFlightGuard<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::AcqRel);
        InFlightGuard { tracker: self }
    }

    /// Tasks currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Record a completion for RPS calculation.
    fn record_recent(&self) {
        let now = Instant::now();
        let mut recent = self.recent_requests.lock();
        recent.push_back(now);
        Self::evict(&mut recent, now);
    }

    fn evict(recent: &mut VecDeque<Instant>, now: Instant) {
        let Some(cutoff) = now.checked_sub(Duration::from_secs(1)) else {
            return;
        };
        while recent.front().is_some_and(|front| *front < cutoff) {
            recent.pop_front();
        }
    }

    /// Get the current requests per second.
    pub fn requests_per_second(&self) -> f64 {
        let mut recent = self.recent_requests.lock();
        Self::evict(&mut recent, Instant::now());
        recent.len() as f64
    }

    /// Get the current statistics snapshot.
    pub fn snapshot(&self) -> StatsSnapshot {
        let elapsed = self.start_time.elapsed();
        let success = self.success_count.load(Ordering::Acquire);
        let failure = self.failure_count.load(Ordering::Acquire);
        let total_latency = self.total_latency_us.load(Ordering::Relaxed);
        let completed = success + failure;

        let avg_latency_ms = if success > 0 {
            (total_latency as f64 / success as f64) / 1000.0
        } else {
            0.0
        };

        let overall_rps = if elapsed.as_secs_f64() > 0.0 {
            completed as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        StatsSnapshot {
            elapsed,
            submitted: self.submitted.load(Ordering::Acquire),
            success_count: success,
            failure_count: failure,
            skipped: self.skipped.load(Ordering::Relaxed),
            avg_latency_ms,
            current_rps: self.requests_per_second(),
            overall_rps,
            in_flight: self.in_flight(),
            peak_in_flight: self.peak_in_flight.load(Ordering::Acquire),
        }
    }
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight gauge on drop.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    tracker: &'a StatsTracker,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.tracker.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A snapshot of current statistics.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    /// Elapsed time since start.
    pub elapsed: Duration,
    /// Elements handed to the dispatcher.
    pub submitted: u64,
    /// Successful requests.
    pub success_count: u64,
    /// Failed requests.
    pub failure_count: u64,
    /// Malformed elements skipped.
    pub skipped: u64,
    /// Average latency of successful requests in milliseconds.
    pub avg_latency_ms: f64,
    /// Current requests per second.
    pub current_rps: f64,
    /// Overall requests per second.
    pub overall_rps: f64,
    /// Tasks running when the snapshot was taken.
    pub in_flight: usize,
    /// Most tasks ever running at once.
    pub peak_in_flight: usize,
}

impl StatsSnapshot {
    /// Requests that have finished, successfully or not.
    pub fn completed(&self) -> u64 {
        self.success_count + self.failure_count
    }

    /// Format as a one-line progress message.
    pub fn summary(&self) -> String {
        format!(
            "Sent: {} | Success: {} | Failed: {} | Skipped: {} | In flight: {} | RPS: {:.0}",
            self.submitted,
            self.success_count,
            self.failure_count,
            self.skipped,
            self.in_flight,
            self.current_rps
        )
    }
}
