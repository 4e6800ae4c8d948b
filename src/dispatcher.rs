//! Bounded fan-out of array elements to concurrent submissions.
//!
//! The dispatch loop reads one element at a time, waits for a free ticket
//! from a fixed pool of [`MAX_IN_FLIGHT`], and spawns a task that owns both
//! the element and the ticket. A task records its own outcome and drops its
//! ticket last, whatever happened. The loop joins every task before it
//! returns, so the counters it reports are final.

use crate::error::SubmitError;
use crate::reader::ArrayReader;
use crate::report::Reporter;
use crate::request::{Element, SubmitResult};
use crate::tracker::{StatsSnapshot, StatsTracker};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::io::AsyncBufRead;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Maximum number of submissions running at once.
pub const MAX_IN_FLIGHT: usize = 10;

/// Sends one element somewhere and reports how it went.
pub trait Submit: Send + Sync + 'static {
    /// Submit `element`, converting every failure into a [`SubmitError`].
    fn submit(&self, element: Element) -> impl Future<Output = SubmitResult> + Send;
}

/// Fans elements out to a [`Submit`] implementation, at most
/// [`MAX_IN_FLIGHT`] at a time.
pub struct Dispatcher<S> {
    submitter: Arc<S>,
    limiter: Option<DefaultDirectRateLimiter>,
    reporter: Reporter,
    cancel: CancellationToken,
}

impl<S: Submit> Dispatcher<S> {
    /// Create a dispatcher with no rate limit and quiet reporting.
    pub fn new(submitter: Arc<S>) -> Self {
        Self {
            submitter,
            limiter: None,
            reporter: Reporter::quiet(),
            cancel: CancellationToken::new(),
        }
    }

    /// Launch at most `per_second` submissions per second.
    pub fn with_rate_limit(mut self, per_second: Option<NonZeroU32>) -> Self {
        self.limiter = per_second.map(|rate| RateLimiter::direct(Quota::per_second(rate)));
        self
    }

    /// Use `reporter` for response echo and progress.
    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Stop launching, and abandon in-flight submissions, once `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Submit every element of `elements` and wait for all of them to finish.
    pub async fn run<R: AsyncBufRead + Unpin>(&self, mut elements: ArrayReader<R>) -> StatsSnapshot {
        let stats = Arc::new(StatsTracker::new());
        let tickets = Arc::new(Semaphore::new(MAX_IN_FLIGHT));
        let mut tasks = JoinSet::new();
        self.reporter.start();

        while let Some(next) = elements.next_element().await {
            let element = match next {
                Ok(element) => element,
                Err(error) => {
                    if error.is_element_error() {
                        stats.record_skipped();
                    }
                    self.reporter.skipped(&error);
                    continue;
                }
            };

            if let Some(limiter) = &self.limiter {
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => break,
                    () = limiter.until_ready() => {}
                }
            }

            let ticket = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                ticket = Arc::clone(&tickets).acquire_owned() => match ticket {
                    Ok(ticket) => ticket,
                    Err(_) => break,
                },
            };

            stats.record_submitted();
            let index = element.index();
            let submitter = Arc::clone(&self.submitter);
            let task_stats = Arc::clone(&stats);
            let reporter = self.reporter.clone();
            let cancel = self.cancel.clone();

            tasks.spawn(async move {
                let _ticket = ticket;
                let _running = task_stats.begin();

                let outcome = tokio::select! {
                    biased;
                    () = cancel.cancelled() => Err(SubmitError::Cancelled),
                    outcome = submitter.submit(element) => outcome,
                };

                task_stats.record(&outcome);
                reporter.outcome(index, &outcome, &task_stats);
            });
            debug!(index, "Dispatched element");

            while let Some(joined) = tasks.try_join_next() {
                reap(joined, &stats);
            }
        }

        debug!(slots = elements.elements_read(), "Input exhausted");
        if self.cancel.is_cancelled() {
            info!(in_flight = tasks.len(), "Cancelled, draining in-flight requests");
        }

        while let Some(joined) = tasks.join_next().await {
            reap(joined, &stats);
        }

        self.reporter.finish();
        stats.snapshot()
    }
}

/// A task that died before recording its outcome counts as a failure.
fn reap(joined: Result<(), JoinError>, stats: &StatsTracker) {
    if let Err(err) = joined {
        error!(error = %err, "Submission task did not complete");
        stats.record_failure();
    }
}
