//! Operator-facing output while a run is in progress.
//!
//! Response bodies are echoed to stdout as they arrive. Everything else
//! (failures, skipped elements) goes through `tracing`. When a spinner is
//! shown, stdout writes are interleaved with it via `suspend`.

use crate::error::{SubmitError, VolleyError};
use crate::request::SubmitResult;
use crate::tracker::StatsTracker;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{debug, warn};

/// Progress spinner plus response echo.
#[derive(Clone)]
pub struct Reporter {
    progress: Option<ProgressBar>,
    echo: bool,
}

impl Reporter {
    /// Reporter that echoes responses and optionally shows a spinner.
    ///
    /// The spinner stays idle until [`Reporter::start`].
    pub fn new(show_progress: bool) -> Self {
        let progress = show_progress.then(|| {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) =
                ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            {
                pb.set_style(style);
            }
            pb
        });

        Self {
            progress,
            echo: true,
        }
    }

    /// Reporter that only logs.
    pub fn quiet() -> Self {
        Self {
            progress: None,
            echo: false,
        }
    }

    /// Start animating the spinner, if any.
    pub fn start(&self) {
        if let Some(pb) = &self.progress {
            pb.enable_steady_tick(Duration::from_millis(100));
        }
    }

    /// Report the outcome of the element at `index`.
    pub fn outcome(&self, index: usize, outcome: &SubmitResult, stats: &StatsTracker) {
        match outcome {
            Ok(response) => {
                debug!(
                    index,
                    status = response.status,
                    latency_ms = response.latency.as_millis() as u64,
                    "Request succeeded"
                );
                self.echo_body(&response.body);
            }
            Err(SubmitError::Cancelled) => {
                debug!(index, "Request cancelled");
            }
            Err(error) => {
                warn!(index, status = ?error.status(), error = %error, "Request failed");
                if let Some(body) = error.body() {
                    self.echo_body(body);
                }
            }
        }

        if let Some(pb) = &self.progress {
            pb.set_message(stats.snapshot().summary());
            pb.tick();
        }
    }

    /// Report an input element or read error that was not sent.
    pub fn skipped(&self, error: &VolleyError) {
        if error.is_element_error() {
            warn!(error = %error, "Skipping element");
        } else {
            warn!(error = %error, "Stopped reading input");
        }
    }

    /// Clear the spinner.
    pub fn finish(&self) {
        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }
    }

    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.progress.as_ref().is_none_or(ProgressBar::is_finished)
    }

    fn echo_body(&self, body: &str) {
        if !self.echo {
            return;
        }
        match &self.progress {
            Some(pb) => pb.suspend(|| println!("Response: {body}")),
            None => println!("Response: {body}"),
        }
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(false)
    }
}
