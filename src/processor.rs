//! Run orchestration.
//!
//! A run goes credentials → input → dispatch → summary. Any failure before
//! dispatch starts aborts the run with nothing sent.

use crate::auth::BearerToken;
use crate::client::{ApiClient, build_http_client};
use crate::config::RunConfig;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::reader::ArrayReader;
use crate::report::Reporter;
use crate::tracker::StatsSnapshot;
use chrono::{DateTime, Utc};
use console::style;
use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs one bulk submission.
pub struct Processor {
    config: Arc<RunConfig>,
    client: Client,
    cancel: CancellationToken,
}

impl Processor {
    /// Create a new processor.
    pub fn new(config: RunConfig) -> Result<Self> {
        let client = build_http_client(&config.request)?;

        Ok(Self {
            config: Arc::new(config),
            client,
            cancel: CancellationToken::new(),
        })
    }

    /// Cancel the run when `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The run's configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Authenticate, then submit every element of the input file.
    pub async fn process(&self, reporter: Reporter) -> Result<ProcessingResult> {
        let started_at = Utc::now();
        let config = &self.config;

        let (token, elements) = match self.prepare().await {
            Ok(prepared) => prepared,
            Err(e) => {
                reporter.finish();
                return Err(e);
            }
        };

        let api = ApiClient::new(self.client.clone(), Arc::new(config.target.clone()), token);
        let dispatcher = Dispatcher::new(Arc::new(api))
            .with_rate_limit(config.request.rate_limit)
            .with_reporter(reporter)
            .with_cancellation(self.cancel.clone());

        let stats = dispatcher.run(elements).await;
        let result = ProcessingResult::new(started_at, &stats, self.cancel.is_cancelled());

        info!(
            submitted = result.submitted,
            success = result.success_count,
            failed = result.failure_count,
            skipped = result.skipped,
            "Run complete"
        );
        Ok(result)
    }

    /// Acquire the token, then open the input past its opening bracket.
    async fn prepare(&self) -> Result<(BearerToken, ArrayReader<BufReader<File>>)> {
        let config = &self.config;

        info!(
            endpoint = %config.target,
            mode = config.credentials.mode(),
            "Acquiring credentials"
        );
        let token = config
            .credentials
            .acquire(&self.client, &config.target)
            .await?;

        let elements = ArrayReader::open(&config.input).await?;
        info!(input = %config.input.display(), "Streaming input");
        Ok((token, elements))
    }

    /// Read the whole input without authenticating or sending anything.
    pub async fn scan(&self) -> Result<ScanResult> {
        let elements = ArrayReader::open(&self.config.input).await?;

        let scan = elements
            .into_stream()
            .fold(ScanResult::default(), |mut scan, item| async move {
                match item {
                    Ok(_) => scan.elements += 1,
                    Err(e) if e.is_element_error() => {
                        warn!(error = %e, "Malformed element");
                        scan.malformed += 1;
                    }
                    Err(e) => scan.read_error = Some(e.to_string()),
                }
                scan
            })
            .await;

        Ok(scan)
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingResult {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Elements handed to the dispatcher.
    pub submitted: u64,
    /// Successful requests.
    pub success_count: u64,
    /// Failed requests.
    pub failure_count: u64,
    /// Malformed elements that were never sent.
    pub skipped: u64,
    /// Most requests ever in flight at once.
    pub peak_in_flight: usize,
    /// Total elapsed time in seconds.
    pub elapsed_seconds: f64,
    /// Average latency of successful requests in milliseconds.
    pub avg_latency_ms: f64,
    /// Overall requests per second.
    pub throughput_rps: f64,
    /// Whether the run was cut short.
    pub cancelled: bool,
}

impl ProcessingResult {
    /// Build a result from the dispatcher's final counters.
    pub fn new(started_at: DateTime<Utc>, stats: &StatsSnapshot, cancelled: bool) -> Self {
        Self {
            started_at,
            submitted: stats.submitted,
            success_count: stats.success_count,
            failure_count: stats.failure_count,
            skipped: stats.skipped,
            peak_in_flight: stats.peak_in_flight,
            elapsed_seconds: stats.elapsed.as_secs_f64(),
            avg_latency_ms: stats.avg_latency_ms,
            throughput_rps: stats.overall_rps,
            cancelled,
        }
    }

    /// Plain-text summary.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Successful requests: {}", self.success_count);
        let _ = writeln!(out, "Failed requests: {}", self.failure_count);
        if self.skipped > 0 {
            let _ = writeln!(out, "Skipped elements: {}", self.skipped);
        }
        if self.cancelled {
            let _ = writeln!(out, "Cancelled before the whole input was sent");
        }
        let _ = writeln!(
            out,
            "Elapsed: {:.2}s | Throughput: {:.0} req/sec | Avg latency: {:.1}ms",
            self.elapsed_seconds, self.throughput_rps, self.avg_latency_ms
        );
        out
    }

    /// Print the summary to stdout.
    pub fn print_summary(&self) {
        println!("\n{}", style("Execution Summary:").bold());
        print!("{}", self.render());
    }
}

/// Result of a dry run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanResult {
    /// Well-formed elements.
    pub elements: u64,
    /// Malformed elements.
    pub malformed: u64,
    /// Error that ended the scan early, if any.
    pub read_error: Option<String>,
}

impl ScanResult {
    /// Print the scan result to stdout.
    pub fn print_summary(&self) {
        println!("Elements:           {}", self.elements);
        println!("Malformed elements: {}", self.malformed);
        if let Some(error) = &self.read_error {
            println!("Input problem:      {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CredentialSource;
    use crate::config::RequestConfig;
    use crate::endpoint::{Method, Target};
    use crate::error::VolleyError;
    use std::time::Duration;
    use url::Url;

    fn snapshot(success: u64, failure: u64, skipped: u64) -> StatsSnapshot {
        StatsSnapshot {
            elapsed: Duration::from_millis(1500),
            submitted: success + failure,
            success_count: success,
            failure_count: failure,
            skipped,
            avg_latency_ms: 12.0,
            current_rps: 0.0,
            overall_rps: 2.0,
            in_flight: 0,
            peak_in_flight: 2,
        }
    }

    #[test]
    fn test_render_counts() {
        let result = ProcessingResult::new(Utc::now(), &snapshot(2, 0, 0), false);
        let text = result.render();

        assert!(text.starts_with("Successful requests: 2\nFailed requests: 0\n"));
        assert!(!text.contains("Skipped"));
    }

    #[test]
    fn test_render_skipped_and_cancelled() {
        let result = ProcessingResult::new(Utc::now(), &snapshot(1, 1, 3), true);
        let text = result.render();

        assert!(text.contains("Successful requests: 1\nFailed requests: 1\n"));
        assert!(text.contains("Skipped elements: 3"));
        assert!(text.contains("Cancelled"));
    }

    #[test]
    fn test_json_shape() {
        let result = ProcessingResult::new(Utc::now(), &snapshot(4, 1, 0), false);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["success_count"], 4);
        assert_eq!(json["failure_count"], 1);
        assert_eq!(json["cancelled"], false);
        assert!(json["started_at"].is_string());
    }

    #[tokio::test]
    async fn test_failure_before_dispatch_clears_spinner() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = RunConfig {
            target: Target::new(Method::Post, Url::parse("http://127.0.0.1:9/items").unwrap())
                .unwrap(),
            input: dir.path().join("items.json"),
            credentials: CredentialSource::TokenFile {
                path: dir.path().join("token.txt"),
            },
            request: RequestConfig::default(),
        };
        let reporter = Reporter::new(true);

        let err = Processor::new(config)
            .unwrap()
            .process(reporter.clone())
            .await
            .unwrap_err();

        assert!(matches!(err, VolleyError::Auth(_)));
        assert!(reporter.is_finished());
    }

    #[tokio::test]
    async fn test_missing_input_clears_spinner() {
        let dir = tempfile::TempDir::new().unwrap();
        let token = dir.path().join("token.txt");
        std::fs::write(&token, "t").unwrap();
        let config = RunConfig {
            target: Target::new(Method::Put, Url::parse("http://127.0.0.1:9/items").unwrap())
                .unwrap(),
            input: dir.path().join("items.json"),
            credentials: CredentialSource::TokenFile { path: token },
            request: RequestConfig::default(),
        };
        let reporter = Reporter::new(true);

        let err = Processor::new(config)
            .unwrap()
            .process(reporter.clone())
            .await
            .unwrap_err();

        assert!(matches!(err, VolleyError::InputFileRead { .. }));
        assert!(reporter.is_finished());
    }
}
