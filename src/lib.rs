//! # Volley
//!
//! Bulk JSON submitter: authenticate once, then replay every element of a
//! (possibly huge) JSON array as its own HTTP request.
//!
//! ## Features
//!
//! - **Streaming input**: the array is scanned incrementally, so only the
//!   element being dispatched is held in memory
//! - **Bounded concurrency**: at most [`MAX_IN_FLIGHT`] requests at once,
//!   with the reader held back while the pool is full
//! - **Two credential modes**: email/password login or a pre-issued token file
//! - **Per-element isolation**: malformed elements are skipped and failed
//!   requests are counted; neither stops the run
//! - **Graceful cancellation**: Ctrl-C stops new launches and drains the rest
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use volley::{CredentialSource, Method, Processor, Reporter, RequestConfig, RunConfig, Target};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = RunConfig {
//!         target: Target::new(Method::Post, "https://api.example.com/items".parse()?)?,
//!         input: "items.json".into(),
//!         credentials: CredentialSource::TokenFile { path: "token.txt".into() },
//!         request: RequestConfig::default(),
//!     };
//!
//!     let result = Processor::new(config)?.process(Reporter::new(false)).await?;
//!     result.print_summary();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod processor;
pub mod reader;
pub mod report;
pub mod request;
pub mod tracker;

// Re-exports for convenience
pub use auth::{BearerToken, CredentialSource};
pub use client::ApiClient;
pub use config::{Args, RequestConfig, RunConfig};
pub use dispatcher::{Dispatcher, MAX_IN_FLIGHT, Submit};
pub use endpoint::{Method, Target};
pub use error::{AuthError, Result, SubmitError, VolleyError};
pub use processor::{ProcessingResult, Processor, ScanResult};
pub use reader::ArrayReader;
pub use report::Reporter;
pub use request::{Element, SubmitResponse, SubmitResult};
pub use tracker::{StatsSnapshot, StatsTracker};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
