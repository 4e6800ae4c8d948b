//! Custom error types for Volley.
//!
//! Run-level failures are [`VolleyError`]. Everything that stops a run
//! before the first request is sent lives here, along with the per-element
//! read errors the dispatcher skips over. Failures of a single submission
//! are [`SubmitError`] and never abort a run.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while setting up or feeding a run.
#[derive(Error, Debug)]
pub enum VolleyError {
    /// Failed to open or read the input file.
    #[error("failed to read input file '{path}': {source}")]
    InputFileRead {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The input document is not a JSON array.
    #[error("input is not a JSON array: {message}")]
    DocumentParse {
        /// What was found instead of the opening bracket.
        message: String,
    },

    /// A single array element is not valid JSON.
    #[error("malformed element at index {index}: {source}")]
    ElementParse {
        /// Zero-based position of the element in the array.
        index: usize,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The input ended before the closing bracket.
    #[error("input ended before the closing ']' after {elements} element(s)")]
    TruncatedInput {
        /// Number of element slots seen before the end of input.
        elements: usize,
    },

    /// Credentials could not be acquired.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Failed to build the HTTP client.
    #[error("HTTP client setup failed: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl VolleyError {
    /// Whether the dispatcher can keep reading after this error.
    pub fn is_element_error(&self) -> bool {
        matches!(self, Self::ElementParse { .. })
    }
}

/// Errors from either credential strategy.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The login request could not be sent.
    #[error("login request to {url} failed: {source}")]
    Request {
        /// Login URL.
        url: String,
        /// The underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },

    /// The login endpoint answered with something other than 200.
    #[error("login failed with status code: {status}")]
    Status {
        /// HTTP status code returned.
        status: u16,
    },

    /// The login response body was not `{"token": "..."}`.
    #[error("error decoding login response: {0}")]
    Decode(#[source] reqwest::Error),

    /// The token file could not be read.
    #[error("failed to read token file '{path}': {source}")]
    TokenFile {
        /// Path to the token file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Failure of a single submission.
#[derive(Error, Debug)]
pub enum SubmitError {
    /// The request could not be built or sent.
    #[error("error sending request: {0}")]
    Request(#[source] reqwest::Error),

    /// The response body could not be read.
    #[error("error reading response: {0}")]
    ResponseBody(#[source] reqwest::Error),

    /// The endpoint answered with a non-2xx status.
    #[error("endpoint returned error status {status}")]
    Status {
        /// HTTP status code returned.
        status: u16,
        /// Response body content.
        body: String,
    },

    /// The run was cancelled while the request was in flight.
    #[error("request cancelled")]
    Cancelled,
}

impl SubmitError {
    /// HTTP status code, if the endpoint answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Request(e) | Self::ResponseBody(e) => e.status().map(|s| s.as_u16()),
            Self::Cancelled => None,
        }
    }

    /// Response body, if one was received.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Result type alias for Volley operations.
pub type Result<T> = std::result::Result<T, VolleyError>;
