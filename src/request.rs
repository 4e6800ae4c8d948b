//! Element and outcome types for submissions.
//!
//! An [`Element`] is one raw value cut out of the input array. It is sent
//! as-is, so it is kept as bytes rather than parsed into a `Value`.

use crate::error::SubmitError;
use std::fmt;
use std::time::Duration;

/// One raw JSON value taken from the input array.
#[derive(Clone, PartialEq, Eq)]
pub struct Element {
    index: usize,
    raw: Vec<u8>,
}

impl Element {
    /// Create an element from its position and already-validated JSON text.
    pub fn new(index: usize, raw: impl Into<Vec<u8>>) -> Self {
        Self {
            index,
            raw: raw.into(),
        }
    }

    /// Zero-based position in the input array.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The element's JSON text.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Consume the element, yielding the request body.
    pub fn into_body(self) -> Vec<u8> {
        self.raw
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("index", &self.index)
            .field("raw", &String::from_utf8_lossy(&self.raw))
            .finish()
    }
}

/// A 2xx answer to one submission.
#[derive(Debug, Clone)]
pub struct SubmitResponse {
    /// Index of the element that was sent.
    pub index: usize,
    /// HTTP status code.
    pub status: u16,
    /// Full response body.
    pub body: String,
    /// Time from send to fully read body.
    pub latency: Duration,
}

/// Outcome of one submission.
pub type SubmitResult = std::result::Result<SubmitResponse, SubmitError>;
