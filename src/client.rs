//! HTTP client that submits one element per request.
//!
//! Every element gets exactly one attempt; its outcome comes back as a
//! typed [`SubmitResult`].

use crate::auth::BearerToken;
use crate::config::RequestConfig;
use crate::dispatcher::{MAX_IN_FLIGHT, Submit};
use crate::endpoint::Target;
use crate::error::{Result, SubmitError, VolleyError};
use crate::request::{Element, SubmitResponse, SubmitResult};
use reqwest::{Client, header};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// Build the HTTP client shared by the login call and every submission.
pub fn build_http_client(request: &RequestConfig) -> Result<Client> {
    let mut builder = Client::builder()
        .user_agent(concat!("volley/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(MAX_IN_FLIGHT)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .gzip(true)
        .brotli(true);

    if let Some(timeout) = request.timeout {
        builder = builder.timeout(timeout);
    }

    builder.build().map_err(VolleyError::HttpClient)
}

/// Sends elements to the target with the run's bearer token.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    target: Arc<Target>,
    token: BearerToken,
}

impl ApiClient {
    /// Create a new API client.
    pub fn new(client: Client, target: Arc<Target>, token: BearerToken) -> Self {
        Self {
            client,
            target,
            token,
        }
    }

    /// Send one element and read the whole response.
    pub async fn send(&self, element: Element) -> SubmitResult {
        let index = element.index();
        let mut request = self
            .client
            .request(self.target.method().into(), self.target.url().clone())
            .header(header::CONTENT_TYPE, "application/json")
            .body(element.into_body());

        if !self.token.is_empty() {
            request = request.bearer_auth(self.token.as_str());
        }

        trace!(index, endpoint = %self.target, "Sending request");
        let start = Instant::now();

        let response = request.send().await.map_err(SubmitError::Request)?;
        let status = response.status();
        let body = response.text().await.map_err(SubmitError::ResponseBody)?;

        if status.is_success() {
            Ok(SubmitResponse {
                index,
                status: status.as_u16(),
                body,
                latency: start.elapsed(),
            })
        } else {
            Err(SubmitError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

impl Submit for ApiClient {
    async fn submit(&self, element: Element) -> SubmitResult {
        self.send(element).await
    }
}
