//! Submission target: HTTP method plus endpoint URL.
//!
//! The target URL is also where the login endpoint is derived from, so
//! validation here makes sure it has a scheme and a host.

use crate::error::{Result, VolleyError};
use clap::ValueEnum;
use std::fmt;
use url::Url;

/// Path appended to the target's origin to form the login endpoint.
pub const LOGIN_PATH: &str = "/users/login";

/// HTTP methods an element can be submitted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Method {
    /// Create records.
    #[value(name = "POST")]
    Post,
    /// Replace records.
    #[value(name = "PUT")]
    Put,
}

impl Method {
    /// Upper-case wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
        }
    }
}

/// Where and how every element is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    method: Method,
    url: Url,
}

impl Target {
    /// Create a target, rejecting URLs that are not absolute http(s) URLs.
    pub fn new(method: Method, url: Url) -> Result<Self> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(VolleyError::InvalidConfig(format!(
                "unsupported URL scheme '{}' in {url}",
                url.scheme()
            )));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(VolleyError::InvalidConfig(format!(
                "endpoint URL has no host: {url}"
            )));
        }
        Ok(Self { method, url })
    }

    /// HTTP method for submissions.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Endpoint URL for submissions.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// `scheme://host[:port]/users/login`, dropping credentials, query and fragment.
    pub fn login_url(&self) -> Url {
        let mut login = self.url.clone();
        login.set_path(LOGIN_PATH);
        login.set_query(None);
        login.set_fragment(None);
        // Only fails for URLs that cannot carry credentials, which `new` rejects.
        let _ = login.set_username("");
        let _ = login.set_password(None);
        login
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}
