//! Configuration management for Volley.
//!
//! Everything comes from CLI arguments, each with a `VOLLEY_*` environment
//! variable fallback. [`RunConfig`] is the validated, immutable form shared
//! by every task of a run.

use crate::auth::CredentialSource;
use crate::endpoint::{Method, Target};
use crate::error::{Result, VolleyError};
use clap::{ArgGroup, Parser};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// CLI arguments for the Volley submitter.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "volley",
    author = "Yiğit Konur <yigit@wope.com>",
    version,
    about = "Replay every element of a JSON array as an authenticated HTTP request",
    long_about = "Volley streams a JSON array from disk and sends each element as the body of\n\
                  its own POST or PUT request, at most ten at a time, then reports how many\n\
                  succeeded and how many failed.",
    after_help = "EXAMPLES:\n    \
        volley --method POST --url https://api.example.com/items --input items.json \\\n        \
               --email ops@example.com --password hunter2\n    \
        volley --method PUT --url http://localhost:8080/items --input items.json --token token.txt",
    group(
        ArgGroup::new("credentials")
            .required(true)
            .args(["email", "token"])
    )
)]
pub struct Args {
    /// HTTP method used for every element (POST or PUT)
    #[arg(short, long, value_enum, env = "VOLLEY_METHOD")]
    pub method: Method,

    /// Target endpoint URL; its scheme and host also locate the login endpoint
    #[arg(short, long, value_parser = Url::parse, env = "VOLLEY_URL")]
    pub url: Url,

    /// Path to the JSON file whose top-level value is an array
    #[arg(short, long, env = "VOLLEY_INPUT")]
    pub input: PathBuf,

    /// Email for login
    #[arg(short, long, requires = "password", env = "VOLLEY_EMAIL")]
    pub email: Option<String>,

    /// Password for login
    #[arg(short, long, requires = "email", env = "VOLLEY_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Path to a file holding a pre-issued bearer token
    #[arg(short, long, conflicts_with_all = ["email", "password"], env = "VOLLEY_TOKEN_FILE")]
    pub token: Option<PathBuf>,

    /// Per-request timeout in seconds (no timeout when omitted)
    #[arg(long, env = "VOLLEY_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Maximum requests launched per second (unlimited when omitted)
    #[arg(short, long, env = "VOLLEY_RATE")]
    pub rate: Option<NonZeroU32>,

    /// Enable verbose logging
    #[arg(short, long, env = "VOLLEY_VERBOSE")]
    pub verbose: bool,

    /// Output logs as JSON
    #[arg(long, env = "VOLLEY_JSON_LOGS")]
    pub json_logs: bool,

    /// Disable progress spinner
    #[arg(long, env = "VOLLEY_NO_PROGRESS")]
    pub no_progress: bool,

    /// Dry run - validate config and input without sending requests
    #[arg(long)]
    pub dry_run: bool,
}

impl Args {
    /// Parse CLI arguments, returning clap's error instead of exiting.
    pub fn try_parse_args() -> std::result::Result<Self, clap::Error> {
        Self::try_parse()
    }
}

/// Request-specific configuration.
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Per-request timeout; `None` keeps the HTTP client default.
    pub timeout: Option<Duration>,

    /// Maximum launches per second; `None` means unlimited.
    pub rate_limit: Option<NonZeroU32>,
}

/// Full, validated configuration of one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Method and URL every element is sent to.
    pub target: Target,

    /// JSON array input file.
    pub input: PathBuf,

    /// How the bearer token is obtained.
    pub credentials: CredentialSource,

    /// Request settings.
    pub request: RequestConfig,
}

impl RunConfig {
    /// Create configuration from CLI arguments.
    pub fn from_args(args: &Args) -> Result<Self> {
        let credentials = match (&args.email, &args.password, &args.token) {
            (Some(email), Some(password), None) => CredentialSource::Login {
                email: email.clone(),
                password: password.clone(),
            },
            (None, None, Some(path)) => CredentialSource::TokenFile { path: path.clone() },
            _ => {
                return Err(VolleyError::InvalidConfig(
                    "use either --email/--password or --token".to_string(),
                ));
            }
        };

        let config = Self {
            target: Target::new(args.method, args.url.clone())?,
            input: args.input.clone(),
            credentials,
            request: RequestConfig {
                timeout: args.timeout.map(Duration::from_secs),
                rate_limit: args.rate,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.input.as_os_str().is_empty() {
            return Err(VolleyError::InvalidConfig(
                "input path cannot be empty".to_string(),
            ));
        }

        match &self.credentials {
            CredentialSource::Login { email, password } => {
                if email.is_empty() || password.is_empty() {
                    return Err(VolleyError::InvalidConfig(
                        "email and password cannot be empty".to_string(),
                    ));
                }
            }
            CredentialSource::TokenFile { path } => {
                if path.as_os_str().is_empty() {
                    return Err(VolleyError::InvalidConfig(
                        "token path cannot be empty".to_string(),
                    ));
                }
            }
        }

        if self.request.timeout == Some(Duration::ZERO) {
            return Err(VolleyError::InvalidConfig(
                "timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
