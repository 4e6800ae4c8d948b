//! Bearer token acquisition.
//!
//! A run authenticates exactly once, before the first element is read,
//! either by logging in with email and password or by reading a token that
//! was issued earlier. Neither path retries.

use crate::endpoint::Target;
use crate::error::AuthError;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Opaque credential sent as `Authorization: Bearer <token>`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wrap a raw token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty token means no `Authorization` header is sent.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("BearerToken(<empty>)")
        } else {
            f.write_str("BearerToken(<redacted>)")
        }
    }
}

/// Where the bearer token comes from.
#[derive(Clone)]
pub enum CredentialSource {
    /// Exchange email and password for a token at the target's login endpoint.
    Login {
        /// Account email.
        email: String,
        /// Account password.
        password: String,
    },
    /// Read a pre-issued token from a plain-text file.
    TokenFile {
        /// Path to the token file.
        path: PathBuf,
    },
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login { email, .. } => f
                .debug_struct("Login")
                .field("email", email)
                .field("password", &"<redacted>")
                .finish(),
            Self::TokenFile { path } => f.debug_struct("TokenFile").field("path", path).finish(),
        }
    }
}

impl CredentialSource {
    /// Obtain the bearer token for this run.
    pub async fn acquire(&self, client: &Client, target: &Target) -> Result<BearerToken, AuthError> {
        match self {
            Self::Login { email, password } => login(client, target, email, password).await,
            Self::TokenFile { path } => read_token_file(path).await,
        }
    }

    /// Short label for logs.
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::TokenFile { .. } => "token-file",
        }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: Option<String>,
}

/// POST `{email, password}` to the login endpoint and decode `{token}`.
pub async fn login(
    client: &Client,
    target: &Target,
    email: &str,
    password: &str,
) -> Result<BearerToken, AuthError> {
    let url = target.login_url();
    debug!(url = %url, "Logging in");

    let response = client
        .post(url.clone())
        .json(&LoginRequest { email, password })
        .send()
        .await
        .map_err(|source| AuthError::Request {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(AuthError::Status {
            status: status.as_u16(),
        });
    }

    let body: LoginResponse = response.json().await.map_err(AuthError::Decode)?;
    let token = body.token.map(BearerToken::new).unwrap_or_default();
    if token.is_empty() {
        warn!(url = %url, "Login response carried no token");
    } else {
        info!(url = %url, "Logged in");
    }
    Ok(token)
}

/// Read a token file, trimming surrounding whitespace.
pub async fn read_token_file(path: &Path) -> Result<BearerToken, AuthError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| AuthError::TokenFile {
            path: path.to_path_buf(),
            source,
        })?;

    debug!(path = %path.display(), "Loaded token from file");
    Ok(BearerToken::new(content.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Method;
    use std::io::Write;
    use url::Url;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn target_for(server: &MockServer) -> Target {
        let url = Url::parse(&format!("{}/api/v1/items?x=1", server.uri())).unwrap();
        Target::new(Method::Post, url).unwrap()
    }

    #[tokio::test]
    async fn test_login_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/login"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({
                "email": "ops@example.com",
                "password": "hunter2"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "abc123",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let source = CredentialSource::Login {
            email: "ops@example.com".to_string(),
            password: "hunter2".to_string(),
        };
        let token = source
            .acquire(&Client::new(), &target_for(&server))
            .await
            .unwrap();

        assert_eq!(token.as_str(), "abc123");
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/login"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = login(&Client::new(), &target_for(&server), "a@b.c", "wrong")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Status { status: 401 }));
    }

    #[tokio::test]
    async fn test_login_requires_exactly_200() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/login"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"token": "t"})))
            .mount(&server)
            .await;

        let err = login(&Client::new(), &target_for(&server), "a@b.c", "pw")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Status { status: 201 }));
    }

    #[tokio::test]
    async fn test_login_bad_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = login(&Client::new(), &target_for(&server), "a@b.c", "pw")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Decode(_)));
    }

    #[tokio::test]
    async fn test_login_without_token_yields_empty_token() {
        for body in [serde_json::json!({}), serde_json::json!({"token": null})] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/users/login"))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&server)
                .await;

            let token = login(&Client::new(), &target_for(&server), "a@b.c", "pw")
                .await
                .unwrap();

            assert!(token.is_empty());
        }
    }

    #[tokio::test]
    async fn test_login_non_string_token_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": 42})))
            .mount(&server)
            .await;

        let err = login(&Client::new(), &target_for(&server), "a@b.c", "pw")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Decode(_)));
    }

    #[tokio::test]
    async fn test_login_unreachable() {
        // Port 9 (discard) is closed on test machines.
        let target = Target::new(Method::Put, Url::parse("http://127.0.0.1:9/items").unwrap()).unwrap();
        let err = login(&Client::new(), &target, "a@b.c", "pw").await.unwrap_err();

        assert!(matches!(err, AuthError::Request { .. }));
    }

    #[tokio::test]
    async fn test_token_file_trimmed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  \n\tsecret-token \n").unwrap();

        let token = read_token_file(file.path()).await.unwrap();
        assert_eq!(token.as_str(), "secret-token");
    }

    #[tokio::test]
    async fn test_token_file_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = read_token_file(&dir.path().join("nope.txt")).await.unwrap_err();

        assert!(matches!(err, AuthError::TokenFile { .. }));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let source = CredentialSource::Login {
            email: "a@b.c".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{source:?}").contains("hunter2"));
        assert!(!format!("{:?}", BearerToken::new("abc")).contains("abc"));
    }
}
