//! End-to-end runs of the processor against stub HTTP servers.

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use url::Url;
use volley::{
    AuthError, CredentialSource, Method, Processor, Reporter, RequestConfig, RunConfig, Target,
    VolleyError,
};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn input_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn config(server: &MockServer, method: Method, input: &Path, credentials: CredentialSource) -> RunConfig {
    let url = Url::parse(&format!("{}/items", server.uri())).unwrap();
    RunConfig {
        target: Target::new(method, url).unwrap(),
        input: input.to_path_buf(),
        credentials,
        request: RequestConfig::default(),
    }
}

fn login() -> CredentialSource {
    CredentialSource::Login {
        email: "ops@example.com".to_string(),
        password: "hunter2".to_string(),
    }
}

async fn mount_login(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/users/login"))
        .and(body_json(serde_json::json!({
            "email": "ops@example.com",
            "password": "hunter2"
        })))
        .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({"token": "t0k"})))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn both_elements_succeed() {
    let server = MockServer::start().await;
    mount_login(&server, 200).await;
    Mock::given(method("POST"))
        .and(path("/items"))
        .and(header("authorization", "Bearer t0k"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(2)
        .mount(&server)
        .await;

    let input = input_file(r#"[{"a":1},{"a":2}]"#);
    let processor = Processor::new(config(&server, Method::Post, input.path(), login())).unwrap();
    let result = processor.process(Reporter::quiet()).await.unwrap();

    assert_eq!(result.success_count, 2);
    assert_eq!(result.failure_count, 0);
    assert!(result.render().starts_with("Successful requests: 2\nFailed requests: 0\n"));
}

#[tokio::test]
async fn server_error_counts_as_failure() {
    let server = MockServer::start().await;
    mount_login(&server, 200).await;
    Mock::given(method("POST"))
        .and(path("/items"))
        .and(body_json(serde_json::json!({"a": 2})))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let input = input_file(r#"[{"a":1},{"a":2}]"#);
    let processor = Processor::new(config(&server, Method::Post, input.path(), login())).unwrap();
    let result = processor.process(Reporter::quiet()).await.unwrap();

    assert!(result.render().starts_with("Successful requests: 1\nFailed requests: 1\n"));
}

#[tokio::test]
async fn login_failure_sends_nothing() {
    let server = MockServer::start().await;
    mount_login(&server, 401).await;
    Mock::given(method("POST"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let input = input_file(r#"[{"a":1},{"a":2}]"#);
    let processor = Processor::new(config(&server, Method::Post, input.path(), login())).unwrap();
    let err = processor.process(Reporter::quiet()).await.unwrap_err();

    assert!(matches!(err, VolleyError::Auth(AuthError::Status { status: 401 })));
}

#[tokio::test]
async fn malformed_element_is_skipped() {
    let server = MockServer::start().await;
    mount_login(&server, 200).await;
    Mock::given(method("PUT"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(204))
        .expect(3)
        .mount(&server)
        .await;

    let input = input_file(r#"[{"a":1}, {"a":}, {"a":3}, {"a":4}]"#);
    let processor = Processor::new(config(&server, Method::Put, input.path(), login())).unwrap();
    let result = processor.process(Reporter::quiet()).await.unwrap();

    assert_eq!(result.submitted, 3);
    assert_eq!(result.success_count, 3);
    assert_eq!(result.failure_count, 0);
    assert_eq!(result.skipped, 1);
}

#[tokio::test]
async fn token_file_mode_skips_login() {
    let server = MockServer::start().await;
    Mock::given(path("/users/login"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/items"))
        .and(header("authorization", "Bearer from-file"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let token = input_file("\n  from-file \n");
    let input = input_file("[ \"just a string\" ]");
    let credentials = CredentialSource::TokenFile {
        path: token.path().to_path_buf(),
    };
    let processor = Processor::new(config(&server, Method::Post, input.path(), credentials)).unwrap();
    let result = processor.process(Reporter::quiet()).await.unwrap();

    assert_eq!(result.success_count, 1);
}

#[tokio::test]
async fn missing_input_aborts_before_dispatch() {
    let server = MockServer::start().await;
    mount_login(&server, 200).await;
    Mock::given(path("/items"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let missing = PathBuf::from("/nonexistent/volley/input.json");
    let processor = Processor::new(config(&server, Method::Post, &missing, login())).unwrap();
    let err = processor.process(Reporter::quiet()).await.unwrap_err();

    assert!(matches!(err, VolleyError::InputFileRead { .. }));
}

#[tokio::test]
async fn non_array_input_aborts_before_dispatch() {
    let server = MockServer::start().await;
    mount_login(&server, 200).await;
    Mock::given(path("/items"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let input = input_file(r#"{"a":1}"#);
    let processor = Processor::new(config(&server, Method::Post, input.path(), login())).unwrap();
    let err = processor.process(Reporter::quiet()).await.unwrap_err();

    assert!(matches!(err, VolleyError::DocumentParse { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn repeated_runs_report_the_same_totals() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_millis(5)))
        .expect(150)
        .mount(&server)
        .await;

    let items: Vec<String> = (0..50).map(|i| format!(r#"{{"n":{i}}}"#)).collect();
    let input = input_file(&format!("[{}]", items.join(",")));
    let token = input_file("t");

    for _ in 0..3 {
        let credentials = CredentialSource::TokenFile {
            path: token.path().to_path_buf(),
        };
        let processor =
            Processor::new(config(&server, Method::Post, input.path(), credentials)).unwrap();
        let result = processor.process(Reporter::quiet()).await.unwrap();

        assert_eq!(result.success_count, 50);
        assert_eq!(result.failure_count, 0);
        assert!(result.peak_in_flight <= volley::MAX_IN_FLIGHT);
    }
}

#[tokio::test]
async fn dry_run_scan_sends_nothing() {
    let server = MockServer::start().await;

    let input = input_file("[1, nope, 3, {\"a\": [1, 2]}]");
    let processor = Processor::new(config(&server, Method::Post, input.path(), login())).unwrap();
    let scan = processor.scan().await.unwrap();

    assert_eq!(scan.elements, 3);
    assert_eq!(scan.malformed, 1);
    assert!(scan.read_error.is_none());
    assert!(server.received_requests().await.unwrap().is_empty());
}
