mod common;

use std::time::Duration;

use common::{
    flat_document, service_config, start_mock_service, start_programmable_service, MockResponse,
};
use config_client::config::ServiceConfig;
use config_client::{ConfigFetcher, FetchError, FetchOutcome, HttpFetcher};

const TIMEOUT: Duration = Duration::from_secs(2);

fn fetcher(service: &ServiceConfig) -> HttpFetcher {
    HttpFetcher::new(service, TIMEOUT).unwrap()
}

#[tokio::test]
async fn test_conditional_get_round_trip() {
    let (addr, log) = start_programmable_service(|req| async move {
        if req.header("if-none-match") == Some("\"v1\"") {
            MockResponse::status(304)
        } else {
            MockResponse::json(flat_document("v1", &[("greeting", "hello")]))
        }
    })
    .await;
    let fetcher = fetcher(&service_config(addr));

    let first = fetcher.fetch(None).await.unwrap();
    let FetchOutcome::Updated(snapshot) = first else {
        panic!("expected an updated snapshot, got {:?}", first);
    };
    assert_eq!(snapshot.version(), "v1");
    assert_eq!(snapshot.get("greeting"), Some("hello"));

    let second = fetcher.fetch(Some("v1")).await.unwrap();
    assert_eq!(second, FetchOutcome::Unchanged);

    let requests = log.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path, "/orders/prod");
    assert_eq!(requests[0].header("if-none-match"), None);
    assert!(requests[0].header("x-request-id").is_some());
    assert_eq!(requests[1].header("if-none-match"), Some("\"v1\""));
}

#[tokio::test]
async fn test_environment_document_merges_sources() {
    let body = r#"{
        "name": "orders",
        "profiles": ["prod"],
        "version": "8f2c1e",
        "propertySources": [
            {"name": "orders-prod.yml", "source": {"db.pool": 20}},
            {"name": "orders.yml", "source": {"db.pool": 5, "db.url": "postgres://db"}}
        ]
    }"#;
    let (addr, _log) = start_mock_service(MockResponse::json(body)).await;

    let outcome = fetcher(&service_config(addr)).fetch(None).await.unwrap();
    let FetchOutcome::Updated(snapshot) = outcome else {
        panic!("expected an updated snapshot");
    };
    assert_eq!(snapshot.version(), "8f2c1e");
    assert_eq!(snapshot.get("db.pool"), Some("20"));
    assert_eq!(snapshot.get("db.url"), Some("postgres://db"));
}

#[tokio::test]
async fn test_etag_supplies_missing_version() {
    let response =
        MockResponse::json(r#"{"values": {"a": "1"}}"#).with_header("ETag", "W/\"rev-42\"");
    let (addr, _log) = start_mock_service(response).await;
    let fetcher = fetcher(&service_config(addr));

    let FetchOutcome::Updated(snapshot) = fetcher.fetch(None).await.unwrap() else {
        panic!("expected an updated snapshot");
    };
    assert_eq!(snapshot.version(), "rev-42");

    // Service ignores If-None-Match but the version still matches.
    assert_eq!(fetcher.fetch(Some("rev-42")).await.unwrap(), FetchOutcome::Unchanged);
}

#[tokio::test]
async fn test_status_codes_map_to_errors() {
    for (status, expected) in [
        (401, FetchError::Unauthorized(401)),
        (403, FetchError::Unauthorized(403)),
    ] {
        let (addr, _log) = start_mock_service(MockResponse::status(status)).await;
        let err = fetcher(&service_config(addr)).fetch(None).await.unwrap_err();
        assert_eq!(err, expected);
    }

    for status in [404, 500, 503] {
        let (addr, _log) = start_mock_service(MockResponse::status(status)).await;
        let err = fetcher(&service_config(addr)).fetch(None).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidResponse(_)), "status {}: {:?}", status, err);
    }
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let (addr, _log) = start_mock_service(MockResponse::json("<html>oops</html>")).await;
    let err = fetcher(&service_config(addr)).fetch(None).await.unwrap_err();
    assert!(matches!(err, FetchError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = fetcher(&service_config(addr)).fetch(None).await.unwrap_err();
    assert!(matches!(err, FetchError::Network(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_slow_service_times_out() {
    let response = MockResponse::json(flat_document("v1", &[])).delayed(Duration::from_secs(5));
    let (addr, _log) = start_mock_service(response).await;
    let fetcher = HttpFetcher::new(&service_config(addr), Duration::from_millis(200)).unwrap();

    let err = fetcher.fetch(None).await.unwrap_err();
    assert_eq!(err, FetchError::Timeout(Duration::from_millis(200)));
}

#[tokio::test]
async fn test_credentials_are_sent() {
    let (addr, log) = start_mock_service(MockResponse::json(flat_document("v1", &[]))).await;

    let basic = ServiceConfig {
        username: Some("user".to_string()),
        password: Some("pass".to_string()),
        ..service_config(addr)
    };
    fetcher(&basic).fetch(None).await.unwrap();

    let bearer = ServiceConfig {
        token: Some("s3cret".to_string()),
        ..service_config(addr)
    };
    fetcher(&bearer).fetch(None).await.unwrap();

    let requests = log.lock().unwrap();
    assert_eq!(requests[0].header("authorization"), Some("Basic dXNlcjpwYXNz"));
    assert_eq!(requests[1].header("authorization"), Some("Bearer s3cret"));
}
