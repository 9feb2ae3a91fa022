//! Integration tests for `ReqwestFetcher` using wiremock HTTP mocks.

use std::collections::BTreeMap;

use civicfeed_ingest::{FetchError, HttpGet, ReqwestFetcher};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher() -> ReqwestFetcher {
    ReqwestFetcher::new(30, "civicfeed-test/0.1").expect("fetcher construction should not fail")
}

#[tokio::test]
async fn get_returns_status_and_body_with_headers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/feed.json"))
        .and(header("accept", "application/json"))
        .and(header("user-agent", "civicfeed-test/0.1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"id": 1}]"#))
        .expect(1)
        .mount(&server)
        .await;

    let mut headers = BTreeMap::new();
    headers.insert("Accept".to_string(), "application/json".to_string());

    let response = fetcher()
        .get(&format!("{}/feed.json", server.uri()), &headers)
        .await
        .expect("fetch should succeed");

    assert_eq!(response.status, 200);
    assert_eq!(response.body, br#"[{"id": 1}]"#);
}

#[tokio::test]
async fn non_success_status_is_returned_not_raised() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
        .mount(&server)
        .await;

    let response = fetcher()
        .get(&format!("{}/gone", server.uri()), &BTreeMap::new())
        .await
        .expect("non-2xx is not a transport error");

    assert_eq!(response.status, 404);
    assert!(!response.is_success());
}

#[tokio::test]
async fn redirects_are_followed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", format!("{}/new", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<kml></kml>"))
        .mount(&server)
        .await;

    let response = fetcher()
        .get(&format!("{}/old", server.uri()), &BTreeMap::new())
        .await
        .expect("redirect should be followed");

    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"<kml></kml>");
}

#[tokio::test]
async fn invalid_header_fails_before_sending() {
    let mut headers = BTreeMap::new();
    headers.insert("X-Token".to_string(), "line\nbreak".to_string());

    let err = fetcher()
        .get("http://127.0.0.1:9/never", &headers)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::InvalidHeader { name, .. } if name == "X-Token"));
}

#[tokio::test]
async fn connection_failure_is_http_error() {
    let err = fetcher()
        .get("http://127.0.0.1:9/refused", &BTreeMap::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Http(_)));
}
