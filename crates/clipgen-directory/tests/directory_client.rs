//! HTTP contract tests for the directory client.

use std::time::Duration;

use clipgen_directory::{CameraDirectory, DirectoryClient, DirectoryConfig, DirectoryError, RetryConfig};
use clipgen_models::{ClipMetadata, ClipRecord, ClipRequest, FailureReason};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> DirectoryClient {
    let mut config = DirectoryConfig::new(server.uri(), format!("{}/recordings/", server.uri()));
    config.timeout = Duration::from_secs(5);
    config.retry = RetryConfig {
        max_retries: 1,
        base_delay_ms: 1,
        max_delay_ms: 1,
    };
    DirectoryClient::new(config).unwrap()
}

#[tokio::test]
async fn test_resolve_alias() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cameras/cam-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"alias": "frontdoor"})))
        .expect(1)
        .mount(&server)
        .await;

    let alias = client(&server).resolve_alias("cam-1").await.unwrap();
    assert_eq!(alias, "frontdoor");
}

#[tokio::test]
async fn test_ids_are_sent_as_single_path_segments() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cameras/lobby%2F2%3Fa%23b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"alias": "lobby"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/recordings/cameras/recording/east%2Fwing"))
        .and(query_param("startDate", "1000"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    assert_eq!(client.resolve_alias("lobby/2?a#b").await.unwrap(), "lobby");
    assert!(client
        .list_segments("east/wing", 1000, 5000)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_resolve_alias_missing_field_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cameras/cam-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "x"})))
        .mount(&server)
        .await;

    let err = client(&server).resolve_alias("cam-1").await.unwrap_err();
    assert!(matches!(err, DirectoryError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_list_segments_returns_basenames() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/recordings/cameras/recording/frontdoor"))
        .and(query_param("startDate", "1000"))
        .and(query_param("endDate", "5000"))
        .and(query_param("allowPartialMatch", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"recordingUrl": "https://rec.example.com/x/frontdoor.stream.19700101T000004000.mp4"},
            {"somethingElse": true},
            {"recordingUrl": "https://rec.example.com/x/frontdoor.stream.19700101T000000500.mp4"}
        ])))
        .mount(&server)
        .await;

    let segments = client(&server)
        .list_segments("frontdoor", 1000, 5000)
        .await
        .unwrap();
    assert_eq!(
        segments,
        vec![
            "frontdoor.stream.19700101T000004000.mp4".to_string(),
            "frontdoor.stream.19700101T000000500.mp4".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_list_segments_not_found_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/recordings/cameras/recording/frontdoor"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let segments = client(&server)
        .list_segments("frontdoor", 1000, 5000)
        .await
        .unwrap();
    assert!(segments.is_empty());
}

#[tokio::test]
async fn test_list_segments_server_error_is_retried_then_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/recordings/cameras/recording/frontdoor"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let err = client(&server)
        .list_segments("frontdoor", 1000, 5000)
        .await
        .unwrap_err();
    assert!(matches!(err, DirectoryError::ServerError(503, _)));
}

#[tokio::test]
async fn test_publish_metadata_puts_by_clip_id() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/clips/clip-9"))
        .and(body_partial_json(json!({
            "clipId": "clip-9",
            "status": "CLIP_NOT_AVAILABLE"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let request = ClipRequest::parse(
        r#"{"cameraId":"cam-1","clipId":"clip-9","startTimestampInMs":1000,"endTimestampInMs":5000}"#,
        "2000",
    )
    .unwrap();
    let metadata = ClipMetadata::new(
        &request,
        vec![],
        &ClipRecord::Failed(FailureReason::NotAvailable),
    );

    client(&server).publish_metadata(&metadata).await.unwrap();
}
