//! Bucket asset tests against a mock S3 endpoint.

use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_s3::Client;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vidproc_models::{PROCESSED_BUCKET, RAW_BUCKET};
use vidproc_storage::{BucketAssets, RemoteAssets, StorageConfig, StorageError};

fn s3_error(status: u16, code: &str) -> ResponseTemplate {
    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Error><Code>{code}</Code><Message>{code}</Message><RequestId>test-request</RequestId></Error>"#
    );
    ResponseTemplate::new(status).set_body_raw(body, "application/xml")
}

fn object_path(bucket: &str, key: &str) -> String {
    format!("/{bucket}/{key}")
}

fn assets_for(server: &MockServer) -> BucketAssets {
    let config = StorageConfig {
        endpoint_url: Some(server.uri()),
        access_key_id: Some("test-access-key".to_string()),
        secret_access_key: Some("test-secret-key".to_string()),
        region: Some("us-east-1".to_string()),
        force_path_style: true,
    };
    let sdk_config = SdkConfig::builder()
        .behavior_version(BehaviorVersion::latest())
        .build();

    BucketAssets::with_default_buckets(Client::from_conf(config.client_config(&sdk_config)))
}

#[tokio::test]
async fn test_fetch_writes_object_to_disk() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(object_path(RAW_BUCKET, "clip1.mp4")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"raw video".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("raw-videos/clip1.mp4");

    assets_for(&server)
        .fetch("clip1.mp4", &destination)
        .await
        .unwrap();

    assert_eq!(std::fs::read(&destination).unwrap(), b"raw video");
}

#[tokio::test]
async fn test_fetch_missing_object_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(object_path(RAW_BUCKET, "gone.mp4")))
        .respond_with(s3_error(404, "NoSuchKey"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("gone.mp4");

    let err = assets_for(&server)
        .fetch("gone.mp4", &destination)
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::NotFound(_)), "got {err:?}");
    assert!(!destination.exists());
}

#[tokio::test]
async fn test_publish_uploads_then_makes_public() {
    let server = MockServer::start().await;
    let key = "processed-clip1.mp4";

    Mock::given(method("PUT"))
        .and(path(object_path(PROCESSED_BUCKET, key)))
        .and(query_param_is_missing("acl"))
        .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"etag\""))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(object_path(PROCESSED_BUCKET, key)))
        .and(query_param("acl", ""))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let source = dir.path().join(key);
    std::fs::write(&source, b"processed video").unwrap();

    assets_for(&server).publish(&source, key).await.unwrap();
}

#[tokio::test]
async fn test_publish_fails_when_acl_is_denied() {
    let server = MockServer::start().await;
    let key = "processed-clip1.mp4";

    Mock::given(method("PUT"))
        .and(path(object_path(PROCESSED_BUCKET, key)))
        .and(query_param_is_missing("acl"))
        .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"etag\""))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(object_path(PROCESSED_BUCKET, key)))
        .and(query_param("acl", ""))
        .respond_with(s3_error(403, "AccessDenied"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let source = dir.path().join(key);
    std::fs::write(&source, b"processed video").unwrap();

    let err = assets_for(&server).publish(&source, key).await.unwrap_err();

    assert!(matches!(err, StorageError::AclFailed(_)), "got {err:?}");
}

#[tokio::test]
async fn test_publish_upload_failure_skips_acl() {
    let server = MockServer::start().await;
    let key = "processed-clip1.mp4";

    Mock::given(method("PUT"))
        .and(path(object_path(PROCESSED_BUCKET, key)))
        .and(query_param_is_missing("acl"))
        .respond_with(s3_error(403, "AccessDenied"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(query_param("acl", ""))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let source = dir.path().join(key);
    std::fs::write(&source, b"processed video").unwrap();

    let err = assets_for(&server).publish(&source, key).await.unwrap_err();

    assert!(matches!(err, StorageError::UploadFailed(_)), "got {err:?}");
}

#[tokio::test]
async fn test_connectivity_checks_both_buckets() {
    let server = MockServer::start().await;
    for bucket in [RAW_BUCKET, PROCESSED_BUCKET] {
        Mock::given(method("HEAD"))
            .and(path(format!("/{bucket}")))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
    }

    assets_for(&server).check_connectivity().await.unwrap();
}
