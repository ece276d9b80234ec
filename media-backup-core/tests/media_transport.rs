use std::io::Write;

use media_backup_core::config::MediaConfig;
use media_backup_core::contract::{
    Privacy, ResumableUploadTransport, SessionRequest, UploadTarget, VideoMetadata,
};
use media_backup_core::credential::StaticToken;
use media_backup_core::error::{TransportError, UploadError};
use media_backup_core::publish::publish_video;
use media_backup_core::retry::{RetryConfig, RetryPolicy};
use media_backup_core::transport::MediaApiTransport;
use media_backup_core::uploader::ChunkUploader;
use tempfile::NamedTempFile;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INSERT_PATH: &str = "/upload/youtube/v3/videos";

fn transport(server: &MockServer) -> MediaApiTransport {
    let config = MediaConfig {
        endpoint: format!("{}{INSERT_PATH}", server.uri()),
        chunk_size: 4,
        ..MediaConfig::default()
    };
    MediaApiTransport::new(&config, None).unwrap()
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy::new(RetryConfig {
        backoff_unit_ms: 1,
        ..RetryConfig::default()
    })
}

fn metadata() -> VideoMetadata {
    VideoMetadata {
        title: "Holiday".into(),
        description: "Beach day".into(),
        tags: vec!["travel".into()],
        privacy: Privacy::Unlisted,
        category_id: "22".into(),
    }
}

fn video_file(contents: &[u8]) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap();
    file.write_all(contents).unwrap();
    file
}

async fn mount_insert(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(INSERT_PATH))
        .and(query_param("uploadType", "resumable"))
        .and(query_param("part", "snippet,status"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("x-upload-content-type", "video/mp4"))
        .and(header("x-upload-content-length", "10"))
        .and(body_partial_json(serde_json::json!({
            "snippet": { "title": "Holiday", "tags": ["travel"], "categoryId": "22" },
            "status": { "privacyStatus": "unlisted" }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Location", format!("{}/session/video", server.uri()).as_str()),
        )
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn publish_follows_server_range_and_returns_watch_url() {
    let server = MockServer::start().await;
    mount_insert(&server).await;

    // Server keeps only two bytes of the first chunk.
    Mock::given(method("PUT"))
        .and(path("/session/video"))
        .and(header("content-range", "bytes 0-3/10"))
        .respond_with(ResponseTemplate::new(308).insert_header("Range", "bytes=0-1"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/session/video"))
        .and(header("content-range", "bytes 2-5/10"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/session/video"))
        .and(header("content-range", "bytes 2-5/10"))
        .respond_with(ResponseTemplate::new(308))
        .with_priority(2)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/session/video"))
        .and(header("content-range", "bytes 6-9/10"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(serde_json::json!({ "id": "abc123", "kind": "youtube#video" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let file = video_file(b"0123456789");
    let t = transport(&server);
    let uploader = ChunkUploader::new(&t, fast_policy());
    let published = publish_video(&uploader, file.path(), metadata(), &mut StaticToken::new("test-token"))
        .await
        .expect("video published");

    assert_eq!(published.video_id, "abc123");
    assert_eq!(published.url, "https://www.youtube.com/watch?v=abc123");
    assert_eq!(published.bytes, 10);

    let bodies: Vec<Vec<u8>> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "PUT")
        .map(|r| r.body)
        .collect();
    assert_eq!(
        bodies,
        vec![b"0123".to_vec(), b"2345".to_vec(), b"2345".to_vec(), b"6789".to_vec()]
    );
}

#[tokio::test]
async fn completion_without_video_id_is_malformed() {
    let server = MockServer::start().await;
    mount_insert(&server).await;
    Mock::given(method("PUT"))
        .and(path("/session/video"))
        .and(header("content-range", "bytes 0-3/10"))
        .respond_with(ResponseTemplate::new(308))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/session/video"))
        .and(header("content-range", "bytes 4-7/10"))
        .respond_with(ResponseTemplate::new(308))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/session/video"))
        .and(header("content-range", "bytes 8-9/10"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let file = video_file(b"0123456789");
    let t = transport(&server);
    let uploader = ChunkUploader::new(&t, fast_policy());
    let err = publish_video(&uploader, file.path(), metadata(), &mut StaticToken::new("test-token"))
        .await
        .expect_err("no id in final body");
    assert!(matches!(
        err,
        UploadError::TerminalServerError(TransportError::MalformedResponse(_))
    ));
}

#[tokio::test]
async fn quota_rejection_on_insert_is_an_initiation_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INSERT_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": { "code": 403, "message": "The request cannot be completed because you have exceeded your quota." }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let file = video_file(b"0123456789");
    let t = transport(&server);
    let uploader = ChunkUploader::new(&t, fast_policy());
    let err = publish_video(&uploader, file.path(), metadata(), &mut StaticToken::new("test-token"))
        .await
        .expect_err("quota exceeded");
    assert!(matches!(
        err,
        UploadError::InitiationFailure(TransportError::Status { status: 403, .. })
    ));
    assert!(err.to_string().contains("exceeded your quota"));
}

#[tokio::test]
async fn media_transport_refuses_object_targets() {
    let server = MockServer::start().await;
    let t = transport(&server);
    let request = SessionRequest {
        target: UploadTarget::Object {
            bucket: "b".into(),
            key: "k".into(),
        },
        content_type: "video/mp4".into(),
        total_bytes: 10,
        bearer_token: "test-token".into(),
    };
    assert!(matches!(
        t.initiate(&request).await,
        Err(TransportError::InvalidRequest(_))
    ));
    assert!(matches!(
        t.upload_single(&request, vec![1, 2, 3]).await,
        Err(TransportError::InvalidRequest(_))
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}
