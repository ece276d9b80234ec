//! Object storage provider (JSON API resumable and single-shot media uploads).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::info;

use super::{
    build_client, completion_or_resume, put_chunk, session_location, X_UPLOAD_CONTENT_LENGTH,
    X_UPLOAD_CONTENT_TYPE,
};
use crate::config::ObjectStorageConfig;
use crate::contract::{ChunkResponse, ResumableUploadTransport, SessionRequest, UploadTarget};
use crate::error::TransportError;
use crate::retry::RetryScope;
use crate::session::{ChunkDescriptor, UploadSession};

/// Cloud storage JSON API: metadata POST for a session URL, then ranged PUTs.
pub struct ObjectStorageTransport {
    client: Client,
    endpoint: String,
    chunk_size: u64,
    single_shot_threshold: u64,
}

impl ObjectStorageTransport {
    pub fn new(
        config: &ObjectStorageConfig,
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            chunk_size: config.chunk_size,
            single_shot_threshold: config.single_shot_threshold,
        })
    }

    /// `gs://` URL of an object, for reports.
    pub fn object_url(bucket: &str, key: &str) -> String {
        format!("gs://{bucket}/{key}")
    }

    fn upload_url(&self, bucket: &str) -> String {
        format!("{}/upload/storage/v1/b/{}/o", self.endpoint, bucket)
    }

    fn object_target(request: &SessionRequest) -> Result<(&str, &str), TransportError> {
        match &request.target {
            UploadTarget::Object { bucket, key } => Ok((bucket.as_str(), key.as_str())),
            UploadTarget::Video(_) => Err(TransportError::InvalidRequest(
                "object storage cannot upload to a video target".into(),
            )),
        }
    }
}

#[async_trait]
impl ResumableUploadTransport for ObjectStorageTransport {
    fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    fn single_shot_threshold(&self) -> Option<u64> {
        Some(self.single_shot_threshold)
    }

    fn retry_scope(&self) -> RetryScope {
        RetryScope::PerChunk
    }

    async fn initiate(&self, request: &SessionRequest) -> Result<String, TransportError> {
        let (bucket, key) = Self::object_target(request)?;
        let response = self
            .client
            .post(self.upload_url(bucket))
            .query(&[("uploadType", "resumable"), ("name", key)])
            .bearer_auth(&request.bearer_token)
            .header(X_UPLOAD_CONTENT_TYPE, &request.content_type)
            .header(X_UPLOAD_CONTENT_LENGTH, request.total_bytes)
            .json(&serde_json::json!({ "name": key }))
            .send()
            .await?;
        session_location(response).await
    }

    async fn upload_chunk(
        &self,
        session: &UploadSession,
        chunk: ChunkDescriptor,
        data: Vec<u8>,
    ) -> Result<ChunkResponse, TransportError> {
        put_chunk(&self.client, session, chunk, data).await
    }

    async fn upload_single(
        &self,
        request: &SessionRequest,
        data: Vec<u8>,
    ) -> Result<ChunkResponse, TransportError> {
        let (bucket, key) = Self::object_target(request)?;
        info!(bucket, key, bytes = data.len(), "Single-shot object upload");
        let response = self
            .client
            .post(self.upload_url(bucket))
            .query(&[("uploadType", "media"), ("name", key)])
            .bearer_auth(&request.bearer_token)
            .header(CONTENT_TYPE, &request.content_type)
            .body(data)
            .send()
            .await?;
        completion_or_resume(response).await
    }
}
