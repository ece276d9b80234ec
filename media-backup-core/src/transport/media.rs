//! Media API provider: resumable video insert bound to snippet and status metadata.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{build_client, put_chunk, session_location, X_UPLOAD_CONTENT_LENGTH, X_UPLOAD_CONTENT_TYPE};
use crate::config::MediaConfig;
use crate::contract::{
    ChunkResponse, ResumableUploadTransport, SessionRequest, UploadTarget, VideoMetadata,
};
use crate::error::TransportError;
use crate::retry::RetryScope;
use crate::session::{ChunkDescriptor, UploadSession};

/// Media API video insert. The session handle is bound to the video metadata at creation;
/// one retry budget covers the whole upload.
pub struct MediaApiTransport {
    client: Client,
    endpoint: String,
    chunk_size: u64,
}

impl MediaApiTransport {
    pub fn new(config: &MediaConfig, timeout: Option<Duration>) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            chunk_size: config.chunk_size,
        })
    }

    pub fn watch_url(video_id: &str) -> String {
        format!("https://www.youtube.com/watch?v={video_id}")
    }

    fn insert_body(meta: &VideoMetadata) -> serde_json::Value {
        serde_json::json!({
            "snippet": {
                "title": meta.title,
                "description": meta.description,
                "tags": meta.tags,
                "categoryId": meta.category_id,
            },
            "status": {
                "privacyStatus": meta.privacy.as_str(),
                "selfDeclaredMadeForKids": false,
            },
        })
    }
}

#[async_trait]
impl ResumableUploadTransport for MediaApiTransport {
    fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    fn single_shot_threshold(&self) -> Option<u64> {
        None
    }

    fn retry_scope(&self) -> RetryScope {
        RetryScope::PerOperation
    }

    async fn initiate(&self, request: &SessionRequest) -> Result<String, TransportError> {
        let UploadTarget::Video(meta) = &request.target else {
            return Err(TransportError::InvalidRequest(
                "media API can only insert video targets".into(),
            ));
        };
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(&request.bearer_token)
            .header(X_UPLOAD_CONTENT_TYPE, &request.content_type)
            .header(X_UPLOAD_CONTENT_LENGTH, request.total_bytes)
            .json(&Self::insert_body(meta))
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
        _request: &SessionRequest,
        _data: Vec<u8>,
    ) -> Result<ChunkResponse, TransportError> {
        Err(TransportError::InvalidRequest(
            "media API uploads always go through a resumable session".into(),
        ))
    }
}
