//! Publish a local video through the media API.

use std::path::Path;

use tracing::{error, info};

use crate::contract::{Credential, ResumableUploadTransport, UploadTarget, VideoMetadata};
use crate::error::{TransportError, UploadError};
use crate::source::{content_type_for, FileSource};
use crate::transport::MediaApiTransport;
use crate::uploader::ChunkUploader;

#[derive(Debug, Clone)]
pub struct PublishedVideo {
    pub video_id: String,
    pub url: String,
    pub bytes: u64,
}

pub async fn publish_video<T, C>(
    uploader: &ChunkUploader<'_, T>,
    path: &Path,
    metadata: VideoMetadata,
    credential: &mut C,
) -> Result<PublishedVideo, UploadError>
where
    T: ResumableUploadTransport + ?Sized,
    C: Credential + ?Sized,
{
    info!(path = %path.display(), title = %metadata.title, privacy = %metadata.privacy, "Publishing video");
    let mut source = FileSource::open(path).await?;
    let outcome = uploader
        .upload(
            UploadTarget::Video(metadata),
            content_type_for(path),
            &mut source,
            credential,
        )
        .await?;

    let video_id = outcome
        .response_json()
        .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(str::to_owned))
        .ok_or_else(|| {
            error!(body = %outcome.response_body, "Final response carried no video id");
            UploadError::TerminalServerError(TransportError::MalformedResponse(
                "final response carried no video id".into(),
            ))
        })?;

    let url = MediaApiTransport::watch_url(&video_id);
    info!(video_id = %video_id, url = %url, "Video published");
    Ok(PublishedVideo {
        video_id,
        url,
        bytes: outcome.bytes_uploaded,
    })
}
