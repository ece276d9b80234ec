//! HTTP implementations of [`ResumableUploadTransport`](crate::contract::ResumableUploadTransport).
//!
//! Both providers speak the same resumable dialect once a session exists: chunks are `PUT`
//! to the session URL with a `Content-Range` header, `308` means "keep going" and `200`/`201`
//! means the object is complete. They differ only in how the session is negotiated.

mod media;
mod object_storage;

pub use media::MediaApiTransport;
pub use object_storage::ObjectStorageTransport;

use std::time::Duration;

use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, LOCATION, RANGE};
use reqwest::{Client, Response};
use tracing::debug;

use crate::contract::ChunkResponse;
use crate::error::TransportError;
use crate::session::{ChunkDescriptor, UploadSession};

pub(crate) const X_UPLOAD_CONTENT_TYPE: &str = "X-Upload-Content-Type";
pub(crate) const X_UPLOAD_CONTENT_LENGTH: &str = "X-Upload-Content-Length";

/// Client shared by the transports. Redirects are disabled: a 308 is a protocol answer here.
pub(crate) fn build_client(timeout: Option<Duration>) -> Result<Client, TransportError> {
    let mut builder = Client::builder().redirect(reqwest::redirect::Policy::none());
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| TransportError::InvalidRequest(e.to_string()))
}

/// Session URL from a successful initiation response.
pub(crate) async fn session_location(response: Response) -> Result<String, TransportError> {
    if response.status().as_u16() != 200 {
        return Err(status_error(response).await);
    }
    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .ok_or_else(|| {
            TransportError::MalformedResponse(
                "session initiation answered 200 without a Location header".into(),
            )
        })
}

pub(crate) async fn put_chunk(
    client: &Client,
    session: &UploadSession,
    chunk: ChunkDescriptor,
    data: Vec<u8>,
) -> Result<ChunkResponse, TransportError> {
    let content_range = chunk.content_range(session.total_bytes);
    debug!(content_range = %content_range, "PUT chunk");
    let response = client
        .put(&session.session_url)
        .header(CONTENT_LENGTH, chunk.length)
        .header(CONTENT_RANGE, content_range)
        .body(data)
        .send()
        .await?;
    completion_or_resume(response).await
}

/// Interpret a chunk or single-shot response: 200/201 complete, 308 resume, anything else fails.
pub(crate) async fn completion_or_resume(
    response: Response,
) -> Result<ChunkResponse, TransportError> {
    match response.status().as_u16() {
        200 | 201 => Ok(ChunkResponse::Complete {
            body: response.text().await?,
        }),
        308 => {
            let persisted_through = match response.headers().get(RANGE) {
                None => None,
                Some(value) => {
                    let value = value.to_str().map_err(|_| {
                        TransportError::MalformedResponse("non-ASCII Range header".into())
                    })?;
                    Some(parse_range_header(value)?)
                }
            };
            Ok(ChunkResponse::Incomplete { persisted_through })
        }
        _ => Err(status_error(response).await),
    }
}

/// `bytes=0-N` → `N`.
pub(crate) fn parse_range_header(value: &str) -> Result<u64, TransportError> {
    let malformed = || TransportError::MalformedResponse(format!("unparseable Range header '{value}'"));
    let range = value.trim().strip_prefix("bytes=").ok_or_else(malformed)?;
    let (start, end) = range.split_once('-').ok_or_else(malformed)?;
    if start.trim() != "0" {
        return Err(malformed());
    }
    end.trim().parse::<u64>().map_err(|_| malformed())
}

/// Build a [`TransportError::Status`] carrying the server's error message.
pub(crate) async fn status_error(response: Response) -> TransportError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    TransportError::Status {
        status,
        message: error_message(&text),
    }
}

/// `error.message` from a JSON error body, else the raw body.
pub(crate) fn error_message(body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_owned)
        });
    match from_json {
        Some(message) => message,
        None if body.trim().is_empty() => "Unknown error".to_string(),
        None => body.to_string(),
    }
}
