//! Upload session state and the session initiator.
//!
//! An [`UploadSession`] anchors one file transfer to one server-side session. It is created
//! by [`initiate_session`], advanced only by the chunk uploader once the remote end has
//! acknowledged a byte range, and dropped when the transfer ends.

use tracing::{error, info};

use crate::contract::{ResumableUploadTransport, SessionRequest};
use crate::error::{TransportError, UploadError};

/// One contiguous byte range of the source, sent as one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub offset: u64,
    pub length: u64,
}

impl ChunkDescriptor {
    /// Index of the last byte in the chunk (inclusive).
    pub fn last_byte(&self) -> u64 {
        self.offset + self.length - 1
    }

    /// Offset one past the last byte.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// `Content-Range` header value for this chunk within a source of `total` bytes.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.offset, self.last_byte(), total)
    }
}

#[derive(Debug, Clone)]
pub struct UploadSession {
    /// Session URL (object storage) or provider handle (media API).
    pub session_url: String,
    pub total_bytes: u64,
    pub content_type: String,
    pub target_key: String,
    uploaded_bytes: u64,
}

impl UploadSession {
    pub fn new(
        session_url: impl Into<String>,
        total_bytes: u64,
        content_type: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        Self {
            session_url: session_url.into(),
            total_bytes,
            content_type: content_type.into(),
            target_key: target_key.into(),
            uploaded_bytes: 0,
        }
    }

    /// Bytes the remote end has acknowledged so far.
    pub fn uploaded_bytes(&self) -> u64 {
        self.uploaded_bytes
    }

    pub fn remaining_bytes(&self) -> u64 {
        self.total_bytes - self.uploaded_bytes
    }

    pub fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        ((self.uploaded_bytes as u128 * 100) / self.total_bytes as u128) as u8
    }

    /// The next chunk to send, or `None` once every byte has been acknowledged.
    pub fn next_chunk(&self, chunk_size: u64) -> Option<ChunkDescriptor> {
        let remaining = self.remaining_bytes();
        if remaining == 0 || chunk_size == 0 {
            return None;
        }
        Some(ChunkDescriptor {
            offset: self.uploaded_bytes,
            length: remaining.min(chunk_size),
        })
    }

    /// Record a 308 for `chunk`.
    ///
    /// Without a `Range` header the whole chunk counts as received. With one, the offset is
    /// reconciled to the server's resume point, which must lie inside the chunk just sent.
    pub fn acknowledge(
        &mut self,
        chunk: &ChunkDescriptor,
        persisted_through: Option<u64>,
    ) -> Result<(), TransportError> {
        debug_assert_eq!(chunk.offset, self.uploaded_bytes);
        let resume_at = match persisted_through {
            None => chunk.end(),
            Some(last) => {
                let resume_at = last.saturating_add(1);
                if resume_at > chunk.end() || resume_at < chunk.offset {
                    return Err(TransportError::MalformedResponse(format!(
                        "Range reports bytes 0-{last} persisted, outside chunk {}",
                        chunk.content_range(self.total_bytes)
                    )));
                }
                if resume_at == chunk.offset {
                    return Err(TransportError::NoProgress {
                        offset: chunk.offset,
                    });
                }
                resume_at
            }
        };
        self.uploaded_bytes = resume_at;
        Ok(())
    }

    /// The server reported the object complete.
    pub fn mark_complete(&mut self) {
        self.uploaded_bytes = self.total_bytes;
    }
}

/// Negotiate an upload session through `transport`.
///
/// Any failure is terminal for this attempt: the caller may retry initiation as a whole.
pub async fn initiate_session<T>(
    transport: &T,
    request: &SessionRequest,
) -> Result<UploadSession, UploadError>
where
    T: ResumableUploadTransport + ?Sized,
{
    let target_key = request.target.key().to_string();
    info!(
        target = %target_key,
        total_bytes = request.total_bytes,
        content_type = %request.content_type,
        "Initiating resumable upload session"
    );
    match transport.initiate(request).await {
        Ok(session_url) => {
            info!(target = %target_key, "Upload session established");
            Ok(UploadSession::new(
                session_url,
                request.total_bytes,
                request.content_type.clone(),
                target_key,
            ))
        }
        Err(e) => {
            error!(target = %target_key, error = %e, "Failed to initiate upload session");
            Err(UploadError::InitiationFailure(e))
        }
    }
}
