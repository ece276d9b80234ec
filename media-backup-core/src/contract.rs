//! # contract: capability interfaces for resumable uploads
//!
//! This module defines the seams the upload pipeline is written against:
//!
//! - [`ResumableUploadTransport`]: one provider's wire protocol (object storage REST, media API).
//!   The chunk uploader and retry policy are written once against this trait; the concrete
//!   transport is chosen when the uploader is constructed.
//! - [`ByteSource`]: random-access reads over a local file of known length.
//! - [`Credential`]: the bearer token and its refresh capability.
//! - [`ProgressSink`]: receives `(uploaded, total)` after every accepted chunk.
//!
//! ## Mocking & Testing
//! - `ResumableUploadTransport` and `Credential` carry `mockall` automocks, exported under the
//!   `test-export-mocks` feature so integration tests can script server behaviour.
//!
//! ## Adding New Upload Destinations
//! - Implement [`ResumableUploadTransport`] and map every wire failure to a [`TransportError`]
//!   variant; the retry policy only ever sees those tags.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::{CredentialError, TransportError};
use crate::retry::RetryScope;
use crate::session::{ChunkDescriptor, UploadSession};

/// Visibility of a published video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    #[default]
    Private,
    Unlisted,
    Public,
}

impl Privacy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Privacy::Private => "private",
            Privacy::Unlisted => "unlisted",
            Privacy::Public => "public",
        }
    }
}

impl fmt::Display for Privacy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Privacy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "private" => Ok(Privacy::Private),
            "unlisted" => Ok(Privacy::Unlisted),
            "public" => Ok(Privacy::Public),
            other => Err(format!(
                "unknown privacy '{other}', expected private, unlisted or public"
            )),
        }
    }
}

/// Metadata bound to a media-API upload session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub privacy: Privacy,
    /// Provider category, "22" (People & Blogs) unless configured otherwise.
    pub category_id: String,
}

/// Where the uploaded bytes end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadTarget {
    /// An object in a storage bucket.
    Object { bucket: String, key: String },
    /// A new video created through the media API's insert call.
    Video(VideoMetadata),
}

impl UploadTarget {
    /// Human-readable key used in logs and reports.
    pub fn key(&self) -> &str {
        match self {
            UploadTarget::Object { key, .. } => key,
            UploadTarget::Video(meta) => &meta.title,
        }
    }
}

/// Everything a transport needs to negotiate a session or perform a single-shot upload.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub target: UploadTarget,
    pub content_type: String,
    pub total_bytes: u64,
    pub bearer_token: String,
}

/// Successful answer to a chunk (or single-shot) request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkResponse {
    /// 200/201: the remote end holds the complete object. Carries the response body.
    Complete { body: String },
    /// 308 Resume Incomplete. `persisted_through` is the last byte index reported by the
    /// server's `Range` header, when it sent one.
    Incomplete { persisted_through: Option<u64> },
}

/// One provider's resumable upload wire protocol.
///
/// Implementations never retry; they report each call's outcome as a tagged result and let
/// the chunk uploader consult the retry policy.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ResumableUploadTransport: Send + Sync {
    /// Upper bound on the length of one chunk, in bytes.
    fn chunk_size(&self) -> u64;

    /// Sources strictly smaller than this are sent in one request without a session.
    /// `None` means every upload goes through a resumable session.
    fn single_shot_threshold(&self) -> Option<u64>;

    /// Whether the retry budget is reset after each accepted chunk.
    fn retry_scope(&self) -> RetryScope;

    /// Negotiate a session and return its URL or provider handle.
    async fn initiate(&self, request: &SessionRequest) -> Result<String, TransportError>;

    /// Send one chunk of an open session.
    async fn upload_chunk(
        &self,
        session: &UploadSession,
        chunk: ChunkDescriptor,
        data: Vec<u8>,
    ) -> Result<ChunkResponse, TransportError>;

    /// Send a whole (small) source in a single request, without `Content-Range`.
    async fn upload_single(
        &self,
        request: &SessionRequest,
        data: Vec<u8>,
    ) -> Result<ChunkResponse, TransportError>;
}

/// Random-access reader over a source of known total length.
#[async_trait]
pub trait ByteSource: Send {
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read exactly `length` bytes starting at `offset`.
    async fn read_range(&mut self, offset: u64, length: u64) -> std::io::Result<Vec<u8>>;
}

/// A bearer credential that may expire and knows how to refresh itself.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Credential: Send + Sync {
    /// The current bearer token.
    fn token(&self) -> String;

    fn is_expired(&self) -> bool;

    async fn refresh(&mut self) -> Result<(), CredentialError>;
}

/// Receives transfer progress after every accepted chunk. Must return quickly.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, uploaded: u64, total: u64);
}

impl<F> ProgressSink for F
where
    F: Fn(u64, u64) + Send + Sync,
{
    fn on_progress(&self, uploaded: u64, total: u64) {
        self(uploaded, total)
    }
}
