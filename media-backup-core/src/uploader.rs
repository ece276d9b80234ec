//! # uploader: the chunk uploader
//!
//! [`ChunkUploader`] drives one file through a [`ResumableUploadTransport`]:
//!
//! 1. make sure the bearer credential is fresh (at most one refresh per file),
//! 2. send small sources in a single request when the transport allows it,
//! 3. otherwise negotiate a session and stream the source chunk by chunk,
//!    strictly in order, never more than one chunk in flight,
//! 4. consult the [`RetryPolicy`] on every failure and back off with full jitter.
//!
//! Every network call and every backoff sleep races the cancellation token, so a cancelled
//! transfer stops promptly with [`UploadError::CancellationRequested`] even when a request stalls.
//! Sources and sessions are owned by the caller or by this call's stack frame, so they are
//! released on every exit path.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::contract::{
    ByteSource, ChunkResponse, Credential, ProgressSink, ResumableUploadTransport,
    SessionRequest, UploadTarget,
};
use crate::credential::ensure_fresh;
use crate::error::{TransportError, UploadError};
use crate::progress::notify;
use crate::retry::{RetryPolicy, RetryScope, RetryState};
use crate::session::{initiate_session, UploadSession};

/// Result of a completed transfer.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub target_key: String,
    pub bytes_uploaded: u64,
    /// Requests the server accepted (chunks, or 1 for a single-shot upload).
    pub requests: u32,
    /// Retries performed over the whole transfer.
    pub retries: u32,
    /// Body of the final 200/201 response.
    pub response_body: String,
}

impl UploadOutcome {
    pub fn response_json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.response_body).ok()
    }
}

pub struct ChunkUploader<'a, T: ResumableUploadTransport + ?Sized> {
    transport: &'a T,
    policy: RetryPolicy,
    cancel: CancellationToken,
    progress: Option<&'a dyn ProgressSink>,
}

impl<'a, T: ResumableUploadTransport + ?Sized> ChunkUploader<'a, T> {
    pub fn new(transport: &'a T, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, sink: &'a dyn ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Upload `source` to `target`: credential check, session initiation, transfer.
    pub async fn upload<S, C>(
        &self,
        target: UploadTarget,
        content_type: &str,
        source: &mut S,
        credential: &mut C,
    ) -> Result<UploadOutcome, UploadError>
    where
        S: ByteSource + ?Sized,
        C: Credential + ?Sized,
    {
        if self.cancel.is_cancelled() {
            return Err(UploadError::CancellationRequested);
        }
        let bearer_token = ensure_fresh(credential).await?;
        let request = SessionRequest {
            target,
            content_type: content_type.to_string(),
            total_bytes: source.len(),
            bearer_token,
        };

        match self.transport.single_shot_threshold() {
            Some(threshold) if request.total_bytes < threshold => {
                return self.upload_single(&request, source).await;
            }
            _ => {}
        }
        if request.total_bytes == 0 {
            return Err(UploadError::EmptySource);
        }

        let mut session = self
            .unless_cancelled(initiate_session(self.transport, &request))
            .await??;
        self.transfer(&mut session, source).await
    }

    /// Stream the rest of `source` through an open session.
    pub async fn transfer<S>(
        &self,
        session: &mut UploadSession,
        source: &mut S,
    ) -> Result<UploadOutcome, UploadError>
    where
        S: ByteSource + ?Sized,
    {
        let chunk_size = self.transport.chunk_size();
        let scope = self.transport.retry_scope();
        let mut state = RetryState::default();
        let mut requests = 0u32;
        let mut retries = 0u32;

        info!(
            target = %session.target_key,
            total_bytes = session.total_bytes,
            chunk_size,
            ?scope,
            "Starting chunked transfer"
        );

        loop {
            if self.cancel.is_cancelled() {
                warn!(target = %session.target_key, uploaded = session.uploaded_bytes(), "Transfer cancelled");
                return Err(UploadError::CancellationRequested);
            }

            let Some(chunk) = session.next_chunk(chunk_size) else {
                let e = TransportError::MalformedResponse(
                    "every byte was acknowledged but no completion response arrived".into(),
                );
                error!(target = %session.target_key, error = %e, "Session ended without completion");
                return Err(UploadError::TerminalServerError(e));
            };

            let data = source.read_range(chunk.offset, chunk.length).await?;
            debug!(
                offset = chunk.offset,
                length = chunk.length,
                attempt = state.attempt,
                "Sending chunk"
            );

            let response = self
                .unless_cancelled(self.transport.upload_chunk(session, chunk, data))
                .await?;
            let result = match response {
                Ok(ChunkResponse::Complete { body }) => Ok(Some(body)),
                Ok(ChunkResponse::Incomplete { persisted_through }) => session
                    .acknowledge(&chunk, persisted_through)
                    .map(|_| None),
                Err(e) => Err(e),
            };

            match result {
                Ok(Some(body)) => {
                    session.mark_complete();
                    requests += 1;
                    notify(self.progress, session.uploaded_bytes(), session.total_bytes);
                    info!(
                        target = %session.target_key,
                        bytes = session.total_bytes,
                        requests,
                        retries,
                        "Upload complete"
                    );
                    return Ok(UploadOutcome {
                        target_key: session.target_key.clone(),
                        bytes_uploaded: session.total_bytes,
                        requests,
                        retries,
                        response_body: body,
                    });
                }
                Ok(None) => {
                    requests += 1;
                    debug!(
                        uploaded = session.uploaded_bytes(),
                        total = session.total_bytes,
                        percent = session.percent(),
                        "Chunk accepted"
                    );
                    notify(self.progress, session.uploaded_bytes(), session.total_bytes);
                    if scope == RetryScope::PerChunk {
                        state.reset();
                    }
                }
                Err(e) => {
                    self.retry_or_abort(&mut state, e).await?;
                    retries += 1;
                }
            }
        }
    }

    async fn upload_single<S>(
        &self,
        request: &SessionRequest,
        source: &mut S,
    ) -> Result<UploadOutcome, UploadError>
    where
        S: ByteSource + ?Sized,
    {
        let data = source.read_range(0, request.total_bytes).await?;
        let mut state = RetryState::default();
        let mut retries = 0u32;
        info!(
            target = %request.target.key(),
            total_bytes = request.total_bytes,
            "Source below single-shot threshold, uploading in one request"
        );

        loop {
            if self.cancel.is_cancelled() {
                return Err(UploadError::CancellationRequested);
            }
            match self
                .unless_cancelled(self.transport.upload_single(request, data.clone()))
                .await?
            {
                Ok(ChunkResponse::Complete { body }) => {
                    notify(self.progress, request.total_bytes, request.total_bytes);
                    info!(target = %request.target.key(), retries, "Upload complete");
                    return Ok(UploadOutcome {
                        target_key: request.target.key().to_string(),
                        bytes_uploaded: request.total_bytes,
                        requests: 1,
                        retries,
                        response_body: body,
                    });
                }
                Ok(ChunkResponse::Incomplete { .. }) => {
                    let e = TransportError::MalformedResponse(
                        "single-shot upload answered 308 Resume Incomplete".into(),
                    );
                    error!(target = %request.target.key(), error = %e, "Unexpected resume response");
                    return Err(UploadError::TerminalServerError(e));
                }
                Err(e) => {
                    self.retry_or_abort(&mut state, e).await?;
                    retries += 1;
                }
            }
        }
    }

    /// Await a network call unless the transfer is cancelled first. A cancelled call is dropped
    /// mid-flight, which also closes its connection.
    async fn unless_cancelled<F>(&self, call: F) -> Result<F::Output, UploadError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                warn!("Cancelled while waiting on the server");
                Err(UploadError::CancellationRequested)
            }
            output = call => Ok(output),
        }
    }

    /// Classify a failure. Returns `Ok(())` after backing off when another attempt is allowed.
    async fn retry_or_abort(
        &self,
        state: &mut RetryState,
        error: TransportError,
    ) -> Result<(), UploadError> {
        if !self.policy.is_retriable(&error) {
            error!(error = %error, "Non-retriable upload error, aborting");
            return Err(UploadError::TerminalServerError(error));
        }

        let attempt = state.attempt + 1;
        if !self.policy.should_retry(&error, attempt) {
            error!(
                retries = state.attempt,
                error = %error,
                "Max retries exceeded, aborting"
            );
            return Err(UploadError::MaxRetriesExceeded {
                retries: state.attempt,
                last_error: error,
            });
        }

        let delay = self.policy.backoff(attempt);
        warn!(
            attempt,
            max_retries = self.policy.max_retries(),
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Retriable upload error, backing off"
        );
        state.record(attempt, error);

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                warn!(attempt, "Cancelled during backoff");
                Err(UploadError::CancellationRequested)
            }
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}
