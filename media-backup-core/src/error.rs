//! Error taxonomy for the upload pipeline.
//!
//! Every network call returns a [`TransportError`]: a tagged description of what went
//! wrong on the wire. The retry policy inspects that tag to decide whether the failure
//! is transient. Anything that ends a transfer surfaces to callers as an [`UploadError`].

use thiserror::Error;

/// Outcome of a single failed network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection refused or reset, malformed status line, or any other transport I/O failure.
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    /// The response body was cut short or could not be decoded.
    #[error("incomplete read: {0}")]
    IncompleteRead(String),

    /// The server answered with a status the protocol does not accept at this step.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// A 308 acknowledged none of the bytes of the chunk just sent.
    #[error("server acknowledged no bytes of the chunk at offset {offset}")]
    NoProgress { offset: u64 },

    /// The response violated the wire contract (missing `Location`, bad `Range`, ...).
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The request could not be built or does not fit this transport.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_builder() {
            TransportError::InvalidRequest(e.to_string())
        } else if e.is_body() || e.is_decode() {
            TransportError::IncompleteRead(e.to_string())
        } else {
            TransportError::Connection(e.to_string())
        }
    }
}

/// Failure to obtain or refresh a bearer credential.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential has no refresh token")]
    NoRefreshToken,

    #[error("token endpoint unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token endpoint rejected refresh (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("token endpoint returned an unusable token: {0}")]
    MalformedToken(String),
}

/// Terminal outcome of a failed file transfer.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Session negotiation was refused. Not retried at this layer.
    #[error("failed to initiate upload session: {0}")]
    InitiationFailure(TransportError),

    /// A non-retriable status or malformed response aborted the transfer.
    #[error("upload aborted by server: {0}")]
    TerminalServerError(TransportError),

    #[error("upload cancelled by user")]
    CancellationRequested,

    #[error("max retries exceeded after {retries} retries, last error: {last_error}")]
    MaxRetriesExceeded {
        retries: u32,
        last_error: TransportError,
    },

    #[error("refusing to start a resumable session for an empty source")]
    EmptySource,

    #[error("failed to read local source: {0}")]
    Source(#[from] std::io::Error),

    #[error("bearer credential unavailable: {0}")]
    Credential(#[from] CredentialError),
}

impl UploadError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, UploadError::CancellationRequested)
    }
}

/// Invalid upload configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
