//! # Minimal transport shapes shared with collaborators.
//!
//! - [`TransportResponse`] a status code plus a body stream that can be read **once**;
//! - [`TransportError`] transport-level causes a collaborator can report;
//! - [`RemoteFailure`] what a failed remote call hands back: response and/or cause.
//!
//! Ownership enforces the once-readable body: draining consumes the response, and the
//! only place that drains a failure's body is [`OperationError::new`](crate::OperationError::new).

use std::error::Error as StdError;
use std::fmt;
use std::io::{Cursor, Read};

use thiserror::Error;

/// Boxed, thread-safe underlying cause of a failed call.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Response of a remote call: numeric status and a once-readable body.
pub struct TransportResponse {
    status: u16,
    body: Option<Box<dyn Read + Send>>,
}

impl TransportResponse {
    /// Response whose body is read lazily from `body`.
    pub fn new(status: u16, body: impl Read + Send + 'static) -> Self {
        Self {
            status,
            body: Some(Box::new(body)),
        }
    }

    /// Response with an in-memory body.
    pub fn with_bytes(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self::new(status, Cursor::new(body.into()))
    }

    /// Response without a body.
    pub fn empty(status: u16) -> Self {
        Self { status, body: None }
    }

    #[inline]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Any status below 300.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.status < 300
    }

    /// Consumes the response, reading the whole body.
    ///
    /// A body that fails midway keeps the bytes read so far.
    pub(crate) fn drain(self) -> (u16, Option<Vec<u8>>) {
        let body = self.body.map(|mut reader| {
            let mut buf = Vec::new();
            if let Err(err) = reader.read_to_end(&mut buf) {
                tracing::debug!(err = %err, read = buf.len(), "response body truncated");
            }
            buf
        });
        (self.status, body)
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Transport-level causes; every variant is transient.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The stream ended before the full response arrived.
    #[error("unexpected end of stream")]
    PrematureEof,

    /// The call did not complete in time.
    #[error("operation timed out")]
    Timeout,

    #[error("connection reset by peer")]
    ConnectionReset,

    #[error("connection refused")]
    ConnectionRefused,

    #[error("broken pipe")]
    BrokenPipe,

    /// Generic dial/operation failure (DNS resolution, TLS handshake, ...).
    #[error("transport operation failed: {reason}")]
    Dial { reason: String },
}

impl TransportError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::PrematureEof => "premature_eof",
            TransportError::Timeout => "timeout",
            TransportError::ConnectionReset => "connection_reset",
            TransportError::ConnectionRefused => "connection_refused",
            TransportError::BrokenPipe => "broken_pipe",
            TransportError::Dial { .. } => "dial",
        }
    }
}

/// Raw outcome of a failed remote call, before it is attributed to an action.
#[derive(Debug, Default)]
pub struct RemoteFailure {
    pub response: Option<TransportResponse>,
    pub cause: Option<BoxError>,
}

impl RemoteFailure {
    pub fn new(response: Option<TransportResponse>, cause: Option<BoxError>) -> Self {
        Self { response, cause }
    }

    /// The remote answered with a non-success response.
    pub fn response(response: TransportResponse) -> Self {
        Self {
            response: Some(response),
            cause: None,
        }
    }

    /// The call failed without a usable response.
    pub fn cause(cause: impl Into<BoxError>) -> Self {
        Self {
            response: None,
            cause: Some(cause.into()),
        }
    }
}

impl From<TransportError> for RemoteFailure {
    fn from(err: TransportError) -> Self {
        RemoteFailure::cause(err)
    }
}

impl From<std::io::Error> for RemoteFailure {
    fn from(err: std::io::Error) -> Self {
        RemoteFailure::cause(err)
    }
}
