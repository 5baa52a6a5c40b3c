//! Error types used by the reconciler and its building blocks.
//!
//! This module defines:
//!
//! - [`OperationError`]: one failed remote call, attributed to an action, kind and id.
//! - [`ReconcileError`]: what [`converge`](crate::StateReconciler::converge) and
//!   [`Waiter::wait`](crate::Waiter::wait) return.
//! - [`ConfigError`]: configuration loading and validation failures.
//!
//! Each type provides an `as_label` helper for logs/events.

use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::classify::{self, FaultClass};
use crate::resource::{Action, ResourceKind};
use crate::transport::{BoxError, RemoteFailure, TransportResponse};

/// Status code and body captured from the response of a failed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub body: Option<Vec<u8>>,
}

/// Structured error payload the remote API returns on failure.
#[derive(Deserialize)]
struct ErrorPayload {
    message: Option<String>,
}

/// # A failed remote call.
///
/// Created once, where the call fails; never mutated afterwards. If the failure carried a
/// response body, the body is drained into an owned buffer **during construction**, so
/// [`detail`](OperationError::detail) can be called any number of times with identical results.
///
/// # Example
/// ```
/// use convergent::{Action, OperationError, ResourceKind, TransportResponse};
///
/// let resp = TransportResponse::with_bytes(400, r#"{"message":"Invalid request"}"#);
/// let err = OperationError::new(Action::Deploy, ResourceKind::Application, "app-1", Some(resp), None);
///
/// assert_eq!(err.detail(), err.detail());
/// assert!(err.detail().contains("Invalid request"));
/// assert_eq!(err.summary(), "failed to deploy application");
/// ```
#[derive(Debug)]
pub struct OperationError {
    action: Action,
    kind: ResourceKind,
    resource_id: String,
    response: Option<ResponseSnapshot>,
    cause: Option<BoxError>,
}

impl OperationError {
    /// Builds the error, draining `response`'s body (if any) into an owned buffer.
    pub fn new(
        action: Action,
        kind: ResourceKind,
        resource_id: impl Into<String>,
        response: Option<TransportResponse>,
        cause: Option<BoxError>,
    ) -> Self {
        let response = response.map(|resp| {
            let (status, body) = resp.drain();
            ResponseSnapshot { status, body }
        });
        Self {
            action,
            kind,
            resource_id: resource_id.into(),
            response,
            cause,
        }
    }

    /// Attributes a collaborator's [`RemoteFailure`] to `action` on `kind`/`resource_id`.
    pub fn from_failure(
        action: Action,
        kind: ResourceKind,
        resource_id: impl Into<String>,
        failure: RemoteFailure,
    ) -> Self {
        Self::new(action, kind, resource_id, failure.response, failure.cause)
    }

    #[inline]
    pub fn action(&self) -> Action {
        self.action
    }

    #[inline]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    #[inline]
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// Captured status code, if the remote answered.
    #[inline]
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }

    #[inline]
    pub fn response(&self) -> Option<&ResponseSnapshot> {
        self.response.as_ref()
    }

    /// Underlying cause reported by the collaborator.
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// `message` field of the buffered body, when it parses as a structured payload.
    pub fn decoded_message(&self) -> Option<String> {
        let body = self.response.as_ref()?.body.as_deref()?;
        serde_json::from_slice::<ErrorPayload>(body)
            .ok()?
            .message
            .filter(|m| !m.trim().is_empty())
    }

    /// Short action + kind description, e.g. `failed to deploy application`.
    pub fn summary(&self) -> String {
        format!("failed to {} {}", self.action, self.kind)
    }

    /// Cause (if any) plus the decoded message, or the bare status code.
    pub fn detail(&self) -> String {
        let mut parts = Vec::with_capacity(2);
        if let Some(cause) = &self.cause {
            parts.push(cause.to_string());
        }
        match (self.decoded_message(), self.status()) {
            (Some(message), _) => parts.push(message),
            (None, Some(status)) => parts.push(format!("status code {status}")),
            (None, None) => {}
        }
        if parts.is_empty() {
            return "no response and no cause".to_string();
        }
        parts.join(": ")
    }

    /// Fault class per the classification taxonomy.
    #[inline]
    pub fn fault_class(&self) -> FaultClass {
        classify::fault_class(self)
    }

    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        self.fault_class().as_label()
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?}: {}",
            self.summary(),
            self.resource_id,
            self.detail()
        )
    }
}

impl StdError for OperationError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

/// # Errors returned by convergence and waiting.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// A remote call failed (after retries, for status reads).
    #[error(transparent)]
    Operation(#[from] OperationError),

    /// The caller's cancellation token fired.
    #[error("reconciliation cancelled")]
    Canceled,

    /// A policy handed to the reconciler is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ReconcileError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            ReconcileError::Operation(err) => err.as_label(),
            ReconcileError::Canceled => "canceled",
            ReconcileError::Config(_) => "config",
        }
    }

    /// Whether re-invoking the failed step could succeed without caller intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcileError::Operation(err) => classify::is_retryable(err),
            ReconcileError::Canceled | ReconcileError::Config(_) => false,
        }
    }

    /// The failed call, if this error came from one.
    pub fn operation(&self) -> Option<&OperationError> {
        match self {
            ReconcileError::Operation(err) => Some(err),
            _ => None,
        }
    }
}

/// # Errors produced while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<ConfigError> for ReconcileError {
    fn from(err: ConfigError) -> Self {
        ReconcileError::Config(err.to_string())
    }
}
