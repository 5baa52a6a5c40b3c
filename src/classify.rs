//! # Fault classification.
//!
//! Pure functions deciding whether a failed call is worth repeating.
//!
//! ```text
//! OperationError
//! ├── transient (retried up to RetryPolicy::max_attempts)
//! │   ├── Transport    - premature EOF, timeout, reset/refused, broken pipe, dial failure
//! │   ├── Server       - 500..=599
//! │   └── RateLimited  - 429
//! └── permanent (propagated on first occurrence)
//!     ├── Client       - any other status (4xx, or a non-success status the caller rejected)
//!     └── Unclassified - no response and no recognizable transport cause
//! ```
//!
//! A captured status code takes precedence over the cause when deciding retryability:
//! a 4xx other than 429 is never retried, even if a transport cause is attached.

use std::error::Error as StdError;
use std::io;

use crate::error::OperationError;
use crate::transport::TransportError;

/// Taxonomy of failed calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    Transport,
    Server,
    RateLimited,
    Client,
    Unclassified,
}

impl FaultClass {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            FaultClass::Transport => "transport_fault",
            FaultClass::Server => "server_fault",
            FaultClass::RateLimited => "rate_limited",
            FaultClass::Client => "client_fault",
            FaultClass::Unclassified => "unclassified",
        }
    }

    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FaultClass::Transport | FaultClass::Server | FaultClass::RateLimited
        )
    }
}

const TOO_MANY_REQUESTS: u16 = 429;

#[inline]
fn is_transient_status(status: u16) -> bool {
    status == TOO_MANY_REQUESTS || (500..=599).contains(&status)
}

/// Whether the failure is expected to resolve without caller intervention.
///
/// True for a 5xx or 429 status, or when the cause chain contains a transport fault.
/// An error with neither response nor cause is not transient.
pub fn is_transient(err: &OperationError) -> bool {
    if err.status().is_some_and(is_transient_status) {
        return true;
    }
    err.cause().is_some_and(|cause| is_transient_cause(cause))
}

/// Whether a retry executor may repeat the call.
///
/// A 4xx status is retryable only when it is 429; everything else defers to [`is_transient`].
pub fn is_retryable(err: &OperationError) -> bool {
    match err.status() {
        Some(status) if (400..500).contains(&status) => status == TOO_MANY_REQUESTS,
        _ => is_transient(err),
    }
}

/// Classifies a failed call into the [`FaultClass`] taxonomy.
pub fn fault_class(err: &OperationError) -> FaultClass {
    match err.status() {
        Some(TOO_MANY_REQUESTS) => FaultClass::RateLimited,
        Some(status) if (500..=599).contains(&status) => FaultClass::Server,
        Some(_) => FaultClass::Client,
        None => match err.cause() {
            Some(cause) if is_transient_cause(cause) => FaultClass::Transport,
            _ => FaultClass::Unclassified,
        },
    }
}

/// Walks the cause chain looking for a transport-level fault.
pub fn is_transient_cause(cause: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(cause);
    while let Some(err) = current {
        if is_transport_fault(err) {
            return true;
        }
        current = err.source();
    }
    false
}

fn is_transport_fault(err: &(dyn StdError + 'static)) -> bool {
    if err.is::<TransportError>() || err.is::<tokio::time::error::Elapsed>() {
        return true;
    }
    if let Some(io_err) = err.downcast_ref::<io::Error>() {
        if is_transient_io_kind(io_err.kind()) {
            return true;
        }
        // io::Error::source() skips the wrapped error itself.
        if let Some(inner) = io_err.get_ref() {
            return is_transient_cause(inner);
        }
    }
    false
}

fn is_transient_io_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Action, ResourceKind};
    use crate::transport::{BoxError, TransportResponse};

    fn with_status(status: u16) -> OperationError {
        OperationError::new(
            Action::Read,
            ResourceKind::Application,
            "app-1",
            Some(TransportResponse::empty(status)),
            None,
        )
    }

    fn with_cause(cause: BoxError) -> OperationError {
        OperationError::new(
            Action::Read,
            ResourceKind::Application,
            "app-1",
            None,
            Some(cause),
        )
    }

    #[test]
    fn server_errors_and_rate_limit_are_transient() {
        for status in (500..=599).chain([429]) {
            let err = with_status(status);
            assert!(is_transient(&err), "status {status} should be transient");
            assert!(is_retryable(&err), "status {status} should be retryable");
        }
    }

    #[test]
    fn other_client_errors_are_permanent() {
        for status in (400..=499).filter(|s| *s != 429) {
            let err = with_status(status);
            assert!(!is_transient(&err), "status {status} should not be transient");
            assert!(!is_retryable(&err), "status {status} should not be retryable");
            assert_eq!(err.fault_class(), FaultClass::Client);
        }
    }

    #[test]
    fn transport_causes_are_transient() {
        let causes: Vec<BoxError> = vec![
            Box::new(TransportError::PrematureEof),
            Box::new(io::Error::from(io::ErrorKind::UnexpectedEof)),
            Box::new(TransportError::ConnectionReset),
            Box::new(io::Error::from(io::ErrorKind::ConnectionReset)),
            Box::new(io::Error::from(io::ErrorKind::ConnectionRefused)),
            Box::new(io::Error::from(io::ErrorKind::BrokenPipe)),
            Box::new(TransportError::Dial {
                reason: "lookup api.example.com: no such host".into(),
            }),
            Box::new(TransportError::Timeout),
            Box::new(io::Error::from(io::ErrorKind::TimedOut)),
        ];
        for cause in causes {
            let label = cause.to_string();
            let err = with_cause(cause);
            assert!(is_transient(&err), "{label} should be transient");
            assert!(is_retryable(&err), "{label} should be retryable");
            assert_eq!(err.fault_class(), FaultClass::Transport);
        }
    }

    #[test]
    fn wrapped_transport_cause_is_found() {
        let wrapped = io::Error::new(io::ErrorKind::Other, TransportError::BrokenPipe);
        assert!(is_transient(&with_cause(Box::new(wrapped))));
    }

    #[test]
    fn elapsed_timer_is_transient() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .expect("runtime");
        let elapsed = rt.block_on(async {
            tokio::time::timeout(std::time::Duration::from_millis(1), std::future::pending::<()>())
                .await
                .expect_err("timer should elapse")
        });
        assert!(is_transient(&with_cause(Box::new(elapsed))));
    }

    #[test]
    fn unrelated_cause_is_not_transient() {
        let err = with_cause("invalid json".into());
        assert!(!is_transient(&err));
        assert!(!is_retryable(&err));
        assert_eq!(err.fault_class(), FaultClass::Unclassified);
    }

    #[test]
    fn nothing_captured_is_unclassified() {
        let err = OperationError::new(
            Action::Read,
            ResourceKind::Application,
            "app-1",
            None,
            None,
        );
        assert!(!is_transient(&err));
        assert!(!is_retryable(&err));
        assert_eq!(err.fault_class(), FaultClass::Unclassified);
    }

    #[test]
    fn client_status_wins_over_transport_cause() {
        let err = OperationError::new(
            Action::Read,
            ResourceKind::Application,
            "app-1",
            Some(TransportResponse::empty(404)),
            Some(Box::new(TransportError::Timeout)),
        );
        assert!(is_transient(&err));
        assert!(!is_retryable(&err));
    }
}
