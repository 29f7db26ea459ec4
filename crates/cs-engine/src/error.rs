//! Engine error types.
//!
//! Only the session controller converts adapter failures into a state
//! transition; every other component fails the request and leaves state
//! untouched.

use cs_adapter::AdapterError;
use thiserror::Error;

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Discovery or connect failed; retryable. The session lands in `error`.
    #[error("adapter unavailable: {0}")]
    AdapterUnavailable(String),

    /// Mid-session I/O failure. Forces the session into `error`.
    #[error("adapter disconnected: {0}")]
    AdapterDisconnected(String),

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// Oracle failed or returned a malformed result; retryable, never cached.
    #[error("analysis unavailable: {0}")]
    AnalysisUnavailable(String),

    #[error("validation failed: {0}")]
    Validation(String),

    /// `connect()` while a session attempt is already underway.
    #[error("session busy: {0}")]
    SessionBusy(String),
}

impl From<AdapterError> for EngineError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Unavailable(msg) => EngineError::AdapterUnavailable(msg),
            AdapterError::Disconnected(msg) => EngineError::AdapterDisconnected(msg),
            other => EngineError::AdapterUnavailable(other.to_string()),
        }
    }
}

/// Convenience alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_error_mapping() {
        let err: EngineError = AdapterError::Unavailable("no adapters in range".into()).into();
        assert!(matches!(err, EngineError::AdapterUnavailable(_)));

        let err: EngineError = AdapterError::Disconnected("bluetooth drop".into()).into();
        assert!(matches!(err, EngineError::AdapterDisconnected(_)));

        let err: EngineError = AdapterError::Timeout { timeout_ms: 500 }.into();
        assert!(matches!(err, EngineError::AdapterUnavailable(_)));
    }

    #[test]
    fn not_found_display() {
        let err = EngineError::NotFound {
            what: "diagnostic code",
            id: "0193".into(),
        };
        assert_eq!(err.to_string(), "diagnostic code not found: 0193");
    }
}
