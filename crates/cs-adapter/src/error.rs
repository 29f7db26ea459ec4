//! Adapter error types.

use thiserror::Error;

/// Errors that can occur while talking to an OBD-II adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("no adapter available: {0}")]
    Unavailable(String),

    #[error("adapter link lost: {0}")]
    Disconnected(String),

    #[error("PID 0x{pid:02X} not supported by this vehicle")]
    UnsupportedPid { pid: u8 },

    #[error("response decode error: {0}")]
    Decode(String),

    #[error("response timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("OBD-II protocol error: {0}")]
    Protocol(String),
}

impl AdapterError {
    /// Whether the error means the link itself is gone (as opposed to a
    /// single request failing on an otherwise healthy link).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AdapterError::Unavailable(_) | AdapterError::Disconnected(_)
        )
    }
}

/// Convenience alias for adapter results.
pub type AdapterResult<T> = Result<T, AdapterError>;
