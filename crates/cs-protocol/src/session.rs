use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Adapter session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Initial and terminal state; no adapter attached.
    Disconnected,
    /// Discovery in progress.
    Scanning,
    /// Candidate found, handshake in progress.
    Connecting,
    /// Handshake succeeded; telemetry sampling active.
    Connected,
    /// Discovery/handshake/mid-session failure. Cleared by a fresh connect.
    Error,
}

impl SessionStatus {
    /// Lowercase wire name, for logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Scanning => "scanning",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Error => "error",
        }
    }
}

/// One adapter connection attempt. Ephemeral; reset on disconnect or
/// fatal error. Owned exclusively by the session controller; everything
/// else sees read-only snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub status: SessionStatus,
    /// Adapter identity reported by the handshake (e.g., "ELM327 v1.5").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapter_name: Option<String>,
    /// OBD protocol negotiated by the adapter (e.g., "ISO 15765-4 CAN").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Failure message when status is `Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
}

impl Session {
    /// A fresh session in the initial state.
    pub fn disconnected() -> Self {
        Self {
            status: SessionStatus::Disconnected,
            adapter_name: None,
            protocol: None,
            error: None,
            connected_at: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == SessionStatus::Connected
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::disconnected()
    }
}
