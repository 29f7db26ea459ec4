//! Adapter driver abstraction.
//!
//! `AdapterDriver` is the seam between the diagnostics engine and real
//! OBD-II hardware. One impl ships in-tree: [`MockAdapter`](crate::mock)
//! for tests and simulation. ELM327/Bluetooth drivers plug in behind the
//! same trait without touching the engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::AdapterResult;
use crate::pid::Pid;

/// Physical transport an adapter is reachable over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Bluetooth,
    Wifi,
    Usb,
}

/// An adapter found during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterCandidate {
    /// Advertised device name (e.g., "OBDLink MX+").
    pub name: String,
    pub transport: Transport,
}

/// An established adapter connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterLink {
    pub adapter_name: String,
    /// Negotiated OBD protocol (e.g., "ISO 15765-4 CAN 11/500").
    pub protocol: String,
}

/// Trouble codes read from the ECU in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeScan {
    /// Confirmed codes (Mode 0x03).
    pub stored: Vec<String>,
    /// Unconfirmed intermittent codes (Mode 0x07).
    pub pending: Vec<String>,
}

impl CodeScan {
    pub fn is_empty(&self) -> bool {
        self.stored.is_empty() && self.pending.is_empty()
    }
}

/// Trait for OBD-II adapter implementations.
///
/// All methods borrow `&self`; implementations handle their own interior
/// locking so the sampler, scan requests, and disconnects can share one
/// driver behind an `Arc`.
#[async_trait]
pub trait AdapterDriver: Send + Sync {
    /// Scan for reachable adapters.
    async fn discover(&self) -> AdapterResult<Vec<AdapterCandidate>>;

    /// Connect to a discovered adapter and negotiate an OBD protocol.
    async fn connect(&self, candidate: &AdapterCandidate) -> AdapterResult<AdapterLink>;

    /// Read one live PID, decoded to engineering units.
    async fn read_pid(&self, pid: Pid) -> AdapterResult<f64>;

    /// Read stored and pending trouble codes.
    async fn read_codes(&self) -> AdapterResult<CodeScan>;

    /// Read the freeze frame captured for a stored code, keyed by
    /// snapshot name (see [`Pid::key`]). An empty map means the ECU
    /// holds no frame for the code.
    async fn read_freeze_frame(&self, code: &str) -> AdapterResult<BTreeMap<String, f64>>;

    /// Clear all stored codes and freeze frames (Mode 0x04).
    async fn clear_codes(&self) -> AdapterResult<()>;

    /// Tear down the adapter connection.
    async fn disconnect(&self) -> AdapterResult<()>;

    /// Poll a set of PIDs, tolerating per-PID failures.
    ///
    /// A vehicle that does not support some PID (or drops one response)
    /// yields `None` for that slot; the sweep only fails as a whole when
    /// the link itself is gone.
    async fn read_sweep(&self, pids: &[Pid]) -> AdapterResult<Vec<(Pid, Option<f64>)>> {
        let mut readings = Vec::with_capacity(pids.len());
        for &pid in pids {
            match self.read_pid(pid).await {
                Ok(value) => readings.push((pid, Some(value))),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::debug!(pid = %pid, error = %e, "PID read failed, continuing sweep");
                    readings.push((pid, None));
                }
            }
        }
        Ok(readings)
    }
}
