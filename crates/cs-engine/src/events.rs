//! Engine event feed for UI consumption.
//!
//! Every state-changing operation publishes an event; emission is
//! best-effort (no subscriber, no error). Subscribers added mid-stream
//! see only later events.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use cs_protocol::analysis::Urgency;
use cs_protocol::health::HealthTrend;
use cs_protocol::session::SessionStatus;
use cs_protocol::vehicle::VehicleId;

/// Events pushed to engine subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The adapter session moved to a new state.
    SessionChanged {
        status: SessionStatus,
        at: DateTime<Utc>,
    },

    /// A code scan was ingested for a vehicle.
    ScanIngested {
        vehicle_id: VehicleId,
        new_codes: Vec<String>,
        at: DateTime<Utc>,
    },

    /// A code was closed out (resolved or marked false positive).
    CodeResolved {
        vehicle_id: VehicleId,
        code: String,
        at: DateTime<Utc>,
    },

    /// An analysis finished for a code.
    AnalysisReady {
        vehicle_id: VehicleId,
        code: String,
        cache_hit: bool,
        at: DateTime<Utc>,
    },

    /// A health score was computed.
    HealthComputed {
        vehicle_id: VehicleId,
        overall: f64,
        trend: HealthTrend,
        at: DateTime<Utc>,
    },

    /// A symptom check completed.
    SymptomChecked {
        vehicle_id: VehicleId,
        urgency: Urgency,
        at: DateTime<Utc>,
    },
}

/// Cloneable handle around the event broadcast channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Publish an event; silently dropped when nobody is listening.
    pub fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
