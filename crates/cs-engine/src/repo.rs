//! External collaborator traits: vehicle profiles and maintenance data.
//!
//! The engine never owns vehicle records or service history; both arrive
//! through these seams. The `Static*` implementations back tests and the
//! simulated-drive example.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use cs_protocol::vehicle::{VehicleId, VehicleProfile};

use crate::error::{EngineError, EngineResult};

/// Read-only access to vehicle profiles.
#[async_trait]
pub trait VehicleRepository: Send + Sync {
    async fn vehicle(&self, vehicle_id: VehicleId) -> EngineResult<VehicleProfile>;
}

/// Read-only access to maintenance compliance (0–100, share of scheduled
/// service actually performed).
#[async_trait]
pub trait ComplianceSource: Send + Sync {
    async fn compliance_pct(&self, vehicle_id: VehicleId) -> EngineResult<f64>;
}

/// In-memory vehicle repository.
#[derive(Default)]
pub struct StaticVehicleRepository {
    vehicles: RwLock<HashMap<VehicleId, VehicleProfile>>,
}

impl StaticVehicleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, vehicle_id: VehicleId, profile: VehicleProfile) {
        self.vehicles.write().unwrap().insert(vehicle_id, profile);
    }
}

#[async_trait]
impl VehicleRepository for StaticVehicleRepository {
    async fn vehicle(&self, vehicle_id: VehicleId) -> EngineResult<VehicleProfile> {
        self.vehicles
            .read()
            .unwrap()
            .get(&vehicle_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound {
                what: "vehicle",
                id: vehicle_id.to_string(),
            })
    }
}

/// In-memory compliance source with a default and per-vehicle overrides.
pub struct StaticComplianceSource {
    default_pct: f64,
    overrides: RwLock<HashMap<VehicleId, f64>>,
}

impl StaticComplianceSource {
    pub fn new(default_pct: f64) -> Self {
        Self {
            default_pct,
            overrides: RwLock::new(HashMap::new()),
        }
    }

    pub fn set(&self, vehicle_id: VehicleId, pct: f64) {
        self.overrides.write().unwrap().insert(vehicle_id, pct);
    }
}

#[async_trait]
impl ComplianceSource for StaticComplianceSource {
    async fn compliance_pct(&self, vehicle_id: VehicleId) -> EngineResult<f64> {
        let pct = self
            .overrides
            .read()
            .unwrap()
            .get(&vehicle_id)
            .copied()
            .unwrap_or(self.default_pct);
        Ok(pct.clamp(0.0, 100.0))
    }
}
