use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dtc::CodeCategory;
use crate::vehicle::VehicleId;

/// The eight vehicle systems scored independently by the health engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleSystem {
    Engine,
    Transmission,
    Brakes,
    Suspension,
    Electrical,
    Cooling,
    Fuel,
    Exhaust,
}

impl VehicleSystem {
    /// All systems, in scoring order.
    pub const ALL: [VehicleSystem; 8] = [
        VehicleSystem::Engine,
        VehicleSystem::Transmission,
        VehicleSystem::Brakes,
        VehicleSystem::Suspension,
        VehicleSystem::Electrical,
        VehicleSystem::Cooling,
        VehicleSystem::Fuel,
        VehicleSystem::Exhaust,
    ];

    /// Coarse fallback mapping for codes not in the reference database:
    /// category alone picks a default system.
    pub fn from_category(category: CodeCategory) -> Self {
        match category {
            CodeCategory::Powertrain => VehicleSystem::Engine,
            CodeCategory::Chassis => VehicleSystem::Brakes,
            CodeCategory::Body | CodeCategory::Network => VehicleSystem::Electrical,
        }
    }
}

/// Qualitative band for a numeric health score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthBucket {
    Good,
    Fair,
    Poor,
    Critical,
}

impl HealthBucket {
    /// Band thresholds: ≥80 good, ≥60 fair, ≥40 poor, else critical.
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            HealthBucket::Good
        } else if score >= 60.0 {
            HealthBucket::Fair
        } else if score >= 40.0 {
            HealthBucket::Poor
        } else {
            HealthBucket::Critical
        }
    }
}

/// Direction of change relative to the previous overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthTrend {
    Improving,
    Stable,
    Declining,
}

/// Score detail for one vehicle system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealth {
    pub system: VehicleSystem,
    /// 0–100, higher is healthier.
    pub score: f64,
    pub status: HealthBucket,
    /// Human-readable contributors, e.g. `"P0420 active (medium, 12 days old)"`.
    pub factors: Vec<String>,
}

/// Complete health report for a vehicle at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleHealthScore {
    pub vehicle_id: VehicleId,
    /// Weighted overall score, 0–100.
    pub overall: f64,
    /// Relative to the previous computed overall; stable when no prior
    /// score exists.
    pub trend: HealthTrend,
    /// Per-system breakdown in [`VehicleSystem::ALL`] order.
    pub systems: Vec<SystemHealth>,
    /// Open (active or pending) codes counted across all systems.
    pub active_code_count: u32,
    /// Maintenance compliance input used for this computation, 0–100.
    pub maintenance_compliance_pct: f64,
    pub computed_at: DateTime<Utc>,
}
