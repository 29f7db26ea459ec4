use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::DtcAnalysis;
use crate::vehicle::VehicleId;

/// DTC category derived from the first character of the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeCategory {
    /// P: Powertrain (engine, transmission, fuel, emissions).
    Powertrain,
    /// C: Chassis (ABS, steering, suspension).
    Chassis,
    /// B: Body (airbags, AC, lighting).
    Body,
    /// U: Network/Communication (module bus errors).
    Network,
}

impl CodeCategory {
    /// Derive the category from a code string (e.g., "P0420").
    pub fn from_code(code: &str) -> Self {
        match code.chars().next() {
            Some('C' | 'c') => CodeCategory::Chassis,
            Some('B' | 'b') => CodeCategory::Body,
            Some('U' | 'u') => CodeCategory::Network,
            // P and anything malformed: SAE J2012 default
            _ => CodeCategory::Powertrain,
        }
    }
}

/// Severity classification of a diagnostic code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeSeverity {
    /// Cosmetic or informational; address at next service.
    Low,
    /// Schedule repair soon.
    Medium,
    /// Repair promptly; drivability or emissions affected.
    High,
    /// Stop-driving or safety-relevant fault.
    Critical,
}

/// Lifecycle status of a diagnostic code record.
///
/// Transitions only move forward: `Pending` may promote to `Active`;
/// `Active` (or `Pending`) may close to `Resolved` or `FalsePositive`;
/// the closed states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeStatus {
    Active,
    /// Intermittent fault seen by the ECU but not yet confirmed.
    Pending,
    Resolved,
    FalsePositive,
}

impl CodeStatus {
    /// Whether the code still counts against the vehicle (active or pending).
    pub fn is_open(self) -> bool {
        matches!(self, CodeStatus::Active | CodeStatus::Pending)
    }

    /// Whether the code has been closed out (resolved or false positive).
    pub fn is_closed(self) -> bool {
        !self.is_open()
    }
}

/// Persistent per-vehicle diagnostic trouble code record.
///
/// Created by scan ingestion; mutated only by resolve/false-positive
/// actions and analysis caching; never hard-deleted (closed records are
/// kept as history for trend and health scoring).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// Record identifier (UUIDv7 for time-sortability).
    pub id: Uuid,
    pub vehicle_id: VehicleId,
    /// Standard code string, format `[PCBU]####` (e.g., "P0420").
    pub code: String,
    /// Category derived from the first letter of `code`.
    pub category: CodeCategory,
    /// Human-readable description (from the reference database).
    pub description: String,
    pub severity: CodeSeverity,
    pub status: CodeStatus,
    pub detected_at: DateTime<Utc>,
    /// Set exactly when status leaves active/pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleared_at: Option<DateTime<Utc>>,
    /// Odometer reading when the code was detected, in km.
    pub mileage_at_detection: u32,
    /// Sensor values captured by the ECU when the code was set (PID name → value).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freeze_frame: Option<BTreeMap<String, f64>>,
    /// Cached oracle analysis, attached by the analysis pipeline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<DtcAnalysis>,
}

impl DiagnosticCode {
    /// Create a new record in the given open status, detected now.
    pub fn new(
        vehicle_id: VehicleId,
        code: impl Into<String>,
        description: impl Into<String>,
        severity: CodeSeverity,
        status: CodeStatus,
        mileage_at_detection: u32,
    ) -> Self {
        let code = code.into();
        let category = CodeCategory::from_code(&code);
        Self {
            id: Uuid::now_v7(),
            vehicle_id,
            code,
            category,
            description: description.into(),
            severity,
            status,
            detected_at: Utc::now(),
            cleared_at: None,
            mileage_at_detection,
            freeze_frame: None,
            analysis: None,
        }
    }
}
