use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique vehicle identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub Uuid);

impl VehicleId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for VehicleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Vehicle identity and context, read from the vehicle repository.
///
/// Used only to build context for the analysis pipeline and symptom
/// checker; the engine never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleProfile {
    /// Vehicle Identification Number.
    pub vin: String,
    pub make: String,
    pub model: String,
    pub year: u16,
    /// Trim level (e.g., "SE", "Limited"), if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim: Option<String>,
    /// Current odometer reading in kilometers.
    pub mileage_km: u32,
}

impl VehicleProfile {
    /// One-line description for oracle prompts (e.g., "2018 Toyota Camry SE, 52000 km").
    pub fn summary(&self) -> String {
        match &self.trim {
            Some(trim) => format!(
                "{} {} {} {}, {} km",
                self.year, self.make, self.model, trim, self.mileage_km
            ),
            None => format!(
                "{} {} {}, {} km",
                self.year, self.make, self.model, self.mileage_km
            ),
        }
    }
}
