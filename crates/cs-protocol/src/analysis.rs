use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How soon the underlying fault should be addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    /// Address at next scheduled service.
    Low,
    /// Schedule within the next few weeks.
    Moderate,
    /// Repair within days; continued driving risks further damage.
    High,
    /// Stop driving and repair immediately.
    Immediate,
}

/// Skill level a repair demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairDifficulty {
    /// Basic tools, no lift required.
    Easy,
    /// Some experience and common shop tools.
    Moderate,
    /// Significant disassembly or special tooling.
    Hard,
    /// Dealer or marque specialist equipment needed.
    Specialist,
}

/// Where the repair is realistically done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairVenue {
    Diy,
    Shop,
}

/// One ranked hypothesis for the root cause of a code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbableCause {
    pub cause: String,
    /// Estimated likelihood, 0–100. Causes are ordered most-likely first.
    pub likelihood_pct: u8,
}

/// Oracle-produced analysis of a diagnostic code in the context of a
/// specific vehicle (make/model/year/mileage).
///
/// Immutable once generated; cached on the owning
/// [`DiagnosticCode`](crate::dtc::DiagnosticCode) record. The cache key
/// includes a mileage bucket so a vehicle re-analyzed tens of thousands
/// of km later gets fresh advice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DtcAnalysis {
    pub urgency: Urgency,
    /// Total estimated repair cost range in USD (parts + labor).
    pub cost_min_usd: u32,
    pub cost_max_usd: u32,
    /// Typical labor share of the estimate.
    pub labor_cost_usd: u32,
    /// Typical parts share of the estimate.
    pub parts_cost_usd: u32,
    pub difficulty: RepairDifficulty,
    /// Ranked root-cause hypotheses, most likely first.
    pub probable_causes: Vec<ProbableCause>,
    pub venue: RepairVenue,
    /// Why that venue (e.g., "requires exhaust removal and a lift").
    pub venue_rationale: String,
    /// Plain-language explanation of the fault and what it means for the driver.
    pub explanation: String,
    pub generated_at: DateTime<Utc>,
}
