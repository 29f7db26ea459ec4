//! Engine configuration, loadable from TOML.

use serde::Deserialize;

use crate::oracle::OracleConfig;

/// Top-level configuration for the diagnostics engine.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Telemetry sampling cadence in milliseconds.
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    /// Capacity of the snapshot broadcast channel. Slow subscribers that
    /// fall further behind than this lose oldest snapshots first.
    #[serde(default = "default_snapshot_channel_capacity")]
    pub snapshot_channel_capacity: usize,
    /// Reasoning oracle endpoint settings. Optional; defaults to local.
    #[serde(default)]
    pub oracle: OracleConfig,
    /// Health scoring knobs.
    #[serde(default)]
    pub health: HealthConfig,
    /// Analysis caching knobs.
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

fn default_sample_interval_ms() -> u64 {
    1000
}
fn default_snapshot_channel_capacity() -> usize {
    64
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval_ms(),
            snapshot_channel_capacity: default_snapshot_channel_capacity(),
            oracle: OracleConfig::default(),
            health: HealthConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load config from a TOML file path.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }
}

/// Health scoring parameters.
///
/// The per-system weights are part of the scoring model, not
/// configuration (see `system_weight` in the health module).
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    /// Per-code score penalty by severity, before recency decay.
    #[serde(default = "default_critical_penalty")]
    pub critical_penalty: f64,
    #[serde(default = "default_high_penalty")]
    pub high_penalty: f64,
    #[serde(default = "default_medium_penalty")]
    pub medium_penalty: f64,
    #[serde(default = "default_low_penalty")]
    pub low_penalty: f64,
    /// Recency decay window: a code's penalty decays linearly from full
    /// strength (fresh) down to `recency_floor` at the window edge.
    #[serde(default = "default_recency_window_days")]
    pub recency_window_days: i64,
    #[serde(default = "default_recency_floor")]
    pub recency_floor: f64,
    /// Per-system penalty per point of missed maintenance compliance.
    #[serde(default = "default_maintenance_factor")]
    pub maintenance_factor: f64,
    /// Flat overall deduction per active critical code.
    #[serde(default = "default_critical_code_penalty")]
    pub critical_code_penalty: f64,
    /// Overall-score delta treated as "stable" when computing trend.
    #[serde(default = "default_trend_epsilon")]
    pub trend_epsilon: f64,
}

fn default_critical_penalty() -> f64 {
    40.0
}
fn default_high_penalty() -> f64 {
    25.0
}
fn default_medium_penalty() -> f64 {
    15.0
}
fn default_low_penalty() -> f64 {
    8.0
}
fn default_recency_window_days() -> i64 {
    90
}
fn default_recency_floor() -> f64 {
    0.25
}
fn default_maintenance_factor() -> f64 {
    0.15
}
fn default_critical_code_penalty() -> f64 {
    10.0
}
fn default_trend_epsilon() -> f64 {
    0.5
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            critical_penalty: default_critical_penalty(),
            high_penalty: default_high_penalty(),
            medium_penalty: default_medium_penalty(),
            low_penalty: default_low_penalty(),
            recency_window_days: default_recency_window_days(),
            recency_floor: default_recency_floor(),
            maintenance_factor: default_maintenance_factor(),
            critical_code_penalty: default_critical_code_penalty(),
            trend_epsilon: default_trend_epsilon(),
        }
    }
}

/// Analysis pipeline parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Mileage cache-key granularity: readings within the same bucket
    /// share cached analyses.
    #[serde(default = "default_mileage_bucket_km")]
    pub mileage_bucket_km: u32,
}

fn default_mileage_bucket_km() -> u32 {
    10_000
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            mileage_bucket_km: default_mileage_bucket_km(),
        }
    }
}
