//! Vehicle health scoring.
//!
//! The scoring core is a pure function of its inputs (codes, compliance,
//! previous overall, and the clock value) and is bit-identical across
//! repeated invocations for identical inputs. [`HealthScoreEngine`]
//! wraps it with input gathering and a per-vehicle previous-score memory
//! for trend; every calculation re-runs the whole computation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use cs_adapter::reference;
use cs_protocol::dtc::{CodeSeverity, CodeStatus, DiagnosticCode};
use cs_protocol::health::{
    HealthBucket, HealthTrend, SystemHealth, VehicleHealthScore, VehicleSystem,
};
use cs_protocol::vehicle::VehicleId;

use crate::codes::{CodeFilter, CodeStore};
use crate::config::HealthConfig;
use crate::error::EngineResult;
use crate::events::{EngineEvent, EventBus};
use crate::repo::ComplianceSource;

/// Everything the pure scoring core reads.
pub struct HealthInputs<'a> {
    pub vehicle_id: VehicleId,
    /// Complete record history; closed codes are ignored by the scorer.
    pub codes: &'a [DiagnosticCode],
    /// Maintenance compliance, 0–100.
    pub compliance_pct: f64,
    /// Overall score from the previous computation, for trend.
    pub previous_overall: Option<f64>,
    pub now: DateTime<Utc>,
}

/// Fixed per-system weights of the scoring model. Safety- and
/// drivability-relevant systems count more; the weights sum to 10.5.
pub fn system_weight(system: VehicleSystem) -> f64 {
    match system {
        VehicleSystem::Engine => 2.0,
        VehicleSystem::Brakes => 1.8,
        VehicleSystem::Transmission => 1.5,
        VehicleSystem::Fuel => 1.2,
        VehicleSystem::Cooling => 1.2,
        VehicleSystem::Suspension => 1.0,
        VehicleSystem::Exhaust => 1.0,
        VehicleSystem::Electrical => 0.8,
    }
}

/// Which system a code counts against: the reference database first,
/// then description keywords, then the category-level fallback.
pub fn system_for_code(code: &DiagnosticCode) -> VehicleSystem {
    if let Some(info) = reference::lookup(&code.code) {
        return info.system;
    }
    keyword_system(&code.description)
        .unwrap_or_else(|| VehicleSystem::from_category(code.category))
}

fn keyword_system(description: &str) -> Option<VehicleSystem> {
    const KEYWORDS: &[(&str, VehicleSystem)] = &[
        ("brake", VehicleSystem::Brakes),
        ("wheel speed", VehicleSystem::Brakes),
        ("transmission", VehicleSystem::Transmission),
        ("gear", VehicleSystem::Transmission),
        ("shift", VehicleSystem::Transmission),
        ("torque converter", VehicleSystem::Transmission),
        ("coolant", VehicleSystem::Cooling),
        ("thermostat", VehicleSystem::Cooling),
        ("overtemperature", VehicleSystem::Cooling),
        ("radiator", VehicleSystem::Cooling),
        ("cooling fan", VehicleSystem::Cooling),
        ("fuel", VehicleSystem::Fuel),
        ("injector", VehicleSystem::Fuel),
        ("too lean", VehicleSystem::Fuel),
        ("too rich", VehicleSystem::Fuel),
        ("catalyst", VehicleSystem::Exhaust),
        ("exhaust", VehicleSystem::Exhaust),
        ("evaporative", VehicleSystem::Exhaust),
        ("oxygen", VehicleSystem::Exhaust),
        ("o2 sensor", VehicleSystem::Exhaust),
        ("suspension", VehicleSystem::Suspension),
        ("ride height", VehicleSystem::Suspension),
        ("damper", VehicleSystem::Suspension),
        ("battery", VehicleSystem::Electrical),
        ("voltage", VehicleSystem::Electrical),
        ("alternator", VehicleSystem::Electrical),
        ("communication", VehicleSystem::Electrical),
        ("misfire", VehicleSystem::Engine),
        ("camshaft", VehicleSystem::Engine),
        ("crankshaft", VehicleSystem::Engine),
        ("ignition", VehicleSystem::Engine),
        ("oil pressure", VehicleSystem::Engine),
    ];

    let description = description.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(keyword, _)| description.contains(keyword))
        .map(|(_, system)| *system)
}

fn severity_penalty(severity: CodeSeverity, cfg: &HealthConfig) -> f64 {
    match severity {
        CodeSeverity::Critical => cfg.critical_penalty,
        CodeSeverity::High => cfg.high_penalty,
        CodeSeverity::Medium => cfg.medium_penalty,
        CodeSeverity::Low => cfg.low_penalty,
    }
}

/// Linear decay from 1.0 (fresh) to the floor at the window edge,
/// staying at the floor beyond.
fn recency_factor(age_days: i64, cfg: &HealthConfig) -> f64 {
    if cfg.recency_window_days <= 0 {
        return cfg.recency_floor;
    }
    let age = age_days.max(0) as f64;
    let window = cfg.recency_window_days as f64;
    if age >= window {
        cfg.recency_floor
    } else {
        1.0 - (1.0 - cfg.recency_floor) * (age / window)
    }
}

fn status_word(status: CodeStatus) -> &'static str {
    match status {
        CodeStatus::Active => "active",
        CodeStatus::Pending => "pending",
        CodeStatus::Resolved => "resolved",
        CodeStatus::FalsePositive => "false positive",
    }
}

fn severity_word(severity: CodeSeverity) -> &'static str {
    match severity {
        CodeSeverity::Low => "low",
        CodeSeverity::Medium => "medium",
        CodeSeverity::High => "high",
        CodeSeverity::Critical => "critical",
    }
}

/// Score a vehicle. Pure: no clock reads, no I/O, no randomness.
pub fn compute(inputs: &HealthInputs<'_>, cfg: &HealthConfig) -> VehicleHealthScore {
    let open: Vec<&DiagnosticCode> = inputs
        .codes
        .iter()
        .filter(|c| c.status.is_open())
        .collect();
    let compliance = inputs.compliance_pct.clamp(0.0, 100.0);
    let shortfall = (100.0 - compliance) * cfg.maintenance_factor;

    let mut systems = Vec::with_capacity(VehicleSystem::ALL.len());
    for system in VehicleSystem::ALL {
        let mut score = 100.0;
        let mut factors = Vec::new();

        for code in open.iter().filter(|c| system_for_code(c) == system) {
            let age_days = (inputs.now - code.detected_at).num_days().max(0);
            let penalty = severity_penalty(code.severity, cfg) * recency_factor(age_days, cfg);
            score -= penalty;
            factors.push(format!(
                "{} {} ({}, {} days old)",
                code.code,
                status_word(code.status),
                severity_word(code.severity),
                age_days
            ));
        }
        if shortfall > 0.0 {
            score -= shortfall;
            factors.push(format!("maintenance compliance {compliance:.0}%"));
        }

        let score = score.clamp(0.0, 100.0);
        systems.push(SystemHealth {
            system,
            score,
            status: HealthBucket::from_score(score),
            factors,
        });
    }

    // Weighted mean, written as deviation from perfect so a clean
    // vehicle lands on exactly 100.0.
    let weight_sum: f64 = VehicleSystem::ALL.iter().copied().map(system_weight).sum();
    let weighted: f64 = 100.0
        + systems
            .iter()
            .map(|s| (s.score - 100.0) * system_weight(s.system))
            .sum::<f64>()
            / weight_sum;

    let critical_open = open
        .iter()
        .filter(|c| c.severity == CodeSeverity::Critical)
        .count();
    let overall =
        (weighted - critical_open as f64 * cfg.critical_code_penalty).clamp(0.0, 100.0);

    let trend = match inputs.previous_overall {
        None => HealthTrend::Stable,
        Some(previous) => {
            let delta = overall - previous;
            if delta.abs() <= cfg.trend_epsilon {
                HealthTrend::Stable
            } else if delta > 0.0 {
                HealthTrend::Improving
            } else {
                HealthTrend::Declining
            }
        }
    };

    VehicleHealthScore {
        vehicle_id: inputs.vehicle_id,
        overall,
        trend,
        systems,
        active_code_count: open.len() as u32,
        maintenance_compliance_pct: compliance,
        computed_at: inputs.now,
    }
}

/// Stateful wrapper: gathers inputs and remembers the previous overall
/// score per vehicle for trend.
pub struct HealthScoreEngine {
    codes: Arc<CodeStore>,
    compliance: Arc<dyn ComplianceSource>,
    config: HealthConfig,
    previous: RwLock<HashMap<VehicleId, f64>>,
    events: EventBus,
}

impl HealthScoreEngine {
    pub fn new(
        codes: Arc<CodeStore>,
        compliance: Arc<dyn ComplianceSource>,
        config: HealthConfig,
        events: EventBus,
    ) -> Self {
        Self {
            codes,
            compliance,
            config,
            previous: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Compute a fresh score for the vehicle. Never incremental.
    pub async fn calculate(&self, vehicle_id: VehicleId) -> EngineResult<VehicleHealthScore> {
        let codes = self.codes.list(vehicle_id, CodeFilter::All).await;
        let compliance_pct = self.compliance.compliance_pct(vehicle_id).await?;
        let previous_overall = self.previous.read().await.get(&vehicle_id).copied();

        let inputs = HealthInputs {
            vehicle_id,
            codes: &codes,
            compliance_pct,
            previous_overall,
            now: Utc::now(),
        };
        let score = compute(&inputs, &self.config);

        self.previous.write().await.insert(vehicle_id, score.overall);
        tracing::info!(
            vehicle = %vehicle_id,
            overall = score.overall,
            trend = ?score.trend,
            "health score computed"
        );
        self.events.emit(EngineEvent::HealthComputed {
            vehicle_id,
            overall: score.overall,
            trend: score.trend,
            at: Utc::now(),
        });
        Ok(score)
    }
}
