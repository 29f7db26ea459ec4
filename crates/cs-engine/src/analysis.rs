//! Oracle-backed code analysis pipeline.
//!
//! An analysis is a function of (code, make, model, year, mileage
//! bucket); identical contexts return the cached result without another
//! oracle round-trip. A vehicle re-analyzed tens of thousands of km
//! later falls into a different bucket and gets fresh advice. Oracle
//! failures and malformed results are never cached and leave any
//! analysis already on the record untouched.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use uuid::Uuid;

use cs_protocol::analysis::{DtcAnalysis, ProbableCause, RepairDifficulty, RepairVenue, Urgency};
use cs_protocol::vehicle::{VehicleId, VehicleProfile};

use crate::codes::CodeStore;
use crate::config::AnalysisConfig;
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBus};
use crate::oracle::{PromptKind, ReasoningOracle};
use crate::repo::VehicleRepository;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AnalysisKey {
    code: String,
    make: String,
    model: String,
    year: u16,
    mileage_bucket: u32,
}

/// Shape of the oracle's analysis JSON; the engine stamps `generated_at`.
#[derive(Deserialize)]
struct AnalysisWire {
    urgency: Urgency,
    cost_min_usd: u32,
    cost_max_usd: u32,
    labor_cost_usd: u32,
    parts_cost_usd: u32,
    difficulty: RepairDifficulty,
    probable_causes: Vec<ProbableCause>,
    venue: RepairVenue,
    venue_rationale: String,
    explanation: String,
}

/// Cached, oracle-backed analysis of diagnostic codes.
pub struct AnalysisPipeline {
    oracle: Arc<dyn ReasoningOracle>,
    codes: Arc<CodeStore>,
    vehicles: Arc<dyn VehicleRepository>,
    cache: RwLock<HashMap<AnalysisKey, DtcAnalysis>>,
    mileage_bucket_km: u32,
    events: EventBus,
}

impl AnalysisPipeline {
    pub fn new(
        oracle: Arc<dyn ReasoningOracle>,
        codes: Arc<CodeStore>,
        vehicles: Arc<dyn VehicleRepository>,
        config: &AnalysisConfig,
        events: EventBus,
    ) -> Self {
        Self {
            oracle,
            codes,
            vehicles,
            cache: RwLock::new(HashMap::new()),
            mileage_bucket_km: config.mileage_bucket_km.max(1),
            events,
        }
    }

    /// Analyze one code record in its vehicle context.
    pub async fn analyze(
        &self,
        vehicle_id: VehicleId,
        code_id: Uuid,
    ) -> EngineResult<DtcAnalysis> {
        let record = self.codes.get(vehicle_id, code_id).await?;
        let vehicle = self.vehicles.vehicle(vehicle_id).await?;
        let key = self.cache_key(&record.code, &vehicle);

        let cached = self.cache.read().await.get(&key).cloned();
        if let Some(analysis) = cached {
            if record.analysis.is_none() {
                self.codes
                    .attach_analysis(vehicle_id, code_id, analysis.clone())
                    .await?;
            }
            tracing::debug!(code = %record.code, "analysis cache hit");
            self.events.emit(EngineEvent::AnalysisReady {
                vehicle_id,
                code: record.code.clone(),
                cache_hit: true,
                at: Utc::now(),
            });
            return Ok(analysis);
        }

        let input = json!({
            "code": record.code,
            "description": record.description,
            "make": vehicle.make,
            "model": vehicle.model,
            "year": vehicle.year,
            "mileage_km": vehicle.mileage_km,
            "freeze_frame": record.freeze_frame,
        });
        let raw = self.oracle.infer(PromptKind::DtcAnalysis, &input).await?;
        let analysis = parse_analysis(raw)?;

        self.cache.write().await.insert(key, analysis.clone());
        self.codes
            .attach_analysis(vehicle_id, code_id, analysis.clone())
            .await?;

        tracing::info!(vehicle = %vehicle_id, code = %record.code, "analysis generated");
        self.events.emit(EngineEvent::AnalysisReady {
            vehicle_id,
            code: record.code,
            cache_hit: false,
            at: Utc::now(),
        });
        Ok(analysis)
    }

    fn cache_key(&self, code: &str, vehicle: &VehicleProfile) -> AnalysisKey {
        AnalysisKey {
            code: code.to_string(),
            make: vehicle.make.clone(),
            model: vehicle.model.clone(),
            year: vehicle.year,
            mileage_bucket: vehicle.mileage_km / self.mileage_bucket_km,
        }
    }
}

fn parse_analysis(raw: serde_json::Value) -> EngineResult<DtcAnalysis> {
    let wire: AnalysisWire = serde_json::from_value(raw)
        .map_err(|e| EngineError::AnalysisUnavailable(format!("malformed analysis: {e}")))?;

    if wire.cost_min_usd > wire.cost_max_usd {
        return Err(EngineError::AnalysisUnavailable(format!(
            "cost range inverted: {}..{}",
            wire.cost_min_usd, wire.cost_max_usd
        )));
    }
    if wire.probable_causes.is_empty() {
        return Err(EngineError::AnalysisUnavailable(
            "no probable causes returned".to_string(),
        ));
    }
    for cause in &wire.probable_causes {
        if cause.cause.trim().is_empty() || cause.likelihood_pct > 100 {
            return Err(EngineError::AnalysisUnavailable(format!(
                "bad probable cause: {:?} at {}%",
                cause.cause, cause.likelihood_pct
            )));
        }
    }
    if wire.explanation.trim().is_empty() {
        return Err(EngineError::AnalysisUnavailable(
            "empty explanation".to_string(),
        ));
    }

    Ok(DtcAnalysis {
        urgency: wire.urgency,
        cost_min_usd: wire.cost_min_usd,
        cost_max_usd: wire.cost_max_usd,
        labor_cost_usd: wire.labor_cost_usd,
        parts_cost_usd: wire.parts_cost_usd,
        difficulty: wire.difficulty,
        probable_causes: wire.probable_causes,
        venue: wire.venue,
        venue_rationale: wire.venue_rationale,
        explanation: wire.explanation,
        generated_at: Utc::now(),
    })
}
