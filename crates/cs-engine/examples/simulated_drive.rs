//! End-to-end walkthrough against a simulated vehicle.
//!
//! Connects to a scripted adapter, streams a few telemetry snapshots,
//! ingests a code scan, analyzes one code, computes the health score,
//! and runs a symptom triage. Run with:
//!
//! ```sh
//! cargo run -p cs-engine --example simulated_drive
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use tracing_subscriber::EnvFilter;

use cs_adapter::{AdapterDriver, MockAdapter};
use cs_engine::{
    AnalysisPipeline, CodeStore, EngineConfig, EventBus, HealthScoreEngine, PromptKind,
    ScriptedOracle, SessionController, StaticComplianceSource, StaticVehicleRepository,
    SymptomChecker,
};
use cs_protocol::dtc::CodeStatus;
use cs_protocol::vehicle::{UserId, VehicleId, VehicleProfile};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "simulated drive starting"
    );

    // ── Simulated vehicle ───────────────────────────────────────
    let adapter = Arc::new(MockAdapter::new());
    adapter.set_scan(cs_adapter::CodeScan {
        stored: vec!["P0420".to_string(), "P0171".to_string()],
        pending: vec!["P0300".to_string()],
    });
    let mut frame = BTreeMap::new();
    frame.insert("rpm".to_string(), 2840.0);
    frame.insert("coolant_temp_c".to_string(), 97.0);
    frame.insert("engine_load_pct".to_string(), 64.0);
    adapter.set_freeze_frame("P0420", frame);

    let vehicle_id = VehicleId::new();
    let user_id = UserId::new();
    let vehicles = Arc::new(StaticVehicleRepository::new());
    vehicles.insert(
        vehicle_id,
        VehicleProfile {
            vin: "2HGFC2F59KH500001".to_string(),
            make: "Honda".to_string(),
            model: "Civic".to_string(),
            year: 2019,
            trim: Some("Sport".to_string()),
            mileage_km: 52_340,
        },
    );
    let compliance = Arc::new(StaticComplianceSource::new(85.0));

    let oracle = Arc::new(ScriptedOracle::new());
    oracle.set_response(PromptKind::DtcAnalysis, canned_analysis());
    oracle.set_response(PromptKind::SymptomTriage, canned_triage());

    // ── Engine components ───────────────────────────────────────
    let mut config = EngineConfig::default();
    config.sample_interval_ms = 250;

    let events = EventBus::default();
    let codes = Arc::new(CodeStore::new(events.clone()));
    let controller = SessionController::new(adapter.clone(), &config, events.clone());
    let pipeline = AnalysisPipeline::new(
        oracle.clone(),
        codes.clone(),
        vehicles.clone(),
        &config.analysis,
        events.clone(),
    );
    let health = HealthScoreEngine::new(
        codes.clone(),
        compliance,
        config.health.clone(),
        events.clone(),
    );
    let checker = SymptomChecker::new(oracle, vehicles, codes.clone(), events.clone());

    // ── Connect and stream ──────────────────────────────────────
    let session = controller.connect().await?;
    tracing::info!(
        adapter = session.adapter_name.as_deref().unwrap_or("?"),
        protocol = session.protocol.as_deref().unwrap_or("?"),
        "connected"
    );

    let mut telemetry = controller.subscribe_telemetry().await?;
    for _ in 0..3 {
        let snapshot = telemetry.recv().await?;
        tracing::info!(
            rpm = ?snapshot.rpm,
            coolant_c = ?snapshot.coolant_temp_c,
            battery_v = ?snapshot.battery_voltage,
            readings = snapshot.reading_count(),
            "snapshot"
        );
    }

    // ── Scan and lifecycle ──────────────────────────────────────
    let scan = adapter.read_codes().await?;
    let active = codes
        .ingest_scan(vehicle_id, scan, adapter.as_ref(), 52_340)
        .await?;
    for record in &active {
        tracing::info!(
            code = %record.code,
            status = ?record.status,
            severity = ?record.severity,
            "code on record"
        );
    }

    // ── Analysis ────────────────────────────────────────────────
    let catalyst = active
        .iter()
        .find(|r| r.code == "P0420" && r.status == CodeStatus::Active)
        .ok_or_else(|| anyhow::anyhow!("P0420 missing from scan results"))?;
    let analysis = pipeline.analyze(vehicle_id, catalyst.id).await?;
    tracing::info!(
        urgency = ?analysis.urgency,
        cost_usd = format!("{}-{}", analysis.cost_min_usd, analysis.cost_max_usd),
        venue = ?analysis.venue,
        "analysis ready"
    );
    tracing::info!(explanation = %analysis.explanation, "owner summary");

    // ── Health score ────────────────────────────────────────────
    let score = health.calculate(vehicle_id).await?;
    tracing::info!(
        overall = format!("{:.1}", score.overall),
        trend = ?score.trend,
        active_codes = score.active_code_count,
        "health score"
    );
    for system in score.systems.iter().filter(|s| !s.factors.is_empty()) {
        tracing::info!(
            system = ?system.system,
            score = format!("{:.1}", system.score),
            factors = ?system.factors,
            "system detail"
        );
    }

    // ── Symptom triage ──────────────────────────────────────────
    let check = checker
        .check(
            vehicle_id,
            user_id,
            "Hesitates when accelerating uphill and the mileage got worse",
        )
        .await?;
    tracing::info!(urgency = ?check.urgency, "triage complete");
    for step in &check.flowchart {
        tracing::info!(step = step.step, instruction = %step.instruction, "flowchart");
    }

    controller.disconnect().await;
    tracing::info!("disconnected, drive over");
    Ok(())
}

fn canned_analysis() -> serde_json::Value {
    json!({
        "urgency": "moderate",
        "cost_min_usd": 950,
        "cost_max_usd": 2600,
        "labor_cost_usd": 700,
        "parts_cost_usd": 1500,
        "difficulty": "moderate",
        "probable_causes": [
            {"cause": "Catalytic converter efficiency degraded with age", "likelihood_pct": 65},
            {"cause": "Failing downstream oxygen sensor skewing readings", "likelihood_pct": 25},
            {"cause": "Exhaust leak ahead of the rear sensor", "likelihood_pct": 10}
        ],
        "venue": "shop",
        "venue_rationale": "Exhaust work needs a lift and the converter is usually seized to the pipe",
        "explanation": "The catalytic converter is no longer cleaning the exhaust as well as it should. The car is safe to drive short term, but it will fail an emissions test and can slowly clog."
    })
}

fn canned_triage() -> serde_json::Value {
    json!({
        "analysis_text": "Hesitation under load with worsening mileage matches a lean-running engine; the stored P0171 supports that.",
        "suggested_codes": ["P0171", "P0420"],
        "probable_causes": [
            "Vacuum leak after the airflow sensor",
            "Dirty or failing mass airflow sensor",
            "Weak fuel pump losing pressure under load"
        ],
        "urgency": "moderate",
        "related_recalls": [],
        "flowchart": [
            {
                "step": 1,
                "instruction": "With the engine idling, listen around the intake hose for hissing",
                "check": "Do you hear a hiss that changes when you press the hose?",
                "if_yes": "Have the leaking hose or gasket replaced; this is usually inexpensive",
                "if_no": "step 2"
            },
            {
                "step": 2,
                "instruction": "Note whether the hesitation is worse with the AC on",
                "check": "Is it clearly worse with the AC running?",
                "if_yes": "Likely a weak idle/load compensation; have the MAF sensor cleaned first",
                "if_no": "Have fuel pressure tested under load this week"
            }
        ]
    })
}
