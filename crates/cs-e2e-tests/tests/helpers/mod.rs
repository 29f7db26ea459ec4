//! Shared test harness for E2E integration tests.
//!
//! Wires the mock adapter, scripted oracle, and in-memory repositories
//! through the real engine components, exercising real code paths across
//! all crate boundaries.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::broadcast;

use cs_adapter::{AdapterDriver, CodeScan, MockAdapter};
use cs_engine::{
    AnalysisPipeline, CodeStore, EngineConfig, EngineEvent, EventBus, HealthScoreEngine,
    PromptKind, ScriptedOracle, SessionController, StaticComplianceSource,
    StaticVehicleRepository, SymptomChecker,
};
use cs_protocol::dtc::DiagnosticCode;
use cs_protocol::vehicle::{UserId, VehicleId, VehicleProfile};

/// End-to-end test harness wiring every engine component over mocks.
pub struct TestHarness {
    /// Mock OBD adapter shared by the session controller and code store.
    pub adapter: Arc<MockAdapter>,
    /// Scripted reasoning oracle with recorded calls.
    pub oracle: Arc<ScriptedOracle>,
    /// In-memory vehicle profiles.
    pub vehicles: Arc<StaticVehicleRepository>,
    /// In-memory maintenance compliance (defaults to 100%).
    pub compliance: Arc<StaticComplianceSource>,
    /// Engine event feed shared by all components.
    pub events: EventBus,
    /// DTC lifecycle store.
    pub codes: Arc<CodeStore>,
    /// Adapter session controller.
    pub controller: SessionController<MockAdapter>,
    /// Oracle-backed analysis pipeline with its cache.
    pub pipeline: AnalysisPipeline,
    /// Health score engine.
    pub health: HealthScoreEngine,
    /// Oracle-backed symptom checker.
    pub checker: SymptomChecker,
    /// The sample vehicle (2019 Honda Civic, 52,340 km).
    pub vehicle_id: VehicleId,
    /// The sample owner.
    pub user_id: UserId,
}

impl TestHarness {
    /// Harness with a sample vehicle and a scan of P0420 (stored, with a
    /// freeze frame) plus P0300 (pending) waiting on the adapter.
    pub fn with_civic() -> Self {
        let h = Self::empty();

        h.vehicles.insert(
            h.vehicle_id,
            VehicleProfile {
                vin: "2HGFC2F59KH500001".to_string(),
                make: "Honda".to_string(),
                model: "Civic".to_string(),
                year: 2019,
                trim: Some("Sport".to_string()),
                mileage_km: 52_340,
            },
        );

        h.adapter.set_scan(CodeScan {
            stored: vec!["P0420".to_string()],
            pending: vec!["P0300".to_string()],
        });
        let mut frame = BTreeMap::new();
        frame.insert("rpm".to_string(), 2840.0);
        frame.insert("coolant_temp_c".to_string(), 97.0);
        h.adapter.set_freeze_frame("P0420", frame);

        h.oracle.set_response(PromptKind::DtcAnalysis, canned_analysis());
        h.oracle.set_response(PromptKind::SymptomTriage, canned_triage());

        h
    }

    /// Harness with no vehicle, no scan, and no scripted oracle responses.
    pub fn empty() -> Self {
        let adapter = Arc::new(MockAdapter::new());
        let oracle = Arc::new(ScriptedOracle::new());
        let vehicles = Arc::new(StaticVehicleRepository::new());
        let compliance = Arc::new(StaticComplianceSource::new(100.0));
        let events = EventBus::default();
        let config = EngineConfig::default();

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
            compliance.clone(),
            config.health.clone(),
            events.clone(),
        );
        let checker = SymptomChecker::new(
            oracle.clone(),
            vehicles.clone(),
            codes.clone(),
            events.clone(),
        );

        Self {
            adapter,
            oracle,
            vehicles,
            compliance,
            events,
            codes,
            controller,
            pipeline,
            health,
            checker,
            vehicle_id: VehicleId::new(),
            user_id: UserId::new(),
        }
    }

    /// Bring the raw adapter link up without starting a session. Code
    /// reads need a live link; tests that are not about the session
    /// lifecycle use this to skip the sampler.
    pub async fn connect_adapter(&self) {
        let candidates = self.adapter.discover().await.unwrap();
        self.adapter.connect(&candidates[0]).await.unwrap();
    }

    /// Read the adapter's current scan and ingest it for the sample vehicle.
    /// The link must be up. Returns the open records, most recent first.
    pub async fn scan_and_ingest(&self) -> Vec<DiagnosticCode> {
        let scan = self.adapter.read_codes().await.unwrap();
        self.codes
            .ingest_scan(self.vehicle_id, scan, self.adapter.as_ref(), 52_340)
            .await
            .unwrap()
    }

    /// Drain `rx` until an event matching `pick` arrives, panicking if the
    /// feed runs dry first.
    pub fn expect_event<F>(rx: &mut broadcast::Receiver<EngineEvent>, pick: F) -> EngineEvent
    where
        F: Fn(&EngineEvent) -> bool,
    {
        loop {
            match rx.try_recv() {
                Ok(event) if pick(&event) => return event,
                Ok(_) => continue,
                Err(e) => panic!("expected event not on the feed: {e}"),
            }
        }
    }
}

/// A well-formed catalyst-efficiency analysis the oracle can return.
pub fn canned_analysis() -> serde_json::Value {
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
        "explanation": "The catalytic converter is no longer cleaning the exhaust as well as it should."
    })
}

/// A well-formed two-step triage the oracle can return.
pub fn canned_triage() -> serde_json::Value {
    json!({
        "analysis_text": "Hesitation under load usually points at fuel delivery or a vacuum leak.",
        "suggested_codes": ["P0171"],
        "probable_causes": [
            "Vacuum leak after the airflow sensor",
            "Weak fuel pump losing pressure under load"
        ],
        "urgency": "moderate",
        "related_recalls": [],
        "flowchart": [
            {
                "step": 1,
                "instruction": "With the engine idling, listen around the intake hose for hissing",
                "check": "Do you hear a hiss that changes when you press the hose?",
                "if_yes": "Have the leaking hose or gasket replaced",
                "if_no": "step 2"
            },
            {
                "step": 2,
                "instruction": "Note whether the hesitation is worse with the AC on",
                "check": "Is it clearly worse with the AC running?",
                "if_yes": "Have the MAF sensor cleaned first",
                "if_no": "Have fuel pressure tested under load this week"
            }
        ]
    })
}
