//! Oracle-backed symptom triage.
//!
//! Turns an owner's free-text complaint into a structured walkthrough.
//! The engine validates result shape only (urgency parses, flowchart
//! non-empty, every step has an instruction); whether the advice is
//! mechanically sound is the oracle's problem, not ours.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use uuid::Uuid;

use cs_adapter::{is_valid_code, normalize_code};
use cs_protocol::analysis::Urgency;
use cs_protocol::symptom::{FlowStep, SymptomCheck};
use cs_protocol::vehicle::{UserId, VehicleId};

use crate::codes::{CodeFilter, CodeStore};
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBus};
use crate::oracle::{PromptKind, ReasoningOracle};
use crate::repo::VehicleRepository;

/// Shape of the oracle's triage JSON.
#[derive(Deserialize)]
struct TriageWire {
    analysis_text: String,
    #[serde(default)]
    suggested_codes: Vec<String>,
    #[serde(default)]
    probable_causes: Vec<String>,
    urgency: Urgency,
    #[serde(default)]
    related_recalls: Vec<String>,
    flowchart: Vec<FlowStepWire>,
}

#[derive(Deserialize)]
struct FlowStepWire {
    instruction: String,
    #[serde(default)]
    check: Option<String>,
    #[serde(default)]
    if_yes: Option<String>,
    #[serde(default)]
    if_no: Option<String>,
}

/// Symptom triage front end with per-vehicle history.
pub struct SymptomChecker {
    oracle: Arc<dyn ReasoningOracle>,
    vehicles: Arc<dyn VehicleRepository>,
    codes: Arc<CodeStore>,
    history: RwLock<HashMap<VehicleId, Vec<SymptomCheck>>>,
    events: EventBus,
}

impl SymptomChecker {
    pub fn new(
        oracle: Arc<dyn ReasoningOracle>,
        vehicles: Arc<dyn VehicleRepository>,
        codes: Arc<CodeStore>,
        events: EventBus,
    ) -> Self {
        Self {
            oracle,
            vehicles,
            codes,
            history: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Triage one symptom description for a vehicle.
    pub async fn check(
        &self,
        vehicle_id: VehicleId,
        user_id: UserId,
        symptom_text: &str,
    ) -> EngineResult<SymptomCheck> {
        let symptom_text = symptom_text.trim();
        if symptom_text.is_empty() {
            return Err(EngineError::Validation(
                "symptom description is empty".to_string(),
            ));
        }

        let vehicle = self.vehicles.vehicle(vehicle_id).await?;
        let stored_codes: Vec<String> = self
            .codes
            .list(vehicle_id, CodeFilter::Active)
            .await
            .into_iter()
            .map(|r| r.code)
            .collect();

        let input = json!({
            "symptom": symptom_text,
            "vehicle": {
                "make": vehicle.make,
                "model": vehicle.model,
                "year": vehicle.year,
                "trim": vehicle.trim,
                "mileage_km": vehicle.mileage_km,
            },
            "stored_codes": stored_codes,
        });
        let raw = self.oracle.infer(PromptKind::SymptomTriage, &input).await?;
        let wire = parse_triage(raw)?;

        let mut suggested_codes = Vec::with_capacity(wire.suggested_codes.len());
        for raw_code in wire.suggested_codes {
            let code = normalize_code(&raw_code);
            if is_valid_code(&code) {
                suggested_codes.push(code);
            } else {
                tracing::debug!(code = %raw_code, "dropping malformed suggested code");
            }
        }

        let flowchart = wire
            .flowchart
            .into_iter()
            .zip(1u32..)
            .map(|(step, number)| FlowStep {
                step: number,
                instruction: step.instruction,
                check: step.check,
                if_yes: step.if_yes,
                if_no: step.if_no,
            })
            .collect();

        let check = SymptomCheck {
            id: Uuid::now_v7(),
            vehicle_id,
            user_id,
            symptom_text: symptom_text.to_string(),
            analysis_text: wire.analysis_text,
            suggested_codes,
            probable_causes: wire.probable_causes,
            urgency: wire.urgency,
            related_recalls: wire.related_recalls,
            flowchart,
            checked_at: Utc::now(),
        };

        self.history
            .write()
            .await
            .entry(vehicle_id)
            .or_default()
            .push(check.clone());

        tracing::info!(
            vehicle = %vehicle_id,
            urgency = ?check.urgency,
            steps = check.flowchart.len(),
            "symptom triaged"
        );
        self.events.emit(EngineEvent::SymptomChecked {
            vehicle_id,
            urgency: check.urgency,
            at: Utc::now(),
        });
        Ok(check)
    }

    /// Past checks for a vehicle, oldest first.
    pub async fn history(&self, vehicle_id: VehicleId) -> Vec<SymptomCheck> {
        self.history
            .read()
            .await
            .get(&vehicle_id)
            .cloned()
            .unwrap_or_default()
    }
}

fn parse_triage(raw: serde_json::Value) -> EngineResult<TriageWire> {
    let wire: TriageWire = serde_json::from_value(raw)
        .map_err(|e| EngineError::AnalysisUnavailable(format!("malformed triage: {e}")))?;

    if wire.analysis_text.trim().is_empty() {
        return Err(EngineError::AnalysisUnavailable(
            "empty analysis text".to_string(),
        ));
    }
    if wire.flowchart.is_empty() {
        return Err(EngineError::AnalysisUnavailable(
            "empty flowchart".to_string(),
        ));
    }
    if wire
        .flowchart
        .iter()
        .any(|step| step.instruction.trim().is_empty())
    {
        return Err(EngineError::AnalysisUnavailable(
            "flowchart step without instruction".to_string(),
        ));
    }
    Ok(wire)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::ScriptedOracle;
    use crate::repo::StaticVehicleRepository;
    use cs_protocol::vehicle::VehicleProfile;

    fn triage_json() -> serde_json::Value {
        json!({
            "analysis_text": "Grinding under braking usually means worn pads contacting the rotor.",
            "suggested_codes": ["C0035", "not-a-code"],
            "probable_causes": [
                "Front brake pads worn to the backing plate",
                "Debris caught between pad and rotor"
            ],
            "urgency": "high",
            "related_recalls": [],
            "flowchart": [
                {
                    "step": 7,
                    "instruction": "Look through the front wheel spokes at the brake pad",
                    "check": "Is the pad material thinner than 3mm?",
                    "if_yes": "Replace the front pads before driving further",
                    "if_no": "step 2"
                },
                {
                    "step": 9,
                    "instruction": "Roll the car slowly and listen with the windows down",
                    "check": "Does the noise follow wheel speed?",
                    "if_yes": "Have the brakes inspected this week",
                    "if_no": "Likely heat shield rattle; mention it at next service"
                }
            ]
        })
    }

    struct Fixture {
        oracle: Arc<ScriptedOracle>,
        checker: SymptomChecker,
        vehicle_id: VehicleId,
        user_id: UserId,
        events: EventBus,
    }

    fn fixture() -> Fixture {
        let events = EventBus::default();
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.set_response(PromptKind::SymptomTriage, triage_json());
        let vehicles = Arc::new(StaticVehicleRepository::new());
        let codes = Arc::new(CodeStore::new(events.clone()));

        let vehicle_id = VehicleId::new();
        vehicles.insert(
            vehicle_id,
            VehicleProfile {
                vin: "1FTEW1EP5JFA00001".to_string(),
                make: "Ford".to_string(),
                model: "F-150".to_string(),
                year: 2018,
                trim: None,
                mileage_km: 96_500,
            },
        );

        let checker = SymptomChecker::new(oracle.clone(), vehicles, codes, events.clone());
        Fixture {
            oracle,
            checker,
            vehicle_id,
            user_id: UserId::new(),
            events,
        }
    }

    #[tokio::test]
    async fn check_returns_renumbered_flowchart() {
        let f = fixture();

        let check = f
            .checker
            .check(f.vehicle_id, f.user_id, "Grinding noise when braking")
            .await
            .unwrap();

        assert_eq!(check.urgency, Urgency::High);
        assert_eq!(check.flowchart.len(), 2);
        let numbers: Vec<u32> = check.flowchart.iter().map(|s| s.step).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert!(check.flowchart[0].check.is_some());
    }

    #[tokio::test]
    async fn malformed_suggested_codes_are_dropped() {
        let f = fixture();

        let check = f
            .checker
            .check(f.vehicle_id, f.user_id, "Grinding noise when braking")
            .await
            .unwrap();
        assert_eq!(check.suggested_codes, vec!["C0035"]);
    }

    #[tokio::test]
    async fn empty_symptom_text_is_rejected() {
        let f = fixture();

        let err = f
            .checker
            .check(f.vehicle_id, f.user_id, "   \n\t ")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(f.oracle.calls(), 0);
        assert!(f.checker.history(f.vehicle_id).await.is_empty());
    }

    #[tokio::test]
    async fn empty_flowchart_is_rejected() {
        let f = fixture();
        let mut bad = triage_json();
        bad["flowchart"] = json!([]);
        f.oracle.set_response(PromptKind::SymptomTriage, bad);

        let err = f
            .checker
            .check(f.vehicle_id, f.user_id, "Rattle at idle")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AnalysisUnavailable(_)));
        assert!(f.checker.history(f.vehicle_id).await.is_empty());
    }

    #[tokio::test]
    async fn step_without_instruction_is_rejected() {
        let f = fixture();
        let mut bad = triage_json();
        bad["flowchart"][1]["instruction"] = json!("  ");
        f.oracle.set_response(PromptKind::SymptomTriage, bad);

        let err = f
            .checker
            .check(f.vehicle_id, f.user_id, "Rattle at idle")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AnalysisUnavailable(_)));
    }

    #[tokio::test]
    async fn history_accumulates_in_order() {
        let f = fixture();

        f.checker
            .check(f.vehicle_id, f.user_id, "Grinding noise when braking")
            .await
            .unwrap();
        f.checker
            .check(f.vehicle_id, f.user_id, "Now it squeals too")
            .await
            .unwrap();

        let history = f.checker.history(f.vehicle_id).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].symptom_text, "Grinding noise when braking");
        assert_eq!(history[1].symptom_text, "Now it squeals too");
        assert!(f.checker.history(VehicleId::new()).await.is_empty());
    }

    #[tokio::test]
    async fn unknown_vehicle_is_not_found() {
        let f = fixture();

        let err = f
            .checker
            .check(VehicleId::new(), f.user_id, "Stalls at red lights")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::NotFound { what: "vehicle", .. }
        ));
        assert_eq!(f.oracle.calls(), 0);
    }

    #[tokio::test]
    async fn vehicle_context_reaches_the_oracle() {
        let f = fixture();

        f.checker
            .check(f.vehicle_id, f.user_id, "Hesitates under load")
            .await
            .unwrap();

        let inputs = f.oracle.inputs();
        assert_eq!(inputs.len(), 1);
        let (kind, input) = &inputs[0];
        assert_eq!(*kind, PromptKind::SymptomTriage);
        assert_eq!(input["vehicle"]["make"], "Ford");
        assert_eq!(input["vehicle"]["year"], 2018);
        assert_eq!(input["symptom"], "Hesitates under load");
    }

    #[tokio::test]
    async fn check_emits_event() {
        let f = fixture();
        let mut rx = f.events.subscribe();

        f.checker
            .check(f.vehicle_id, f.user_id, "Grinding noise when braking")
            .await
            .unwrap();

        loop {
            if let EngineEvent::SymptomChecked { urgency, .. } = rx.recv().await.unwrap() {
                assert_eq!(urgency, Urgency::High);
                break;
            }
        }
    }
}
