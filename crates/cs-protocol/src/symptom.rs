use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::Urgency;
use crate::vehicle::{UserId, VehicleId};

/// One node of a symptom-triage flowchart.
///
/// Steps are renumbered sequentially from 1 by the checker. Branch
/// targets reference other steps ("step 3") or carry a terminal
/// recommendation as free text; terminal steps may omit branches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowStep {
    /// 1-based step number, unique within the flowchart.
    pub step: u32,
    /// What the owner should do ("Open the hood with the engine cold").
    pub instruction: String,
    /// The observable yes/no question this step answers, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
    /// Where a "yes" leads: "step N" or a terminal recommendation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_yes: Option<String>,
    /// Where a "no" leads: "step N" or a terminal recommendation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_no: Option<String>,
}

/// A completed symptom triage: the owner's free-text complaint plus the
/// oracle's structured walkthrough. Immutable once returned; the checker
/// retains per-vehicle history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymptomCheck {
    pub id: Uuid,
    pub vehicle_id: VehicleId,
    pub user_id: UserId,
    /// The owner's description, verbatim.
    pub symptom_text: String,
    /// Plain-language assessment of what the symptom likely means.
    pub analysis_text: String,
    /// Codes plausibly related to the symptom (may or may not be present
    /// on the vehicle; the vehicle's stored codes are oracle context).
    pub suggested_codes: Vec<String>,
    /// Ranked cause descriptions, most likely first.
    pub probable_causes: Vec<String>,
    pub urgency: Urgency,
    /// Known recall campaigns matching the symptom pattern, if any.
    pub related_recalls: Vec<String>,
    /// Ordered diagnostic walkthrough.
    pub flowchart: Vec<FlowStep>,
    pub checked_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_roundtrip() {
        let check = SymptomCheck {
            id: Uuid::now_v7(),
            vehicle_id: VehicleId::new(),
            user_id: UserId::new(),
            symptom_text: "Grinding noise when braking at low speed".to_string(),
            analysis_text: "Grinding under braking usually means worn pads contacting the rotor."
                .to_string(),
            suggested_codes: vec!["C0035".to_string()],
            probable_causes: vec![
                "Front brake pads worn to the backing plate".to_string(),
                "Debris caught between pad and rotor".to_string(),
            ],
            urgency: Urgency::High,
            related_recalls: vec![],
            flowchart: vec![FlowStep {
                step: 1,
                instruction: "Look through the front wheel spokes at the brake pad".to_string(),
                check: Some("Is the pad material thinner than 3mm?".to_string()),
                if_yes: Some("Replace the front pads before driving further".to_string()),
                if_no: Some("step 2".to_string()),
            }],
            checked_at: Utc::now(),
        };
        let json = serde_json::to_string(&check).unwrap();
        let back: SymptomCheck = serde_json::from_str(&json).unwrap();
        assert_eq!(back.flowchart.len(), 1);
        assert_eq!(back.flowchart[0].step, 1);
        assert_eq!(back.urgency, Urgency::High);
        assert_eq!(back.probable_causes.len(), 2);
    }

    #[test]
    fn terminal_step_omits_branches() {
        let step = FlowStep {
            step: 4,
            instruction: "Book a shop inspection".to_string(),
            check: None,
            if_yes: None,
            if_no: None,
        };
        let json = serde_json::to_string(&step).unwrap();
        assert!(!json.contains("check"));
        assert!(!json.contains("if_yes"));
        assert!(!json.contains("if_no"));
    }
}
