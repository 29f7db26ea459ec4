//! Trouble-code lifecycle manager.
//!
//! Per-vehicle keyed store. Mutations are serialized per vehicle by a
//! write lock; reads run concurrently; there is no cross-vehicle
//! locking. Closed records are kept as history and a code that comes
//! back after being closed gets a fresh record.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use cs_adapter::{is_valid_code, normalize_code, reference, AdapterDriver, CodeScan};
use cs_protocol::analysis::DtcAnalysis;
use cs_protocol::dtc::{CodeSeverity, CodeStatus, DiagnosticCode};
use cs_protocol::vehicle::VehicleId;

use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBus};

/// Listing filter. `Active` groups pending with active; `Resolved`
/// groups false positives with resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeFilter {
    All,
    Active,
    Resolved,
}

impl CodeFilter {
    fn matches(self, status: CodeStatus) -> bool {
        match self {
            CodeFilter::All => true,
            CodeFilter::Active => status.is_open(),
            CodeFilter::Resolved => status.is_closed(),
        }
    }
}

/// A validated scan entry, resolved against the reference database and
/// carrying its freeze frame. Built lock-free before the upsert phase.
struct Incoming {
    code: String,
    description: String,
    severity: CodeSeverity,
    status: CodeStatus,
    freeze_frame: Option<BTreeMap<String, f64>>,
}

type VehicleCodes = Arc<RwLock<Vec<DiagnosticCode>>>;

/// In-memory diagnostic code store, keyed by vehicle.
pub struct CodeStore {
    vehicles: RwLock<HashMap<VehicleId, VehicleCodes>>,
    events: EventBus,
}

impl CodeStore {
    pub fn new(events: EventBus) -> Self {
        Self {
            vehicles: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Ingest one adapter scan for a vehicle.
    ///
    /// Two-phase: every code is validated, resolved against the
    /// reference database, and (for stored codes) has its freeze frame
    /// fetched before any record is touched. A malformed code or a
    /// freeze-frame fetch error aborts the whole batch with nothing
    /// upserted. Returns the vehicle's active list after the batch
    /// commits.
    pub async fn ingest_scan(
        &self,
        vehicle_id: VehicleId,
        scan: CodeScan,
        driver: &dyn AdapterDriver,
        mileage: u32,
    ) -> EngineResult<Vec<DiagnosticCode>> {
        let mut incoming = Vec::new();
        let mut seen = HashSet::new();

        // Stored codes first, so a code present in both lists lands active.
        let raw_codes = scan
            .stored
            .iter()
            .map(|code| (code, CodeStatus::Active))
            .chain(scan.pending.iter().map(|code| (code, CodeStatus::Pending)));

        for (raw, status) in raw_codes {
            let code = normalize_code(raw);
            if !is_valid_code(&code) {
                return Err(EngineError::Validation(format!(
                    "malformed trouble code {raw:?}"
                )));
            }
            if !seen.insert(code.clone()) {
                continue;
            }

            let (description, severity) = match reference::lookup(&code) {
                Some(info) => (info.description.to_string(), info.severity),
                None => (
                    "Unrecognized diagnostic code".to_string(),
                    CodeSeverity::Medium,
                ),
            };

            let freeze_frame = if status == CodeStatus::Active {
                let frame = driver.read_freeze_frame(&code).await?;
                (!frame.is_empty()).then_some(frame)
            } else {
                None
            };

            incoming.push(Incoming {
                code,
                description,
                severity,
                status,
                freeze_frame,
            });
        }

        let entry = {
            let mut vehicles = self.vehicles.write().await;
            Arc::clone(vehicles.entry(vehicle_id).or_default())
        };
        let mut records = entry.write().await;

        let now = Utc::now();
        let mut new_codes = Vec::new();
        for item in incoming {
            match records
                .iter_mut()
                .find(|r| r.code == item.code && r.status.is_open())
            {
                Some(record) => {
                    if record.status == CodeStatus::Pending && item.status == CodeStatus::Active {
                        record.status = CodeStatus::Active;
                        if record.freeze_frame.is_none() {
                            record.freeze_frame = item.freeze_frame;
                        }
                    }
                    // "Materially newer" means the odometer moved forward.
                    if mileage > record.mileage_at_detection {
                        record.detected_at = now;
                        record.mileage_at_detection = mileage;
                    }
                }
                None => {
                    let mut record = DiagnosticCode::new(
                        vehicle_id,
                        item.code.clone(),
                        item.description,
                        item.severity,
                        item.status,
                        mileage,
                    );
                    record.freeze_frame = item.freeze_frame;
                    new_codes.push(item.code);
                    records.push(record);
                }
            }
        }

        let mut active: Vec<DiagnosticCode> = records
            .iter()
            .filter(|r| r.status.is_open())
            .cloned()
            .collect();
        drop(records);
        sort_recent_first(&mut active);

        tracing::info!(
            vehicle = %vehicle_id,
            new = new_codes.len(),
            active = active.len(),
            "scan ingested"
        );
        self.events.emit(EngineEvent::ScanIngested {
            vehicle_id,
            new_codes,
            at: Utc::now(),
        });
        Ok(active)
    }

    /// Close a code as repaired. Idempotent on already-closed records.
    pub async fn resolve(
        &self,
        vehicle_id: VehicleId,
        code_id: Uuid,
    ) -> EngineResult<DiagnosticCode> {
        self.close(vehicle_id, code_id, CodeStatus::Resolved).await
    }

    /// Close a code as a false positive. Idempotent on already-closed
    /// records.
    pub async fn mark_false_positive(
        &self,
        vehicle_id: VehicleId,
        code_id: Uuid,
    ) -> EngineResult<DiagnosticCode> {
        self.close(vehicle_id, code_id, CodeStatus::FalsePositive)
            .await
    }

    async fn close(
        &self,
        vehicle_id: VehicleId,
        code_id: Uuid,
        terminal: CodeStatus,
    ) -> EngineResult<DiagnosticCode> {
        let entry = self
            .vehicle_codes(vehicle_id)
            .await
            .ok_or_else(|| code_not_found(code_id))?;
        let mut records = entry.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == code_id)
            .ok_or_else(|| code_not_found(code_id))?;

        if record.status.is_closed() {
            return Ok(record.clone());
        }
        record.status = terminal;
        record.cleared_at = Some(Utc::now());
        let snapshot = record.clone();
        drop(records);

        tracing::info!(vehicle = %vehicle_id, code = %snapshot.code, status = ?terminal, "code closed");
        self.events.emit(EngineEvent::CodeResolved {
            vehicle_id,
            code: snapshot.code.clone(),
            at: Utc::now(),
        });
        Ok(snapshot)
    }

    /// List a vehicle's records, most recently detected first. Unknown
    /// vehicles list empty.
    pub async fn list(&self, vehicle_id: VehicleId, filter: CodeFilter) -> Vec<DiagnosticCode> {
        let Some(entry) = self.vehicle_codes(vehicle_id).await else {
            return Vec::new();
        };
        let records = entry.read().await;
        let mut out: Vec<DiagnosticCode> = records
            .iter()
            .filter(|r| filter.matches(r.status))
            .cloned()
            .collect();
        drop(records);
        sort_recent_first(&mut out);
        out
    }

    /// Single-record lookup.
    pub async fn get(&self, vehicle_id: VehicleId, code_id: Uuid) -> EngineResult<DiagnosticCode> {
        let entry = self
            .vehicle_codes(vehicle_id)
            .await
            .ok_or_else(|| code_not_found(code_id))?;
        let records = entry.read().await;
        records
            .iter()
            .find(|r| r.id == code_id)
            .cloned()
            .ok_or_else(|| code_not_found(code_id))
    }

    /// Reset the ECU's own code memory. Local history is deliberately
    /// untouched; trend and health scoring need it.
    pub async fn clear_adapter_codes(&self, driver: &dyn AdapterDriver) -> EngineResult<()> {
        driver.clear_codes().await?;
        tracing::info!("adapter code memory cleared, local history retained");
        Ok(())
    }

    /// Cache an analysis onto its record.
    pub async fn attach_analysis(
        &self,
        vehicle_id: VehicleId,
        code_id: Uuid,
        analysis: DtcAnalysis,
    ) -> EngineResult<DiagnosticCode> {
        let entry = self
            .vehicle_codes(vehicle_id)
            .await
            .ok_or_else(|| code_not_found(code_id))?;
        let mut records = entry.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == code_id)
            .ok_or_else(|| code_not_found(code_id))?;
        record.analysis = Some(analysis);
        Ok(record.clone())
    }

    async fn vehicle_codes(&self, vehicle_id: VehicleId) -> Option<VehicleCodes> {
        self.vehicles.read().await.get(&vehicle_id).cloned()
    }
}

fn code_not_found(code_id: Uuid) -> EngineError {
    EngineError::NotFound {
        what: "diagnostic code",
        id: code_id.to_string(),
    }
}

fn sort_recent_first(codes: &mut [DiagnosticCode]) {
    codes.sort_by(|a, b| {
        b.detected_at
            .cmp(&a.detected_at)
            .then_with(|| a.code.cmp(&b.code))
    });
}
