//! CarScope diagnostics engine.
//!
//! Provides the adapter session state machine, fixed-cadence telemetry
//! sampling, the per-vehicle diagnostic code lifecycle, oracle-backed code
//! analysis with vehicle-context caching, deterministic 0-100 health
//! scoring across eight systems, and free-text symptom triage.
//!
//! External capabilities (adapter hardware, the reasoning oracle, vehicle
//! profiles, maintenance compliance) enter through traits; everything here
//! is in-memory and embeddable.

pub mod analysis;
pub mod codes;
pub mod config;
pub mod error;
pub mod events;
pub mod health;
pub mod oracle;
pub mod repo;
pub mod sampler;
pub mod session;
pub mod symptoms;

pub use analysis::AnalysisPipeline;
pub use codes::{CodeFilter, CodeStore};
pub use config::{AnalysisConfig, EngineConfig, HealthConfig};
pub use error::{EngineError, EngineResult};
pub use events::{EngineEvent, EventBus};
pub use health::HealthScoreEngine;
pub use oracle::{HttpOracle, OracleConfig, PromptKind, ReasoningOracle, ScriptedOracle};
pub use repo::{
    ComplianceSource, StaticComplianceSource, StaticVehicleRepository, VehicleRepository,
};
pub use sampler::SamplerHandle;
pub use session::SessionController;
pub use symptoms::SymptomChecker;
