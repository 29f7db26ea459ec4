pub mod analysis;
pub mod dtc;
pub mod health;
pub mod session;
pub mod symptom;
pub mod telemetry;
pub mod vehicle;

pub use analysis::*;
pub use dtc::*;
pub use health::*;
pub use session::*;
pub use symptom::*;
pub use telemetry::*;
pub use vehicle::*;
