//! OBD-II adapter abstraction for CarScope.
//!
//! The engine talks to vehicles exclusively through the [`AdapterDriver`]
//! trait. This crate provides the trait, the PID registry and decoders,
//! raw trouble-code decoding, the static code reference database, and a
//! scriptable [`MockAdapter`] used across the test suites.

pub mod codes;
pub mod driver;
pub mod error;
pub mod mock;
pub mod pid;
pub mod reference;

pub use codes::{decode_code_bytes, is_valid_code, normalize_code};
pub use driver::{AdapterCandidate, AdapterDriver, AdapterLink, CodeScan, Transport};
pub use error::{AdapterError, AdapterResult};
pub use mock::MockAdapter;
pub use pid::Pid;
pub use reference::{lookup, CodeInfo};
