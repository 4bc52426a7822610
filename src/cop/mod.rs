//! The common operating picture: authoritative track/threat state, aging,
//! pause gating, and the service facade the HTTP layer talks to.

pub mod aging;
pub mod service;
pub mod store;

pub use service::{CopService, IngestOutcome, PauseStatus};
pub use store::CopState;
