//! Alerting System
//!
//! Derives critical weight alerts from a set of readings, maps weights to
//! gauge status and debounces alerts per dashboard viewer.

mod derive;
mod manager;
mod session;

pub use derive::{derive_alert, WeightStatus};
pub use manager::{AlertConfig, AlertManager, SessionDecision};
pub use session::{AlertSession, SessionState};
