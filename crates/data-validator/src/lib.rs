//! Data Validation
//!
//! Presence and format checks for ingest payloads coming from the bed
//! sensors and for patient records submitted by the dashboard.

mod error;
mod validator;

pub use error::ValidationError;
pub use validator::{ValidatedReading, ValidationConfig, Validator};
