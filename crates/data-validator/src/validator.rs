//! Validator for sensor readings and patient keys

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Maximum length of a room or bed identifier (column width of the store)
    pub max_identifier_len: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_identifier_len: 20,
        }
    }
}

/// A reading that passed presence checks
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedReading {
    pub room: String,
    pub bed: String,
    pub weight: f64,
}

/// Validator for ingest and patient payloads
///
/// Only presence and format are checked. Weights are never range checked:
/// negative or implausible values are stored as the sensor reported them.
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    /// Create a new validator with given config
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Require a non-blank identifier, returning it trimmed
    pub fn require_identifier(
        &self,
        field: &'static str,
        value: Option<&str>,
    ) -> Result<String, ValidationError> {
        let value = value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(ValidationError::MissingField(field))?;

        let len = value.chars().count();
        if len > self.config.max_identifier_len {
            return Err(ValidationError::TooLong {
                field,
                len,
                max: self.config.max_identifier_len,
            });
        }

        Ok(value.to_string())
    }

    /// Parse a weight sent as text (query string from the sensor firmware)
    pub fn parse_weight(&self, raw: Option<&str>) -> Result<f64, ValidationError> {
        let raw = raw
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(ValidationError::MissingField("weight"))?;

        let weight: f64 = raw.parse().map_err(|_| ValidationError::InvalidFormat {
            field: "weight",
            reason: format!("'{}' is not a number", raw),
        })?;

        self.check_weight(Some(weight))
    }

    /// Check a weight sent as a JSON number
    pub fn check_weight(&self, weight: Option<f64>) -> Result<f64, ValidationError> {
        let weight = weight.ok_or(ValidationError::MissingField("weight"))?;
        if !weight.is_finite() {
            return Err(ValidationError::InvalidFormat {
                field: "weight",
                reason: "must be a finite number".to_string(),
            });
        }
        Ok(weight)
    }

    /// Validate a raw reading from the query-string ingest path
    pub fn validate_raw_reading(
        &self,
        room: Option<&str>,
        bed: Option<&str>,
        weight: Option<&str>,
    ) -> Result<ValidatedReading, ValidationError> {
        let reading = ValidatedReading {
            room: self.require_identifier("room", room)?,
            bed: self.require_identifier("bed", bed)?,
            weight: self.parse_weight(weight)?,
        };
        debug!("Validated reading for {}/{}", reading.room, reading.bed);
        Ok(reading)
    }

    /// Validate a reading from the JSON ingest path
    pub fn validate_reading(
        &self,
        room: Option<&str>,
        bed: Option<&str>,
        weight: Option<f64>,
    ) -> Result<ValidatedReading, ValidationError> {
        Ok(ValidatedReading {
            room: self.require_identifier("room", room)?,
            bed: self.require_identifier("bed", bed)?,
            weight: self.check_weight(weight)?,
        })
    }

    /// Validate the `(room, bed)` key of a patient record
    pub fn validate_bed_key(
        &self,
        room: Option<&str>,
        bed: Option<&str>,
    ) -> Result<(String, String), ValidationError> {
        Ok((
            self.require_identifier("room", room)?,
            self.require_identifier("bed", bed)?,
        ))
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}
