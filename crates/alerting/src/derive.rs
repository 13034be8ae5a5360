//! Alert derivation and weight status

use serde::Serialize;
use storage::Reading;

/// Most recent reading strictly below `threshold`.
///
/// Ties on timestamp go to the highest id, i.e. the reading admitted last.
pub fn derive_alert(readings: &[Reading], threshold: f64) -> Option<&Reading> {
    readings
        .iter()
        .filter(|r| r.weight < threshold)
        .max_by_key(|r| (r.timestamp, r.id))
}

/// Gauge status of a weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightStatus {
    /// Below the critical threshold
    Critical,
    /// Below the warning threshold
    Low,
    Normal,
}

impl WeightStatus {
    /// Classify a weight against the two thresholds
    pub fn classify(weight: f64, critical_threshold: f64, warning_threshold: f64) -> Self {
        if weight < critical_threshold {
            WeightStatus::Critical
        } else if weight < warning_threshold {
            WeightStatus::Low
        } else {
            WeightStatus::Normal
        }
    }

    /// Gauge colour
    pub fn color(&self) -> &'static str {
        match self {
            WeightStatus::Critical => "red",
            WeightStatus::Low => "yellow",
            WeightStatus::Normal => "green",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn reading(id: i64, weight: f64, t: i64) -> Reading {
        Reading {
            id,
            weight,
            timestamp: Utc.timestamp_opt(t, 0).unwrap(),
            room: format!("room{}", id),
            bed: "bed1".to_string(),
        }
    }

    #[test]
    fn test_latest_below_threshold() {
        let readings = vec![reading(1, 150.0, 1), reading(2, 80.0, 2), reading(3, 50.0, 3)];
        let alert = derive_alert(&readings, 100.0).unwrap();
        assert_eq!(alert.id, 3);
        assert_eq!(alert.weight, 50.0);
    }

    #[test]
    fn test_no_alert() {
        let readings = vec![reading(1, 150.0, 1)];
        assert!(derive_alert(&readings, 100.0).is_none());
        assert!(derive_alert(&[], 100.0).is_none());
    }

    #[test]
    fn test_threshold_is_strict() {
        let readings = vec![reading(1, 100.0, 1)];
        assert!(derive_alert(&readings, 100.0).is_none());
    }

    #[test]
    fn test_order_of_input_irrelevant() {
        let readings = vec![reading(3, 50.0, 3), reading(1, 20.0, 1), reading(2, 80.0, 2)];
        assert_eq!(derive_alert(&readings, 100.0).unwrap().id, 3);
    }

    #[test]
    fn test_timestamp_tie_goes_to_highest_id() {
        let readings = vec![reading(7, 10.0, 5), reading(9, 90.0, 5), reading(8, 30.0, 5)];
        assert_eq!(derive_alert(&readings, 100.0).unwrap().id, 9);
    }

    #[test]
    fn test_status_levels() {
        assert_eq!(WeightStatus::classify(99.9, 100.0, 200.0), WeightStatus::Critical);
        assert_eq!(WeightStatus::classify(100.0, 100.0, 200.0), WeightStatus::Low);
        assert_eq!(WeightStatus::classify(199.0, 100.0, 200.0), WeightStatus::Low);
        assert_eq!(WeightStatus::classify(200.0, 100.0, 200.0), WeightStatus::Normal);
        assert_eq!(WeightStatus::Critical.color(), "red");
        assert_eq!(WeightStatus::Low.color(), "yellow");
        assert_eq!(WeightStatus::Normal.color(), "green");
    }

    proptest! {
        #[test]
        fn prop_alert_is_latest_sub_threshold(
            samples in prop::collection::vec((0.0f64..300.0, 0i64..50), 0..30)
        ) {
            let readings: Vec<Reading> = samples
                .iter()
                .enumerate()
                .map(|(i, (w, t))| reading(i as i64 + 1, *w, *t))
                .collect();

            match derive_alert(&readings, 100.0) {
                None => prop_assert!(readings.iter().all(|r| r.weight >= 100.0)),
                Some(alert) => {
                    prop_assert!(alert.weight < 100.0);
                    for r in readings.iter().filter(|r| r.weight < 100.0) {
                        prop_assert!((r.timestamp, r.id) <= (alert.timestamp, alert.id));
                    }
                }
            }
        }
    }
}
