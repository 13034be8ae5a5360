//! Alert Manager Implementation

use crate::derive::{derive_alert, WeightStatus};
use crate::session::{AlertSession, SessionState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use storage::Reading;
use tracing::{debug, info};

/// Alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Weights strictly below this raise a critical alert (default: 100)
    pub critical_threshold: f64,
    /// Weights strictly below this show as low (default: 200)
    pub warning_threshold: f64,
    /// Minimum time between two raises for one viewer (seconds)
    pub cooldown_seconds: u64,
    /// Viewer sessions unseen for this long are dropped (seconds)
    pub session_ttl_seconds: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            critical_threshold: 100.0,
            warning_threshold: 200.0,
            cooldown_seconds: 10,
            session_ttl_seconds: 600,
        }
    }
}

/// Outcome of one alert poll for a viewer
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDecision {
    /// Whether the viewer should raise the alert now
    pub raise: bool,
    /// Session state after the poll
    pub state: SessionState,
}

struct TrackedSession {
    session: AlertSession,
    last_seen: Instant,
}

/// Alert manager holding one debouncing session per viewer
pub struct AlertManager {
    config: AlertConfig,
    sessions: HashMap<String, TrackedSession>,
}

impl AlertManager {
    /// Create a new alert manager
    pub fn new(config: AlertConfig) -> Self {
        info!("Creating alert manager with config: {:?}", config);
        Self {
            config,
            sessions: HashMap::new(),
        }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Critical alert among `readings`, if any
    pub fn derive<'a>(&self, readings: &'a [Reading]) -> Option<&'a Reading> {
        derive_alert(readings, self.config.critical_threshold)
    }

    /// Gauge status of a weight
    pub fn status(&self, weight: f64) -> WeightStatus {
        WeightStatus::classify(
            weight,
            self.config.critical_threshold,
            self.config.warning_threshold,
        )
    }

    /// Advance the session of `viewer` with the current alert condition
    pub fn poll(&mut self, viewer: &str, alert_active: bool, now: Instant) -> SessionDecision {
        let cooldown = Duration::from_secs(self.config.cooldown_seconds);
        let tracked = self
            .sessions
            .entry(viewer.to_string())
            .or_insert_with(|| TrackedSession {
                session: AlertSession::new(cooldown),
                last_seen: now,
            });
        tracked.last_seen = now;

        let raise = tracked.session.advance(alert_active, now);
        if raise {
            info!("Raising critical alert for viewer {}", viewer);
        } else if alert_active {
            debug!("Alert suppressed for viewer {}: in cooldown period", viewer);
        }

        SessionDecision {
            raise,
            state: tracked.session.state(),
        }
    }

    /// Forget the session of `viewer`
    pub fn discard(&mut self, viewer: &str) -> bool {
        self.sessions.remove(viewer).is_some()
    }

    /// Drop sessions not polled within the session TTL. Returns how many.
    pub fn prune(&mut self, now: Instant) -> usize {
        let ttl = Duration::from_secs(self.config.session_ttl_seconds);
        let before = self.sessions.len();
        self.sessions
            .retain(|_, s| now.saturating_duration_since(s.last_seen) < ttl);
        let pruned = before - self.sessions.len();
        if pruned > 0 {
            debug!("Pruned {} idle alert sessions", pruned);
        }
        pruned
    }

    /// Number of tracked viewer sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new(AlertConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewers_debounced_independently() {
        let mut manager = AlertManager::default();
        let t0 = Instant::now();

        assert!(manager.poll("ward-a", true, t0).raise);
        assert!(!manager.poll("ward-a", true, t0 + Duration::from_secs(2)).raise);
        assert!(manager.poll("ward-b", true, t0 + Duration::from_secs(2)).raise);
        assert_eq!(manager.session_count(), 2);
    }

    #[test]
    fn test_cooldown_from_config() {
        let mut manager = AlertManager::new(AlertConfig {
            cooldown_seconds: 1,
            ..Default::default()
        });
        let t0 = Instant::now();

        assert!(manager.poll("v", true, t0).raise);
        let decision = manager.poll("v", true, t0 + Duration::from_secs(1));
        assert!(decision.raise);
        assert_eq!(decision.state.name(), "alerting");
    }

    #[test]
    fn test_prune_idle_sessions() {
        let mut manager = AlertManager::new(AlertConfig {
            session_ttl_seconds: 60,
            ..Default::default()
        });
        let t0 = Instant::now();

        manager.poll("old", false, t0);
        manager.poll("fresh", false, t0 + Duration::from_secs(50));

        assert_eq!(manager.prune(t0 + Duration::from_secs(70)), 1);
        assert_eq!(manager.session_count(), 1);
    }

    #[test]
    fn test_discard_session() {
        let mut manager = AlertManager::default();
        let t0 = Instant::now();

        manager.poll("v", false, t0);
        assert!(manager.discard("v"));
        assert!(!manager.discard("v"));
        assert_eq!(manager.session_count(), 0);
        assert!(manager.poll("v", true, t0).raise);
    }

    #[test]
    fn test_status_uses_configured_thresholds() {
        let manager = AlertManager::new(AlertConfig {
            critical_threshold: 50.0,
            warning_threshold: 75.0,
            ..Default::default()
        });

        assert_eq!(manager.status(60.0), WeightStatus::Low);
        assert_eq!(manager.status(40.0), WeightStatus::Critical);
        assert_eq!(manager.status(80.0), WeightStatus::Normal);
    }
}
