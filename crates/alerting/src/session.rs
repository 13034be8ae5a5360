//! Per-viewer alert debouncing

use std::time::{Duration, Instant};

/// Where a viewer's alert display stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing raised recently
    Idle,
    /// Alert condition present; last raised at `raised_at`
    Alerting { raised_at: Instant },
    /// Condition cleared, but a raise happened within the cooldown window
    Cooldown { raised_at: Instant },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Alerting { .. } => "alerting",
            SessionState::Cooldown { .. } => "cooldown",
        }
    }
}

/// Alert state machine of one viewer: `Idle -> Alerting -> Cooldown -> Idle`.
///
/// A raise is never repeated within `cooldown` of the previous one, whether
/// or not the condition cleared in between.
#[derive(Debug, Clone)]
pub struct AlertSession {
    state: SessionState,
    cooldown: Duration,
    raise_count: usize,
}

impl AlertSession {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: SessionState::Idle,
            cooldown,
            raise_count: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of raises so far
    pub fn raise_count(&self) -> usize {
        self.raise_count
    }

    /// Feed one poll result. Returns `true` when the alert must be raised.
    pub fn advance(&mut self, alert_active: bool, now: Instant) -> bool {
        if let SessionState::Cooldown { raised_at } = self.state {
            if now.saturating_duration_since(raised_at) >= self.cooldown {
                self.state = SessionState::Idle;
            }
        }

        match (self.state, alert_active) {
            (SessionState::Idle, true) => self.raise(now),
            (SessionState::Idle, false) => false,
            (SessionState::Alerting { raised_at }, true) => {
                if now.saturating_duration_since(raised_at) >= self.cooldown {
                    self.raise(now)
                } else {
                    false
                }
            }
            (SessionState::Alerting { raised_at }, false) => {
                self.state = SessionState::Cooldown { raised_at };
                false
            }
            (SessionState::Cooldown { raised_at }, true) => {
                self.state = SessionState::Alerting { raised_at };
                false
            }
            (SessionState::Cooldown { .. }, false) => false,
        }
    }

    fn raise(&mut self, now: Instant) -> bool {
        self.state = SessionState::Alerting { raised_at: now };
        self.raise_count += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN: Duration = Duration::from_secs(10);

    #[test]
    fn test_idle_without_alert() {
        let mut session = AlertSession::new(COOLDOWN);
        assert!(!session.advance(false, Instant::now()));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_raise_then_suppress_within_cooldown() {
        let t0 = Instant::now();
        let mut session = AlertSession::new(COOLDOWN);

        assert!(session.advance(true, t0));
        assert_eq!(session.state(), SessionState::Alerting { raised_at: t0 });

        assert!(!session.advance(true, t0 + Duration::from_secs(2)));
        assert!(!session.advance(true, t0 + Duration::from_secs(9)));
        assert_eq!(session.raise_count(), 1);
    }

    #[test]
    fn test_reraise_after_cooldown() {
        let t0 = Instant::now();
        let mut session = AlertSession::new(COOLDOWN);

        assert!(session.advance(true, t0));
        let t1 = t0 + Duration::from_secs(10);
        assert!(session.advance(true, t1));
        assert_eq!(session.state(), SessionState::Alerting { raised_at: t1 });
        assert_eq!(session.raise_count(), 2);
    }

    #[test]
    fn test_clear_enters_cooldown_then_idle() {
        let t0 = Instant::now();
        let mut session = AlertSession::new(COOLDOWN);

        session.advance(true, t0);
        assert!(!session.advance(false, t0 + Duration::from_secs(1)));
        assert_eq!(session.state().name(), "cooldown");

        assert!(!session.advance(false, t0 + Duration::from_secs(11)));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_flapping_within_cooldown_does_not_reraise() {
        let t0 = Instant::now();
        let mut session = AlertSession::new(COOLDOWN);

        assert!(session.advance(true, t0));
        assert!(!session.advance(false, t0 + Duration::from_secs(2)));
        assert!(!session.advance(true, t0 + Duration::from_secs(4)));
        assert_eq!(session.state(), SessionState::Alerting { raised_at: t0 });
    }

    #[test]
    fn test_returning_alert_after_cooldown_raises() {
        let t0 = Instant::now();
        let mut session = AlertSession::new(COOLDOWN);

        session.advance(true, t0);
        session.advance(false, t0 + Duration::from_secs(3));
        assert!(session.advance(true, t0 + Duration::from_secs(12)));
        assert_eq!(session.raise_count(), 2);
    }
}
