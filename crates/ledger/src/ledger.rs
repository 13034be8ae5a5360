//! Ledger Implementation

use crate::LedgerError;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use storage::{NewReading, Reading, Repository, StorageError};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Readings kept per `(room, bed)` (default: 10)
    pub retention_depth: u32,
    /// Live feed buffer; slow subscribers lag past this many readings
    pub broadcast_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            retention_depth: 10,
            broadcast_capacity: 256,
        }
    }
}

/// Raw reading as announced to live subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveReading {
    pub room: String,
    pub bed: String,
    pub weight: f64,
}

/// Per-bed bounded reading ledger
pub struct Ledger {
    repository: Repository,
    config: LedgerConfig,
    live: broadcast::Sender<LiveReading>,
}

impl Ledger {
    /// Create a ledger over an open repository
    pub fn new(repository: Repository, config: LedgerConfig) -> Result<Self, LedgerError> {
        if config.retention_depth == 0 {
            return Err(LedgerError::InvalidRetentionDepth);
        }
        if config.broadcast_capacity == 0 {
            return Err(LedgerError::InvalidBroadcastCapacity);
        }

        info!(
            "Creating ledger (retention depth {}, broadcast capacity {})",
            config.retention_depth, config.broadcast_capacity
        );
        let (live, _) = broadcast::channel(config.broadcast_capacity);
        Ok(Self {
            repository,
            config,
            live,
        })
    }

    /// Underlying repository
    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Ledger configuration
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Subscribe to the live feed of admitted readings
    pub fn subscribe(&self) -> broadcast::Receiver<LiveReading> {
        self.live.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.live.receiver_count()
    }

    /// Admit a reading stamped with the current time
    pub async fn admit(&self, room: &str, bed: &str, weight: f64) -> Result<Reading, LedgerError> {
        self.admit_at(room, bed, weight, Utc::now()).await
    }

    /// Admit a reading stamped with `at`.
    ///
    /// The raw reading is announced before it is persisted and the
    /// announcement never fails the admission. If the insert succeeds but
    /// the trim does not, the reading stays stored and the error reports its
    /// id; the next admission for the same bed trims again.
    pub async fn admit_at(
        &self,
        room: &str,
        bed: &str,
        weight: f64,
        at: DateTime<Utc>,
    ) -> Result<Reading, LedgerError> {
        info!("Received weight {} for room {}, bed {}", weight, room, bed);
        self.announce(LiveReading {
            room: room.to_string(),
            bed: bed.to_string(),
            weight,
        });

        let mut conn = self.repository.acquire().await?;

        let reading = self
            .repository
            .insert_reading(
                &mut conn,
                &NewReading {
                    room: room.to_string(),
                    bed: bed.to_string(),
                    weight,
                    timestamp_ms: at.timestamp_millis(),
                },
            )
            .await?;
        counter!("bedwatch_readings_admitted_total").increment(1);

        match self
            .repository
            .trim_pair(&mut conn, room, bed, self.config.retention_depth)
            .await
        {
            Ok(0) => {}
            Ok(removed) => {
                debug!("Removed {} older readings for {}/{}", removed, room, bed);
                counter!("bedwatch_readings_trimmed_total").increment(removed);
            }
            Err(e) => {
                warn!("Retention trim failed for {}/{}: {}", room, bed, e);
                counter!("bedwatch_trim_failures_total").increment(1);
                return Err(StorageError::TrimFailed {
                    reading_id: reading.id,
                    reason: e.to_string(),
                }
                .into());
            }
        }

        Ok(reading)
    }

    fn announce(&self, reading: LiveReading) {
        match self.live.send(reading) {
            Ok(n) => debug!("Announced reading to {} subscribers", n),
            Err(_) => debug!("No live subscribers"),
        }
    }

    /// Most recent readings across all beds
    pub async fn recent_readings(&self, limit: u32) -> Result<Vec<Reading>, LedgerError> {
        Ok(self.repository.recent_readings(limit).await?)
    }

    /// Most recent readings of one bed
    pub async fn pair_readings(
        &self,
        room: &str,
        bed: &str,
        limit: u32,
    ) -> Result<Vec<Reading>, LedgerError> {
        Ok(self.repository.pair_readings(room, bed, limit).await?)
    }

    /// Latest reading of any bed in `room`
    pub async fn latest_for_room(&self, room: &str) -> Result<Option<Reading>, LedgerError> {
        Ok(self.repository.latest_for_room(room).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn ledger() -> Ledger {
        let repo = Repository::in_memory().await.unwrap();
        Ledger::new(repo, LedgerConfig::default()).unwrap()
    }

    fn weights(readings: &[Reading]) -> Vec<f64> {
        readings.iter().map(|r| r.weight).collect()
    }

    #[tokio::test]
    async fn test_fifteen_admissions_keep_last_ten() {
        let ledger = ledger().await;
        for w in 1..=15 {
            ledger.admit("room1", "bed1", w as f64).await.unwrap();
        }

        let readings = ledger.pair_readings("room1", "bed1", 100).await.unwrap();
        assert_eq!(
            weights(&readings),
            (6..=15).rev().map(|w| w as f64).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_retention_bound_with_explicit_times() {
        let ledger = ledger().await;
        let base = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        for i in 0..25 {
            let at = base + chrono::Duration::seconds(i);
            ledger.admit_at("room1", "bed1", i as f64, at).await.unwrap();
        }

        let readings = ledger.pair_readings("room1", "bed1", 100).await.unwrap();
        assert_eq!(readings.len(), 10);
        assert_eq!(readings[0].weight, 24.0);
        assert_eq!(readings[9].weight, 15.0);
    }

    #[tokio::test]
    async fn test_pairs_are_independent() {
        let ledger = ledger().await;
        for w in 0..4 {
            ledger.admit("room2", "bedB", w as f64).await.unwrap();
        }
        let before = ledger.pair_readings("room2", "bedB", 100).await.unwrap();

        for w in 0..30 {
            ledger.admit("room1", "bedA", w as f64).await.unwrap();
        }

        let after = ledger.pair_readings("room2", "bedB", 100).await.unwrap();
        assert_eq!(before, after);
        assert_eq!(ledger.pair_readings("room1", "bedA", 100).await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_custom_depth() {
        let repo = Repository::in_memory().await.unwrap();
        let ledger = Ledger::new(
            repo,
            LedgerConfig {
                retention_depth: 3,
                ..Default::default()
            },
        )
        .unwrap();

        for w in 0..8 {
            ledger.admit("room1", "bed1", w as f64).await.unwrap();
        }
        assert_eq!(
            weights(&ledger.pair_readings("room1", "bed1", 100).await.unwrap()),
            vec![7.0, 6.0, 5.0]
        );
    }

    #[tokio::test]
    async fn test_recent_readings_global_limit() {
        let ledger = ledger().await;
        for room in ["room1", "room2", "room3"] {
            for w in 0..6 {
                ledger.admit(room, "bed1", w as f64).await.unwrap();
            }
        }

        let readings = ledger.recent_readings(10).await.unwrap();
        assert_eq!(readings.len(), 10);
        assert!(readings
            .windows(2)
            .all(|w| (w[0].timestamp, w[0].id) > (w[1].timestamp, w[1].id)));
        assert_eq!(readings[0].room, "room3");
    }

    #[tokio::test]
    async fn test_negative_weight_stored_as_is() {
        let ledger = ledger().await;
        let reading = ledger.admit("room1", "bed1", -42.5).await.unwrap();
        assert_eq!(reading.weight, -42.5);
    }

    #[tokio::test]
    async fn test_live_subscriber_receives_raw_reading() {
        let ledger = ledger().await;
        let mut rx = ledger.subscribe();
        assert_eq!(ledger.subscriber_count(), 1);

        ledger.admit("room4", "bed2", 88.0).await.unwrap();

        let live = rx.recv().await.unwrap();
        assert_eq!(
            live,
            LiveReading {
                room: "room4".to_string(),
                bed: "bed2".to_string(),
                weight: 88.0,
            }
        );
    }

    #[tokio::test]
    async fn test_admit_without_subscribers() {
        let ledger = ledger().await;
        assert_eq!(ledger.subscriber_count(), 0);
        assert!(ledger.admit("room1", "bed1", 120.0).await.is_ok());
    }

    async fn execute(ledger: &Ledger, sql: &str) {
        let mut conn = ledger.repository().acquire().await.unwrap();
        sqlx::query(sql).execute(&mut *conn).await.unwrap();
    }

    #[tokio::test]
    async fn test_trim_failure_keeps_reading_and_next_admit_retrims() {
        let repo = Repository::in_memory().await.unwrap();
        let ledger = Ledger::new(
            repo,
            LedgerConfig {
                retention_depth: 2,
                ..Default::default()
            },
        )
        .unwrap();

        ledger.admit("room1", "bed1", 1.0).await.unwrap();
        ledger.admit("room1", "bed1", 2.0).await.unwrap();

        execute(
            &ledger,
            "CREATE TRIGGER block_trim BEFORE DELETE ON readings \
             BEGIN SELECT RAISE(ABORT, 'disk gone'); END",
        )
        .await;

        let result = ledger.admit("room1", "bed1", 3.0).await;
        match result {
            Err(LedgerError::Storage(StorageError::TrimFailed { reading_id, .. })) => {
                assert_eq!(reading_id, 3)
            }
            other => panic!("expected trim failure, got {:?}", other),
        }
        assert_eq!(ledger.repository().reading_count().await.unwrap(), 3);

        execute(&ledger, "DROP TRIGGER block_trim").await;

        ledger.admit("room1", "bed1", 4.0).await.unwrap();
        assert_eq!(
            weights(&ledger.pair_readings("room1", "bed1", 100).await.unwrap()),
            vec![4.0, 3.0]
        );
        assert_eq!(ledger.repository().reading_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let repo = Repository::in_memory().await.unwrap();
        let result = Ledger::new(
            repo,
            LedgerConfig {
                retention_depth: 0,
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(LedgerError::InvalidRetentionDepth)));
    }
}
