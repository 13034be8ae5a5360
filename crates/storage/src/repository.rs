//! Repository Implementation

use crate::schema::SCHEMA;
use crate::StorageError;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite, SqliteConnection};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// A stored weight reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: i64,
    pub weight: f64,
    pub timestamp: DateTime<Utc>,
    pub room: String,
    pub bed: String,
}

impl Reading {
    /// Timestamp in UTC epoch milliseconds, the stored ordering key
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// Row layout of the `readings` table
#[derive(Debug, FromRow)]
struct ReadingRow {
    id: i64,
    weight: f64,
    timestamp_ms: i64,
    room: String,
    bed: String,
}

impl From<ReadingRow> for Reading {
    fn from(row: ReadingRow) -> Self {
        let timestamp = Utc
            .timestamp_millis_opt(row.timestamp_ms)
            .single()
            .unwrap_or_else(|| {
                warn!(
                    "Reading {} has out-of-range timestamp {} ms, reporting the epoch",
                    row.id, row.timestamp_ms
                );
                DateTime::<Utc>::default()
            });

        Self {
            id: row.id,
            weight: row.weight,
            timestamp,
            room: row.room,
            bed: row.bed,
        }
    }
}

/// A reading about to be inserted
#[derive(Debug, Clone)]
pub struct NewReading {
    pub room: String,
    pub bed: String,
    pub weight: f64,
    pub timestamp_ms: i64,
}

/// Patient assigned to a bed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Patient {
    pub room: String,
    pub bed: String,
    pub name: String,
    pub address: String,
    pub sex: String,
    pub age: Option<i32>,
}

const READING_COLUMNS: &str = "id, weight, timestamp_ms, room, bed";

/// Repository for data access over a SQLite connection pool
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Open (creating if missing) a SQLite database and prepare the schema
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StorageError::InvalidUrl(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        info!("Opened SQLite repository at {}", url);
        let repo = Self { pool };
        repo.init_schema().await?;
        Ok(repo)
    }

    /// Create a private in-memory repository (tests, ephemeral runs)
    ///
    /// Every SQLite `:memory:` connection is its own database, so the pool
    /// is pinned to a single connection that is never recycled.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::InvalidUrl(e.to_string()))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        debug!("Creating in-memory repository");
        let repo = Self { pool };
        repo.init_schema().await?;
        Ok(repo)
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Acquire a pooled connection for a unit of work.
    ///
    /// The connection returns to the pool when the guard is dropped.
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>, StorageError> {
        Ok(self.pool.acquire().await?)
    }

    /// Insert a reading on the given connection
    pub async fn insert_reading(
        &self,
        conn: &mut SqliteConnection,
        new: &NewReading,
    ) -> Result<Reading, StorageError> {
        let result = sqlx::query(
            "INSERT INTO readings (weight, timestamp_ms, room, bed) VALUES (?, ?, ?, ?)",
        )
        .bind(new.weight)
        .bind(new.timestamp_ms)
        .bind(&new.room)
        .bind(&new.bed)
        .execute(&mut *conn)
        .await?;

        let id = result.last_insert_rowid();
        debug!("Inserted reading {} for {}/{}", id, new.room, new.bed);

        Ok(ReadingRow {
            id,
            weight: new.weight,
            timestamp_ms: new.timestamp_ms,
            room: new.room.clone(),
            bed: new.bed.clone(),
        }
        .into())
    }

    /// Delete every reading of `(room, bed)` ranked below the `depth` most
    /// recent ones, ordered by `(timestamp_ms DESC, id DESC)`.
    ///
    /// Returns the number of deleted rows.
    pub async fn trim_pair(
        &self,
        conn: &mut SqliteConnection,
        room: &str,
        bed: &str,
        depth: u32,
    ) -> Result<u64, StorageError> {
        let cutoff: Option<(i64, i64)> = sqlx::query_as(
            "SELECT timestamp_ms, id FROM readings WHERE room = ? AND bed = ? \
             ORDER BY timestamp_ms DESC, id DESC LIMIT 1 OFFSET ?",
        )
        .bind(room)
        .bind(bed)
        .bind(i64::from(depth))
        .fetch_optional(&mut *conn)
        .await?;

        let Some((cutoff_ms, cutoff_id)) = cutoff else {
            return Ok(0);
        };

        let result = sqlx::query(
            "DELETE FROM readings WHERE room = ? AND bed = ? \
             AND (timestamp_ms < ? OR (timestamp_ms = ? AND id <= ?))",
        )
        .bind(room)
        .bind(bed)
        .bind(cutoff_ms)
        .bind(cutoff_ms)
        .bind(cutoff_id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Most recent readings across all beds
    pub async fn recent_readings(&self, limit: u32) -> Result<Vec<Reading>, StorageError> {
        let rows: Vec<ReadingRow> = sqlx::query_as(&format!(
            "SELECT {READING_COLUMNS} FROM readings ORDER BY timestamp_ms DESC, id DESC LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Reading::from).collect())
    }

    /// Most recent readings of a single bed
    pub async fn pair_readings(
        &self,
        room: &str,
        bed: &str,
        limit: u32,
    ) -> Result<Vec<Reading>, StorageError> {
        let rows: Vec<ReadingRow> = sqlx::query_as(&format!(
            "SELECT {READING_COLUMNS} FROM readings WHERE room = ? AND bed = ? \
             ORDER BY timestamp_ms DESC, id DESC LIMIT ?"
        ))
        .bind(room)
        .bind(bed)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Reading::from).collect())
    }

    /// Latest reading of any bed in a room
    pub async fn latest_for_room(&self, room: &str) -> Result<Option<Reading>, StorageError> {
        let row: Option<ReadingRow> = sqlx::query_as(&format!(
            "SELECT {READING_COLUMNS} FROM readings WHERE room = ? \
             ORDER BY timestamp_ms DESC, id DESC LIMIT 1"
        ))
        .bind(room)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Reading::from))
    }

    /// Total stored readings
    pub async fn reading_count(&self) -> Result<i64, StorageError> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM readings")
            .fetch_one(&self.pool)
            .await?)
    }

    /// Create or replace the patient record of `(room, bed)`
    pub async fn upsert_patient(&self, patient: &Patient) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO patients (room, bed, name, address, sex, age) VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT (room, bed) DO UPDATE SET \
                name = excluded.name, \
                address = excluded.address, \
                sex = excluded.sex, \
                age = excluded.age",
        )
        .bind(&patient.room)
        .bind(&patient.bed)
        .bind(&patient.name)
        .bind(&patient.address)
        .bind(&patient.sex)
        .bind(patient.age)
        .execute(&self.pool)
        .await?;

        info!("Saved patient info for {}/{}", patient.room, patient.bed);
        Ok(())
    }

    /// Patient assigned to `(room, bed)`, if any
    pub async fn get_patient(&self, room: &str, bed: &str) -> Result<Option<Patient>, StorageError> {
        Ok(sqlx::query_as(
            "SELECT room, bed, name, address, sex, age FROM patients \
             WHERE room = ? AND bed = ? LIMIT 1",
        )
        .bind(room)
        .bind(bed)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Number of patient records
    pub async fn patient_count(&self) -> Result<i64, StorageError> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM patients")
            .fetch_one(&self.pool)
            .await?)
    }

    /// Number of distinct rooms with at least one patient
    pub async fn room_count(&self) -> Result<i64, StorageError> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(DISTINCT room) FROM patients")
            .fetch_one(&self.pool)
            .await?)
    }

    /// Close the pool, waiting for checked-out connections
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
