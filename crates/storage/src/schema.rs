//! Table definitions

/// Statements run on startup, in order. Idempotent.
pub(crate) const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS readings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        weight REAL NOT NULL,
        timestamp_ms INTEGER NOT NULL,
        room TEXT NOT NULL,
        bed TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_readings_pair ON readings (room, bed, timestamp_ms, id)",
    "CREATE INDEX IF NOT EXISTS idx_readings_time ON readings (timestamp_ms, id)",
    r#"
    CREATE TABLE IF NOT EXISTS patients (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        room TEXT NOT NULL,
        bed TEXT NOT NULL,
        name TEXT NOT NULL DEFAULT '',
        address TEXT NOT NULL DEFAULT '',
        sex TEXT NOT NULL DEFAULT '',
        age INTEGER,
        UNIQUE (room, bed)
    )
    "#,
];
