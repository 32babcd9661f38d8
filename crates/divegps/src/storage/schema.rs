//! `SQLite` schema definitions for divegps.

/// SQL statement to create the location records table.
///
/// `timestamp` holds epoch milliseconds; `sent` is 0 or 1.
pub const CREATE_RECORDS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS location_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    timestamp INTEGER NOT NULL,
    name TEXT NOT NULL DEFAULT '',
    sent INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL statement to create an index on the sent flag for the pending query.
pub const CREATE_SENT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_location_records_sent ON location_records(sent)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_RECORDS_TABLE,
    CREATE_SENT_INDEX,
    CREATE_METADATA_TABLE,
];
