use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{partition_for, EmissionError, EventLog, LogEntry, LogMessage, LogPosition};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS log_entries (
        topic TEXT NOT NULL,
        "partition" INTEGER NOT NULL,
        "offset" INTEGER NOT NULL,
        "key" TEXT NOT NULL,
        payload TEXT NOT NULL,
        appended_at INTEGER NOT NULL,
        PRIMARY KEY (topic, "partition", "offset")
    );

    CREATE INDEX IF NOT EXISTS idx_log_entries_key ON log_entries(topic, "key", "offset");

    CREATE VIEW IF NOT EXISTS compacted_view AS
        SELECT e.* FROM log_entries e
        WHERE e."offset" = (
            SELECT MAX(l."offset") FROM log_entries l
            WHERE l.topic = e.topic AND l."partition" = e."partition" AND l."key" = e."key"
        );
"#;

/// SQLite-backed compacted log
pub struct SqliteEventLog {
    conn: Mutex<Connection>,
    partitions: u32,
}

impl SqliteEventLog {
    /// Open (or create) the log database at `path`
    pub fn new(path: &Path, partitions: u32) -> Result<Self, EmissionError> {
        let conn = Connection::open(path).map_err(|e| EmissionError::Storage(e.to_string()))?;
        Self::with_connection(conn, partitions)
    }

    /// Create an in-memory SQLite log (useful for testing)
    pub fn in_memory(partitions: u32) -> Result<Self, EmissionError> {
        let conn =
            Connection::open_in_memory().map_err(|e| EmissionError::Storage(e.to_string()))?;
        Self::with_connection(conn, partitions)
    }

    fn with_connection(conn: Connection, partitions: u32) -> Result<Self, EmissionError> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| EmissionError::Storage(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            partitions: partitions.max(1),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, EmissionError> {
        self.conn
            .lock()
            .map_err(|_| EmissionError::Storage("connection lock poisoned".to_string()))
    }

    fn query_entries(&self, sql: &str, topic: &str) -> Result<Vec<LogEntry>, EmissionError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| EmissionError::Storage(e.to_string()))?;
        let rows = stmt
            .query_map(params![topic], |row| {
                Ok(LogEntry {
                    topic: row.get(0)?,
                    partition: row.get(1)?,
                    offset: row.get::<_, i64>(2)? as u64,
                    key: row.get(3)?,
                    payload: row.get(4)?,
                    appended_at_ms: row.get(5)?,
                })
            })
            .map_err(|e| EmissionError::Storage(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| EmissionError::Storage(e.to_string()))
    }

    /// Every entry on a topic, partition by partition in offset order.
    pub fn entries(&self, topic: &str) -> Result<Vec<LogEntry>, EmissionError> {
        self.query_entries(
            r#"SELECT topic, "partition", "offset", "key", payload, appended_at
               FROM log_entries WHERE topic = ?1 ORDER BY "partition", "offset""#,
            topic,
        )
    }

    /// Latest entry per key, ordered by key.
    pub fn compacted(&self, topic: &str) -> Result<Vec<LogEntry>, EmissionError> {
        self.query_entries(
            r#"SELECT topic, "partition", "offset", "key", payload, appended_at
               FROM compacted_view WHERE topic = ?1 ORDER BY "key""#,
            topic,
        )
    }
}

#[async_trait]
impl EventLog for SqliteEventLog {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(&self, message: LogMessage) -> Result<LogPosition, EmissionError> {
        let partition = partition_for(&message.key, self.partitions);
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| EmissionError::Storage(e.to_string()))?;

        let last: Option<i64> = tx
            .query_row(
                r#"SELECT MAX("offset") FROM log_entries WHERE topic = ?1 AND "partition" = ?2"#,
                params![message.topic, partition],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| EmissionError::Storage(e.to_string()))?
            .flatten();
        let offset = last.map_or(0, |o| o + 1);

        tx.execute(
            r#"INSERT INTO log_entries (topic, "partition", "offset", "key", payload, appended_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                message.topic,
                partition,
                offset,
                message.key,
                message.payload,
                Utc::now().timestamp_millis(),
            ],
        )
        .map_err(|e| EmissionError::Storage(e.to_string()))?;
        tx.commit()
            .map_err(|e| EmissionError::Storage(e.to_string()))?;

        Ok(LogPosition {
            topic: message.topic,
            partition,
            offset: offset as u64,
        })
    }
}
