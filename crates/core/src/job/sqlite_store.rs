//! SQLite-backed capture job store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{
    CaptureConfig, CaptureJob, CaptureJobEvent, EventType, JobStatus, JobStore, JobStoreError,
};

/// SQLite-backed job store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Create a new SQLite job store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, JobStoreError> {
        let conn = Connection::open(path).map_err(|e| JobStoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite job store (useful for testing).
    pub fn in_memory() -> Result<Self, JobStoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| JobStoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS capture_job (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                create_date TEXT NOT NULL,
                created_by TEXT NOT NULL,
                source_path TEXT NOT NULL,
                capture_config TEXT NOT NULL,
                status_code TEXT NOT NULL,
                status_message TEXT
            );

            CREATE TABLE IF NOT EXISTS capture_job_event (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER NOT NULL,
                event_date TEXT NOT NULL,
                event_type TEXT NOT NULL,
                event_details TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_capture_job_create_date ON capture_job(create_date);
            CREATE INDEX IF NOT EXISTS idx_capture_job_event_job_id ON capture_job_event(job_id);
            "#,
        )
        .map_err(|e| JobStoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<CaptureJob> {
        let id: i64 = row.get(0)?;
        let create_date_str: String = row.get(1)?;
        let created_by: String = row.get(2)?;
        let source_path: String = row.get(3)?;
        let config_json: String = row.get(4)?;
        let status_str: String = row.get(5)?;
        let status_message: Option<String> = row.get(6)?;

        let create_date = DateTime::parse_from_rfc3339(&create_date_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let capture_config: CaptureConfig =
            serde_json::from_str(&config_json).unwrap_or_default();

        let status_code = JobStatus::parse(&status_str).unwrap_or(JobStatus::Error);

        Ok(CaptureJob {
            id,
            create_date,
            created_by,
            source_path,
            capture_config,
            status_code,
            status_message,
            events: Vec::new(),
        })
    }

    fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<CaptureJobEvent> {
        let job_id: i64 = row.get(0)?;
        let event_date_str: String = row.get(1)?;
        let event_type_str: String = row.get(2)?;
        let event_details: String = row.get(3)?;

        let event_date = DateTime::parse_from_rfc3339(&event_date_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let event_type = EventType::parse(&event_type_str).unwrap_or(EventType::Info);

        Ok(CaptureJobEvent {
            job_id,
            event_date,
            event_type,
            event_details,
        })
    }
}

impl JobStore for SqliteJobStore {
    fn create(
        &self,
        created_by: &str,
        source_path: &str,
        capture_config: &CaptureConfig,
    ) -> Result<CaptureJob, JobStoreError> {
        let conn = self.conn.lock().unwrap();

        let now = Utc::now();
        let config_json = serde_json::to_string(capture_config)
            .map_err(|e| JobStoreError::Serialization(e.to_string()))?;

        conn.execute(
            "INSERT INTO capture_job (create_date, created_by, source_path, capture_config, status_code) VALUES (?, ?, ?, ?, ?)",
            params![
                now.to_rfc3339(),
                created_by,
                source_path,
                config_json,
                JobStatus::Submitted.as_str(),
            ],
        )
        .map_err(|e| JobStoreError::Database(e.to_string()))?;

        let id = conn.last_insert_rowid();

        Ok(CaptureJob {
            id,
            create_date: now,
            created_by: created_by.to_string(),
            source_path: source_path.to_string(),
            capture_config: capture_config.clone(),
            status_code: JobStatus::Submitted,
            status_message: None,
            events: Vec::new(),
        })
    }

    fn get(&self, id: i64) -> Result<Option<CaptureJob>, JobStoreError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.query_row(
            "SELECT id, create_date, created_by, source_path, capture_config, status_code, status_message FROM capture_job WHERE id = ?",
            params![id],
            Self::row_to_job,
        );

        match result {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(JobStoreError::Database(e.to_string())),
        }
    }

    fn list(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CaptureJob>, JobStoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, create_date, created_by, source_path, capture_config, status_code, status_message FROM capture_job WHERE create_date BETWEEN ? AND ? ORDER BY create_date ASC",
            )
            .map_err(|e| JobStoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(
                params![from.to_rfc3339(), to.to_rfc3339()],
                Self::row_to_job,
            )
            .map_err(|e| JobStoreError::Database(e.to_string()))?;

        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row.map_err(|e| JobStoreError::Database(e.to_string()))?);
        }
        Ok(jobs)
    }

    fn update_status(
        &self,
        id: i64,
        status: JobStatus,
        message: Option<&str>,
    ) -> Result<CaptureJob, JobStoreError> {
        {
            let conn = self.conn.lock().unwrap();
            let updated = conn
                .execute(
                    "UPDATE capture_job SET status_code = ?, status_message = ? WHERE id = ?",
                    params![status.as_str(), message, id],
                )
                .map_err(|e| JobStoreError::Database(e.to_string()))?;

            if updated == 0 {
                return Err(JobStoreError::NotFound(id));
            }
        }

        self.get(id)?.ok_or(JobStoreError::NotFound(id))
    }

    fn append_event(
        &self,
        id: i64,
        event_type: EventType,
        details: &str,
    ) -> Result<(), JobStoreError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO capture_job_event (job_id, event_date, event_type, event_details) VALUES (?, ?, ?, ?)",
            params![id, Utc::now().to_rfc3339(), event_type.as_str(), details],
        )
        .map_err(|e| JobStoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn events(&self, id: i64) -> Result<Vec<CaptureJobEvent>, JobStoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT job_id, event_date, event_type, event_details FROM capture_job_event WHERE job_id = ? ORDER BY id ASC",
            )
            .map_err(|e| JobStoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![id], Self::row_to_event)
            .map_err(|e| JobStoreError::Database(e.to_string()))?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row.map_err(|e| JobStoreError::Database(e.to_string()))?);
        }
        Ok(events)
    }
}
