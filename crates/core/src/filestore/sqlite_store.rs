//! SQLite-backed versioned file store.
//!
//! Config and script stores share the same table layout; each store instance
//! is scoped to a `store_id` discriminator.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{FileStore, FileStoreError, FileUpdate, NewFile, StoredFile};

/// SQLite-backed file store scoped to one logical store.
pub struct SqliteFileStore {
    conn: Arc<Mutex<Connection>>,
    store_id: String,
}

impl SqliteFileStore {
    /// Open (or create) the database at the given path, scoped to `store_id`.
    pub fn open(path: &Path, store_id: &str) -> Result<Self, FileStoreError> {
        let conn = Connection::open(path).map_err(|e| FileStoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            store_id: store_id.to_string(),
        })
    }

    /// In-memory store for testing.
    pub fn in_memory(store_id: &str) -> Result<Self, FileStoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| FileStoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            store_id: store_id.to_string(),
        })
    }

    /// Second store view over the same connection, scoped to another store id.
    pub fn with_store_id(&self, store_id: &str) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            store_id: store_id.to_string(),
        }
    }

    fn initialize_schema(conn: &Connection) -> Result<(), FileStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS stored_file (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                store_id TEXT NOT NULL,
                name TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 1,
                description TEXT,
                value TEXT NOT NULL,
                created_on TEXT NOT NULL,
                created_by TEXT NOT NULL,
                updated_on TEXT,
                updated_by TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_stored_file_store_name ON stored_file(store_id, name);
            "#,
        )
        .map_err(|e| FileStoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn row_to_file(row: &rusqlite::Row) -> rusqlite::Result<StoredFile> {
        let parse_date = |s: String| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now())
        };

        Ok(StoredFile {
            id: row.get(0)?,
            name: row.get(1)?,
            version: row.get(2)?,
            description: row.get(3)?,
            value: row.get(4)?,
            created_on: parse_date(row.get::<_, String>(5)?),
            created_by: row.get(6)?,
            updated_on: row.get::<_, Option<String>>(7)?.map(parse_date),
            updated_by: row.get(8)?,
        })
    }
}

const FILE_COLUMNS: &str =
    "id, name, version, description, value, created_on, created_by, updated_on, updated_by";

impl FileStore for SqliteFileStore {
    fn load(&self, id: i64) -> Result<Option<StoredFile>, FileStoreError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.query_row(
            &format!("SELECT {FILE_COLUMNS} FROM stored_file WHERE id = ? AND store_id = ?"),
            params![id, self.store_id],
            Self::row_to_file,
        );

        match result {
            Ok(file) => Ok(Some(file)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(FileStoreError::Database(e.to_string())),
        }
    }

    fn load_by_name(&self, name: &str) -> Result<Option<StoredFile>, FileStoreError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.query_row(
            &format!("SELECT {FILE_COLUMNS} FROM stored_file WHERE name = ? AND store_id = ? ORDER BY id DESC LIMIT 1"),
            params![name, self.store_id],
            Self::row_to_file,
        );

        match result {
            Ok(file) => Ok(Some(file)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(FileStoreError::Database(e.to_string())),
        }
    }

    fn create(&self, file: NewFile, created_by: &str) -> Result<StoredFile, FileStoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO stored_file (store_id, name, version, description, value, created_on, created_by) VALUES (?, ?, 1, ?, ?, ?, ?)",
            params![
                self.store_id,
                file.name,
                file.description,
                file.value,
                now.to_rfc3339(),
                created_by,
            ],
        )
        .map_err(|e| FileStoreError::Database(e.to_string()))?;

        let id = conn.last_insert_rowid();

        Ok(StoredFile {
            id,
            name: file.name,
            version: 1,
            description: file.description,
            value: file.value,
            created_on: now,
            created_by: created_by.to_string(),
            updated_on: None,
            updated_by: None,
        })
    }

    fn update(
        &self,
        id: i64,
        update: FileUpdate,
        updated_by: &str,
    ) -> Result<StoredFile, FileStoreError> {
        let existing = self.load(id)?.ok_or(FileStoreError::NotFound(id))?;

        let name = update.name.unwrap_or(existing.name);
        let description = update.description.or(existing.description);
        let value = update.value.unwrap_or(existing.value);
        let now = Utc::now();

        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "UPDATE stored_file SET name = ?, description = ?, value = ?, version = version + 1, updated_on = ?, updated_by = ? WHERE id = ? AND store_id = ?",
                params![
                    name,
                    description,
                    value,
                    now.to_rfc3339(),
                    updated_by,
                    id,
                    self.store_id,
                ],
            )
            .map_err(|e| FileStoreError::Database(e.to_string()))?;
        }

        self.load(id)?.ok_or(FileStoreError::NotFound(id))
    }

    fn delete(&self, id: i64) -> Result<(), FileStoreError> {
        let conn = self.conn.lock().unwrap();

        let deleted = conn
            .execute(
                "DELETE FROM stored_file WHERE id = ? AND store_id = ?",
                params![id, self.store_id],
            )
            .map_err(|e| FileStoreError::Database(e.to_string()))?;

        if deleted == 0 {
            return Err(FileStoreError::NotFound(id));
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<StoredFile>, FileStoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {FILE_COLUMNS} FROM stored_file WHERE store_id = ? ORDER BY name ASC"
            ))
            .map_err(|e| FileStoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![self.store_id], Self::row_to_file)
            .map_err(|e| FileStoreError::Database(e.to_string()))?;

        let mut files = Vec::new();
        for row in rows {
            files.push(row.map_err(|e| FileStoreError::Database(e.to_string()))?);
        }
        Ok(files)
    }
}
