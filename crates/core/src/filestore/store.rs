//! File storage trait.

use thiserror::Error;

use super::{FileUpdate, NewFile, StoredFile};

/// Error type for file store operations.
#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("file not found: {0}")]
    NotFound(i64),

    #[error("file not found by name: {0}")]
    NameNotFound(String),

    #[error("database error: {0}")]
    Database(String),
}

/// Trait for versioned named-blob storage.
///
/// A store instance is scoped to one logical store (configs or scripts);
/// names are unique within a store and `load_by_name` returns the current
/// version.
pub trait FileStore: Send + Sync {
    fn load(&self, id: i64) -> Result<Option<StoredFile>, FileStoreError>;

    fn load_by_name(&self, name: &str) -> Result<Option<StoredFile>, FileStoreError>;

    /// Insert a new file at version 1.
    fn create(&self, file: NewFile, created_by: &str) -> Result<StoredFile, FileStoreError>;

    /// Apply an update, bumping the version.
    fn update(
        &self,
        id: i64,
        update: FileUpdate,
        updated_by: &str,
    ) -> Result<StoredFile, FileStoreError>;

    fn delete(&self, id: i64) -> Result<(), FileStoreError>;

    fn list(&self) -> Result<Vec<StoredFile>, FileStoreError>;
}
