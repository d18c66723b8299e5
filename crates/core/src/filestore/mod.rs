//! Versioned named-blob storage for capture configurations and scripts.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteFileStore;
pub use store::{FileStore, FileStoreError};
pub use types::{
    FileUpdate, NewFile, StoredFile, CAPTURE_CONFIG_STORE, CAPTURE_SCRIPT_STORE,
};
