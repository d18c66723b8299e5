//! Stored-file API handlers, shared by capture configs and capture scripts.
//!
//! Both resources are versioned named blobs backed by the same store type;
//! the router is instantiated once per logical store and nested under its
//! own path prefix.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use platecap_core::filestore::{FileStore, FileStoreError, FileUpdate, NewFile, StoredFile};

use super::middleware::AuthIdentity;

/// Error response
#[derive(Debug, Serialize)]
pub struct FileErrorResponse {
    pub error: String,
}

fn error_response(e: FileStoreError) -> (StatusCode, Json<FileErrorResponse>) {
    let status = match &e {
        FileStoreError::NotFound(_) | FileStoreError::NameNotFound(_) => StatusCode::NOT_FOUND,
        FileStoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(FileErrorResponse {
            error: e.to_string(),
        }),
    )
}

fn forbidden() -> (StatusCode, Json<FileErrorResponse>) {
    (
        StatusCode::FORBIDDEN,
        Json(FileErrorResponse {
            error: "only the creator or an admin may modify this file".to_string(),
        }),
    )
}

/// Build the router for one logical file store.
pub fn router(store: Arc<dyn FileStore>) -> Router {
    Router::new()
        .route("/", get(list_files).post(create_file))
        .route(
            "/{id}",
            get(get_file).put(update_file).delete(delete_file),
        )
        .with_state(store)
}

async fn list_files(
    State(store): State<Arc<dyn FileStore>>,
) -> Result<Json<Vec<StoredFile>>, impl IntoResponse> {
    match store.list() {
        Ok(files) => Ok(Json(files)),
        Err(e) => Err(error_response(e)),
    }
}

async fn get_file(
    State(store): State<Arc<dyn FileStore>>,
    Path(id): Path<i64>,
) -> Result<Json<StoredFile>, impl IntoResponse> {
    match store.load(id) {
        Ok(Some(file)) => Ok(Json(file)),
        Ok(None) => Err(error_response(FileStoreError::NotFound(id))),
        Err(e) => Err(error_response(e)),
    }
}

async fn create_file(
    State(store): State<Arc<dyn FileStore>>,
    AuthIdentity(identity): AuthIdentity,
    Json(body): Json<NewFile>,
) -> Result<(StatusCode, Json<StoredFile>), impl IntoResponse> {
    match store.create(body, &identity.user_id) {
        Ok(file) => Ok((StatusCode::CREATED, Json(file))),
        Err(e) => Err(error_response(e)),
    }
}

async fn update_file(
    State(store): State<Arc<dyn FileStore>>,
    AuthIdentity(identity): AuthIdentity,
    Path(id): Path<i64>,
    Json(body): Json<FileUpdate>,
) -> Result<Json<StoredFile>, impl IntoResponse> {
    let existing = match store.load(id) {
        Ok(Some(file)) => file,
        Ok(None) => return Err(error_response(FileStoreError::NotFound(id))),
        Err(e) => return Err(error_response(e)),
    };
    if !existing.can_edit(&identity) {
        return Err(forbidden());
    }

    match store.update(id, body, &identity.user_id) {
        Ok(file) => Ok(Json(file)),
        Err(e) => Err(error_response(e)),
    }
}

async fn delete_file(
    State(store): State<Arc<dyn FileStore>>,
    AuthIdentity(identity): AuthIdentity,
    Path(id): Path<i64>,
) -> Result<StatusCode, impl IntoResponse> {
    let existing = match store.load(id) {
        Ok(Some(file)) => file,
        Ok(None) => return Err(error_response(FileStoreError::NotFound(id))),
        Err(e) => return Err(error_response(e)),
    };
    if !existing.can_edit(&identity) {
        return Err(forbidden());
    }

    match store.delete(id) {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(error_response(e)),
    }
}
