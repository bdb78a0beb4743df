use mlib_core::blob::BlobStore;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Shared per-process state handed to every request.
pub struct BackendContext {
    pub db: DatabaseConnection,
    pub blobs: Arc<dyn BlobStore>,
}

impl BackendContext {
    pub fn new(db: DatabaseConnection, blobs: Arc<dyn BlobStore>) -> Self {
        Self { db, blobs }
    }
}
