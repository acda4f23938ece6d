mod access;
pub use access::{PRIVILEGED_ROLES, check_resource_access, grants_access, user_has_access};

mod database;
pub use database::DbConnection;

pub mod entity;

mod error;
pub use error::{DatabaseError, DatabaseResult};

pub mod events;
pub use events::ProgressEvent;

mod repo;
pub use repo::{CrudRepository, Page, PageRequest, PaginatableRepository, ResourceType, ResourceTyped};

mod transaction;
pub use transaction::Transaction;

use std::path::{Path, PathBuf};

use sqlx::PgPool;

#[derive(Debug, Clone)]
pub struct ModelManager {
    database: DbConnection,
    uploads_dir: PathBuf,
}

impl ModelManager {
    pub fn new(conn: DbConnection) -> Self {
        Self {
            database: conn,
            uploads_dir: PathBuf::from("uploads"),
        }
    }

    pub fn with_uploads_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.uploads_dir = dir.into();
        self
    }

    /// Root of the stored module videos and resource files.
    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn executor(&self) -> &PgPool {
        self.database.pool()
    }

    /// Opens a transaction whose progress events are dispatched after commit.
    pub async fn begin(&self) -> DatabaseResult<Transaction> {
        let tx = self.database.pool().begin().await?;
        Ok(Transaction::new(tx))
    }
}
