use std::path::Path;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::model::error::DatabaseResult;

const MAX_CONNECTIONS: u32 = 10;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle on the postgres pool. Cloning shares the pool.
#[derive(Debug, Clone)]
pub struct DbConnection {
    pool: PgPool,
}

impl DbConnection {
    /// Builds the pool without connecting; the first query opens a connection.
    pub fn connect(connection_str: &str) -> DatabaseResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_lazy(connection_str)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self, dir: &Path) -> DatabaseResult<()> {
        let migrator = sqlx::migrate::Migrator::new(dir).await?;
        migrator.run(&self.pool).await?;
        tracing::info!(
            known = migrator.iter().count(),
            dir = %dir.display(),
            "migrations up to date"
        );
        Ok(())
    }
}
