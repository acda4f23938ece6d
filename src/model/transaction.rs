use sqlx::{PgConnection, Postgres};

use crate::model::{ModelManager, ProgressEvent, error::DatabaseResult, events};
use crate::utils::uploads;

/// A database transaction carrying the progress events its writes produced.
///
/// Events and asset removals only run once `commit` has succeeded. Dropping
/// the transaction rolls it back and discards them.
pub struct Transaction {
    tx: sqlx::Transaction<'static, Postgres>,
    deferred: Vec<ProgressEvent>,
    stale_assets: Vec<String>,
}

impl Transaction {
    pub(crate) fn new(tx: sqlx::Transaction<'static, Postgres>) -> Self {
        Self {
            tx,
            deferred: Vec::new(),
            stale_assets: Vec::new(),
        }
    }

    pub fn conn(&mut self) -> &mut PgConnection {
        &mut *self.tx
    }

    pub fn defer(&mut self, event: ProgressEvent) {
        self.deferred.push(event);
    }

    pub fn defer_all<I: IntoIterator<Item = ProgressEvent>>(&mut self, events: I) {
        self.deferred.extend(events);
    }

    /// Path relative to the uploads directory, removed after commit.
    pub fn remove_asset_after_commit(&mut self, path: String) {
        if !path.is_empty() {
            self.stale_assets.push(path);
        }
    }

    pub async fn commit(self, mm: &ModelManager) -> DatabaseResult<()> {
        self.tx.commit().await?;

        if !self.deferred.is_empty() {
            events::dispatch(mm, self.deferred).await;
        }
        uploads::remove_assets(mm.uploads_dir(), &self.stale_assets).await;
        Ok(())
    }
}
