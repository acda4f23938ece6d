use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::learning::parse_hms;
use crate::model::error::{DatabaseError, DatabaseResult};
use crate::model::repo::ResourceTyped;

/// A video chapter. Modules can be shared between formations.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Module {
    id: Uuid,
    title: String,
    description: String,
    video: String,
    estimated_seconds: i64,
}

/// Nested module payload of a formation write. An `id` updates the existing
/// module in place, otherwise a new one is created.
#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ModuleWrite {
    pub id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub video: String,
    /// `HH:MM:SS`
    pub estimated_time: Option<String>,
}

impl ResourceTyped for Module {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Module
    }
}

/// Shared by module and resource writes.
pub(crate) fn estimated_seconds(value: Option<&str>) -> DatabaseResult<i64> {
    match value {
        None => Ok(0),
        Some(raw) => parse_hms(raw).ok_or_else(|| {
            DatabaseError::validation(format!("invalid duration `{raw}`, expected HH:MM:SS"))
        }),
    }
}

impl Module {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn video(&self) -> &str {
        &self.video
    }

    pub fn estimated_seconds(&self) -> i64 {
        self.estimated_seconds
    }

    pub async fn find<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> DatabaseResult<Option<Self>> {
        let row = sqlx::query_as("SELECT * FROM modules WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    /// Inserts or updates the module described by `data`.
    pub async fn save<'e, E: PgExecutor<'e>>(executor: E, data: ModuleWrite) -> DatabaseResult<Self> {
        let seconds = estimated_seconds(data.estimated_time.as_deref())?;
        let row = sqlx::query_as(
            r#"
            INSERT INTO modules (id, title, description, video, estimated_seconds)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                video = EXCLUDED.video,
                estimated_seconds = EXCLUDED.estimated_seconds
            RETURNING *
            "#,
        )
        .bind(data.id.unwrap_or_else(Uuid::new_v4))
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.video)
        .bind(seconds)
        .fetch_one(executor)
        .await?;
        Ok(row)
    }

    /// Modules of a formation, in display order.
    pub async fn for_formation<'e, E: PgExecutor<'e>>(
        executor: E,
        formation_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let rows = sqlx::query_as(
            r#"
            SELECT m.*
            FROM modules m
            JOIN formation_modules fm ON fm.module_id = m.id
            WHERE fm.formation_id = $1
            ORDER BY fm.position, m.title
            "#,
        )
        .bind(formation_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    pub async fn formation_ids<'e, E: PgExecutor<'e>>(
        executor: E,
        module_id: Uuid,
    ) -> DatabaseResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar(
            "SELECT formation_id FROM formation_modules WHERE module_id = $1",
        )
        .bind(module_id)
        .fetch_all(executor)
        .await?;
        Ok(ids)
    }

    /// Deletes the module if no formation references it anymore and returns
    /// its video path.
    pub async fn delete_if_orphan<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> DatabaseResult<Option<String>> {
        let video = sqlx::query_scalar(
            r#"
            DELETE FROM modules
            WHERE id = $1
              AND NOT EXISTS (SELECT 1 FROM formation_modules WHERE module_id = $1)
            RETURNING video
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(video)
    }
}
