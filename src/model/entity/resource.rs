use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::model::entity::module::estimated_seconds;
use crate::model::error::DatabaseResult;
use crate::model::repo::ResourceTyped;

/// A downloadable document attached to formations.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Resource {
    id: Uuid,
    name: String,
    file: String,
    confidential: bool,
    estimated_seconds: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ResourceWrite {
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub confidential: bool,
    /// `HH:MM:SS`
    pub estimated_time: Option<String>,
    /// Ignored unless `confidential` is set.
    #[serde(default)]
    pub allowed_teams: Vec<Uuid>,
}

impl ResourceTyped for Resource {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Resource
    }
}

impl Resource {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn confidential(&self) -> bool {
        self.confidential
    }

    pub fn estimated_seconds(&self) -> i64 {
        self.estimated_seconds
    }

    pub async fn find<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> DatabaseResult<Option<Self>> {
        let row = sqlx::query_as("SELECT * FROM resources WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    /// Inserts or updates the resource, then rewrites its allowed teams.
    pub async fn save(conn: &mut PgConnection, data: ResourceWrite) -> DatabaseResult<Self> {
        let seconds = estimated_seconds(data.estimated_time.as_deref())?;
        let resource: Resource = sqlx::query_as(
            r#"
            INSERT INTO resources (id, name, file, confidential, estimated_seconds)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                file = EXCLUDED.file,
                confidential = EXCLUDED.confidential,
                estimated_seconds = EXCLUDED.estimated_seconds
            RETURNING *
            "#,
        )
        .bind(data.id.unwrap_or_else(Uuid::new_v4))
        .bind(&data.name)
        .bind(&data.file)
        .bind(data.confidential)
        .bind(seconds)
        .fetch_one(&mut *conn)
        .await?;

        resource.set_allowed_teams(conn, &data.allowed_teams).await?;
        Ok(resource)
    }

    /// Replaces the allowed teams. A public resource always ends up with none.
    pub async fn set_allowed_teams(
        &self,
        conn: &mut PgConnection,
        teams: &[Uuid],
    ) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM resource_teams WHERE resource_id = $1")
            .bind(self.id)
            .execute(&mut *conn)
            .await?;

        if !self.confidential || teams.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO resource_teams (resource_id, team_id)
            SELECT $1, UNNEST($2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(self.id)
        .bind(teams)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Whether `matricule` belongs to one of the resource's allowed teams.
    pub async fn shares_team_with<'e, E: PgExecutor<'e>>(
        executor: E,
        resource_id: Uuid,
        matricule: &str,
    ) -> DatabaseResult<bool> {
        let found = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM resource_teams rt
                JOIN team_members tm ON tm.team_id = rt.team_id
                WHERE rt.resource_id = $1 AND tm.matricule = $2
            )
            "#,
        )
        .bind(resource_id)
        .bind(matricule)
        .fetch_one(executor)
        .await?;
        Ok(found)
    }

    pub async fn for_formation<'e, E: PgExecutor<'e>>(
        executor: E,
        formation_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let rows = sqlx::query_as(
            r#"
            SELECT r.*
            FROM resources r
            JOIN formation_resources fr ON fr.resource_id = r.id
            WHERE fr.formation_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(formation_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    pub async fn formation_ids<'e, E: PgExecutor<'e>>(
        executor: E,
        resource_id: Uuid,
    ) -> DatabaseResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar(
            "SELECT formation_id FROM formation_resources WHERE resource_id = $1",
        )
        .bind(resource_id)
        .fetch_all(executor)
        .await?;
        Ok(ids)
    }

    /// Deletes the resource if no formation references it anymore and
    /// returns its file path.
    pub async fn delete_if_orphan<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> DatabaseResult<Option<String>> {
        let file = sqlx::query_scalar(
            r#"
            DELETE FROM resources
            WHERE id = $1
              AND NOT EXISTS (SELECT 1 FROM formation_resources WHERE resource_id = $1)
            RETURNING file
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(file)
    }
}
