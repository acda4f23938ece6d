use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::error::DatabaseResult;
use crate::model::repo::ResourceTyped;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Team {
    id: Uuid,
    name: String,
}

impl ResourceTyped for Team {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Team
    }
}

impl Team {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn create<'e, E: PgExecutor<'e>>(executor: E, name: &str) -> DatabaseResult<Self> {
        let row = sqlx::query_as("INSERT INTO teams (id, name) VALUES ($1, $2) RETURNING id, name")
            .bind(Uuid::new_v4())
            .bind(name)
            .fetch_one(executor)
            .await?;
        Ok(row)
    }

    pub async fn find_by_name<'e, E: PgExecutor<'e>>(
        executor: E,
        name: &str,
    ) -> DatabaseResult<Option<Self>> {
        let row = sqlx::query_as("SELECT * FROM teams WHERE name = $1")
            .bind(name)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    pub async fn add_member<'e, E: PgExecutor<'e>>(
        executor: E,
        team_id: Uuid,
        matricule: &str,
    ) -> DatabaseResult<()> {
        sqlx::query(
            "INSERT INTO team_members (team_id, matricule) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(team_id)
        .bind(matricule)
        .execute(executor)
        .await?;
        Ok(())
    }
}
