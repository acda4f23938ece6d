use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::error::DatabaseResult;
use crate::model::repo::ResourceTyped;

/// Thematic grouping of formations. Teams attached to a domain are the
/// population enrolled in its formations.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Domain {
    id: Uuid,
    name: String,
}

impl ResourceTyped for Domain {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Domain
    }
}

impl Domain {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn create<'e, E: PgExecutor<'e>>(executor: E, name: &str) -> DatabaseResult<Self> {
        let row =
            sqlx::query_as("INSERT INTO domains (id, name) VALUES ($1, $2) RETURNING id, name")
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
        let row = sqlx::query_as("SELECT * FROM domains WHERE name = $1")
            .bind(name)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    pub async fn attach_team<'e, E: PgExecutor<'e>>(
        executor: E,
        domain_id: Uuid,
        team_id: Uuid,
    ) -> DatabaseResult<()> {
        sqlx::query(
            "INSERT INTO domain_teams (domain_id, team_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(domain_id)
        .bind(team_id)
        .execute(executor)
        .await?;
        Ok(())
    }
}
