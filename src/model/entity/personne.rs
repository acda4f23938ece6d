use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use sqlx::prelude::FromRow;

use crate::model::error::DatabaseResult;
use crate::model::repo::ResourceTyped;
use crate::web::UserRole;

/// An employee. Identity comes from the auth provider, keyed by `matricule`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Personne {
    matricule: String,
    first_name: String,
    last_name: String,
    role: String,
}

#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct PersonneCreate {
    pub matricule: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
}

impl ResourceTyped for Personne {
    fn get_resource_type() -> crate::model::repo::ResourceType {
        crate::model::repo::ResourceType::Personne
    }
}

impl Personne {
    pub fn matricule(&self) -> &str {
        &self.matricule
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn role(&self) -> UserRole {
        UserRole::from(self.role.as_str())
    }

    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: PersonneCreate,
    ) -> DatabaseResult<Self> {
        let row = sqlx::query_as(
            r#"
            INSERT INTO personnes (matricule, first_name, last_name, role)
            VALUES ($1, $2, $3, $4)
            RETURNING matricule, first_name, last_name, role
            "#,
        )
        .bind(&data.matricule)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(data.role.to_string())
        .fetch_one(executor)
        .await?;

        Ok(row)
    }

    pub async fn find_by_matricule<'e, E: PgExecutor<'e>>(
        executor: E,
        matricule: &str,
    ) -> DatabaseResult<Option<Self>> {
        let row = sqlx::query_as("SELECT * FROM personnes WHERE matricule = $1")
            .bind(matricule)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }
}
