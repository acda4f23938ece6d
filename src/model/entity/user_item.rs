//! Per-user completion flags of formation items.

use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::error::DatabaseResult;
use crate::model::repo::ResourceTyped;
use crate::model::{ProgressEvent, Transaction};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct UserModule {
    id: Uuid,
    matricule: String,
    module_id: Uuid,
    completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct UserResource {
    id: Uuid,
    matricule: String,
    resource_id: Uuid,
    read: bool,
}

impl ResourceTyped for UserModule {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::UserModule
    }
}

impl ResourceTyped for UserResource {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::UserResource
    }
}

impl UserModule {
    pub fn module_id(&self) -> Uuid {
        self.module_id
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    pub async fn complete(
        tx: &mut Transaction,
        matricule: &str,
        module_id: Uuid,
    ) -> DatabaseResult<Self> {
        let row = sqlx::query_as(
            r#"
            INSERT INTO user_modules (id, matricule, module_id, completed)
            VALUES ($1, $2, $3, TRUE)
            ON CONFLICT (matricule, module_id) DO UPDATE SET completed = TRUE
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(matricule)
        .bind(module_id)
        .fetch_one(tx.conn())
        .await?;

        tx.defer(ProgressEvent::ModuleChanged {
            matricule: matricule.to_string(),
            module_id,
        });
        Ok(row)
    }

    /// Completed module ids of `matricule` within a formation.
    pub async fn completed_ids<'e, E: PgExecutor<'e>>(
        executor: E,
        matricule: &str,
        formation_id: Uuid,
    ) -> DatabaseResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar(
            r#"
            SELECT um.module_id
            FROM user_modules um
            JOIN formation_modules fm ON fm.module_id = um.module_id
            WHERE um.matricule = $1 AND fm.formation_id = $2 AND um.completed
            "#,
        )
        .bind(matricule)
        .bind(formation_id)
        .fetch_all(executor)
        .await?;
        Ok(ids)
    }

    /// Deletes the rows of the formation's modules and returns their ids.
    pub async fn delete_for_formation<'e, E: PgExecutor<'e>>(
        executor: E,
        matricule: &str,
        formation_id: Uuid,
    ) -> DatabaseResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar(
            r#"
            DELETE FROM user_modules um
            USING formation_modules fm
            WHERE fm.module_id = um.module_id AND um.matricule = $1 AND fm.formation_id = $2
            RETURNING um.module_id
            "#,
        )
        .bind(matricule)
        .bind(formation_id)
        .fetch_all(executor)
        .await?;
        Ok(ids)
    }
}

impl UserResource {
    pub fn resource_id(&self) -> Uuid {
        self.resource_id
    }

    pub fn read(&self) -> bool {
        self.read
    }

    pub async fn mark_read(
        tx: &mut Transaction,
        matricule: &str,
        resource_id: Uuid,
    ) -> DatabaseResult<Self> {
        let row = sqlx::query_as(
            r#"
            INSERT INTO user_resources (id, matricule, resource_id, read)
            VALUES ($1, $2, $3, TRUE)
            ON CONFLICT (matricule, resource_id) DO UPDATE SET read = TRUE
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(matricule)
        .bind(resource_id)
        .fetch_one(tx.conn())
        .await?;

        tx.defer(ProgressEvent::ResourceChanged {
            matricule: matricule.to_string(),
            resource_id,
        });
        Ok(row)
    }

    pub async fn is_read<'e, E: PgExecutor<'e>>(
        executor: E,
        matricule: &str,
        resource_id: Uuid,
    ) -> DatabaseResult<bool> {
        let read = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM user_resources
                WHERE matricule = $1 AND resource_id = $2 AND read
            )
            "#,
        )
        .bind(matricule)
        .bind(resource_id)
        .fetch_one(executor)
        .await?;
        Ok(read)
    }

    pub async fn read_ids<'e, E: PgExecutor<'e>>(
        executor: E,
        matricule: &str,
        formation_id: Uuid,
    ) -> DatabaseResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar(
            r#"
            SELECT ur.resource_id
            FROM user_resources ur
            JOIN formation_resources fr ON fr.resource_id = ur.resource_id
            WHERE ur.matricule = $1 AND fr.formation_id = $2 AND ur.read
            "#,
        )
        .bind(matricule)
        .bind(formation_id)
        .fetch_all(executor)
        .await?;
        Ok(ids)
    }

    pub async fn delete_for_formation<'e, E: PgExecutor<'e>>(
        executor: E,
        matricule: &str,
        formation_id: Uuid,
    ) -> DatabaseResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar(
            r#"
            DELETE FROM user_resources ur
            USING formation_resources fr
            WHERE fr.resource_id = ur.resource_id AND ur.matricule = $1 AND fr.formation_id = $2
            RETURNING ur.resource_id
            "#,
        )
        .bind(matricule)
        .bind(formation_id)
        .fetch_all(executor)
        .await?;
        Ok(ids)
    }
}
