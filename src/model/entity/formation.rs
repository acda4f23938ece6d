use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::impl_paginatable_for;
use crate::model::entity::{
    Module, ModuleWrite, QuizWithQuestions, QuizWrite, Resource, ResourceWrite, Quiz,
};
use crate::model::repo::ResourceTyped;
use crate::model::{
    ModelManager, PageRequest, ProgressEvent, Transaction, error::DatabaseResult,
    repo::CrudRepository,
};
use crate::web::AuthenticatedUser;

const SELECT_FORMATION: &str = r#"
    SELECT f.*, q.id AS quiz_id
    FROM formations f
    LEFT JOIN quizzes q ON q.formation_id = f.id
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FormationStatus {
    #[default]
    Active,
    Inactive,
}

impl FormationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl From<&str> for FormationStatus {
    fn from(value: &str) -> Self {
        match value {
            "inactive" => Self::Inactive,
            _ => Self::Active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Formation {
    id: Uuid,
    title: String,
    description: String,
    status: String,
    domain_id: Option<Uuid>,
    created_by: Option<String>,
    quiz_id: Option<Uuid>,
}

/// Full formation payload. Modules keep the given order; listed content
/// replaces whatever the formation referenced before.
#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct FormationWrite {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: FormationStatus,
    pub domain_id: Option<Uuid>,
    #[serde(default)]
    pub modules: Vec<ModuleWrite>,
    #[serde(default)]
    pub resources: Vec<ResourceWrite>,
    pub quiz: Option<QuizWrite>,
}

/// Everything shown on a formation page.
#[derive(Debug, Clone)]
pub struct FormationContent {
    pub modules: Vec<Module>,
    pub resources: Vec<Resource>,
    pub quiz: Option<QuizWithQuestions>,
}

impl ResourceTyped for Formation {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Formation
    }
}

impl Formation {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn status(&self) -> FormationStatus {
        FormationStatus::from(self.status.as_str())
    }

    pub fn domain_id(&self) -> Option<Uuid> {
        self.domain_id
    }

    pub fn created_by(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    pub fn quiz_id(&self) -> Option<Uuid> {
        self.quiz_id
    }

    pub fn has_quiz(&self) -> bool {
        self.quiz_id.is_some()
    }

    pub async fn find<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> DatabaseResult<Option<Self>> {
        let row = sqlx::query_as(&format!("{SELECT_FORMATION} WHERE f.id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    /// Members of the teams attached to the formation's domain.
    pub async fn enrolled<'e, E: PgExecutor<'e>>(
        executor: E,
        formation_id: Uuid,
    ) -> DatabaseResult<Vec<String>> {
        let rows = sqlx::query_scalar(
            r#"
            SELECT DISTINCT tm.matricule
            FROM formations f
            JOIN domain_teams dt ON dt.domain_id = f.domain_id
            JOIN team_members tm ON tm.team_id = dt.team_id
            WHERE f.id = $1
            ORDER BY tm.matricule
            "#,
        )
        .bind(formation_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    async fn module_ids<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> DatabaseResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar("SELECT module_id FROM formation_modules WHERE formation_id = $1")
            .bind(id)
            .fetch_all(executor)
            .await?;
        Ok(ids)
    }

    async fn resource_ids<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> DatabaseResult<Vec<Uuid>> {
        let ids =
            sqlx::query_scalar("SELECT resource_id FROM formation_resources WHERE formation_id = $1")
                .bind(id)
                .fetch_all(executor)
                .await?;
        Ok(ids)
    }

    /// Rewrites the module, resource and quiz links of a formation.
    async fn write_content(
        conn: &mut PgConnection,
        formation_id: Uuid,
        data: FormationWrite,
    ) -> DatabaseResult<Option<Uuid>> {
        sqlx::query("DELETE FROM formation_modules WHERE formation_id = $1")
            .bind(formation_id)
            .execute(&mut *conn)
            .await?;
        for (position, module) in data.modules.into_iter().enumerate() {
            let module = Module::save(&mut *conn, module).await?;
            sqlx::query(
                r#"
                INSERT INTO formation_modules (formation_id, module_id, position)
                VALUES ($1, $2, $3)
                ON CONFLICT (formation_id, module_id) DO UPDATE SET position = EXCLUDED.position
                "#,
            )
            .bind(formation_id)
            .bind(module.id())
            .bind(position as i32)
            .execute(&mut *conn)
            .await?;
        }

        sqlx::query("DELETE FROM formation_resources WHERE formation_id = $1")
            .bind(formation_id)
            .execute(&mut *conn)
            .await?;
        for resource in data.resources {
            let resource = Resource::save(conn, resource).await?;
            sqlx::query(
                r#"
                INSERT INTO formation_resources (formation_id, resource_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(formation_id)
            .bind(resource.id())
            .execute(&mut *conn)
            .await?;
        }

        let quiz = Quiz::sync(conn, formation_id, data.quiz).await?;
        Ok(quiz.map(|q| q.id()))
    }

    /// Deletes modules and resources no formation references anymore and
    /// schedules their files for removal.
    async fn drop_orphans(
        tx: &mut Transaction,
        modules: &[Uuid],
        resources: &[Uuid],
    ) -> DatabaseResult<()> {
        for id in modules {
            if let Some(video) = Module::delete_if_orphan(tx.conn(), *id).await? {
                tx.remove_asset_after_commit(video);
            }
        }
        for id in resources {
            if let Some(file) = Resource::delete_if_orphan(tx.conn(), *id).await? {
                tx.remove_asset_after_commit(file);
            }
        }
        Ok(())
    }
}

fn removed(before: Vec<Uuid>, after: &[Uuid]) -> Vec<Uuid> {
    let kept: HashSet<&Uuid> = after.iter().collect();
    before.into_iter().filter(|id| !kept.contains(id)).collect()
}

impl FormationContent {
    pub async fn load(conn: &mut PgConnection, formation: &Formation) -> DatabaseResult<Self> {
        let modules = Module::for_formation(&mut *conn, formation.id()).await?;
        let resources = Resource::for_formation(&mut *conn, formation.id()).await?;
        let quiz = match formation.quiz_id() {
            Some(quiz_id) => match Quiz::find(&mut *conn, quiz_id).await? {
                Some(quiz) => Some(QuizWithQuestions::load(&mut *conn, quiz).await?),
                None => None,
            },
            None => None,
        };

        Ok(Self {
            modules,
            resources,
            quiz,
        })
    }

    pub fn total_estimated_seconds(&self) -> i64 {
        let quiz = self.quiz.as_ref().map_or(0, |q| q.quiz.estimated_seconds());
        self.modules
            .iter()
            .map(Module::estimated_seconds)
            .chain(self.resources.iter().map(Resource::estimated_seconds))
            .fold(quiz, i64::saturating_add)
    }
}

#[async_trait]
impl CrudRepository<Formation, FormationWrite, Uuid> for Formation {
    async fn create(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        data: FormationWrite,
    ) -> DatabaseResult<Self> {
        let mut tx = mm.begin().await?;
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO formations (id, title, description, status, domain_id, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.status.as_str())
        .bind(data.domain_id)
        .bind(actor.matricule())
        .execute(tx.conn())
        .await?;

        let formation = Formation {
            id,
            title: data.title.clone(),
            description: data.description.clone(),
            status: data.status.as_str().to_string(),
            domain_id: data.domain_id,
            created_by: Some(actor.matricule().to_string()),
            quiz_id: None,
        };
        let quiz_id = Self::write_content(tx.conn(), id, data).await?;
        tx.commit(mm).await?;

        tracing::info!(formation_id = %id, "formation created");
        Ok(Formation { quiz_id, ..formation })
    }

    async fn update(
        mut self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: FormationWrite,
    ) -> DatabaseResult<Self> {
        let mut tx = mm.begin().await?;

        let modules_before = Self::module_ids(tx.conn(), self.id).await?;
        let resources_before = Self::resource_ids(tx.conn(), self.id).await?;

        sqlx::query(
            r#"
            UPDATE formations
            SET title = $2, description = $3, status = $4, domain_id = $5
            WHERE id = $1
            "#,
        )
        .bind(self.id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.status.as_str())
        .bind(data.domain_id)
        .execute(tx.conn())
        .await?;

        self.title = data.title.clone();
        self.description = data.description.clone();
        self.status = data.status.as_str().to_string();
        self.domain_id = data.domain_id;
        self.quiz_id = Self::write_content(tx.conn(), self.id, data).await?;

        let modules_after = Self::module_ids(tx.conn(), self.id).await?;
        let resources_after = Self::resource_ids(tx.conn(), self.id).await?;
        Self::drop_orphans(
            &mut tx,
            &removed(modules_before, &modules_after),
            &removed(resources_before, &resources_after),
        )
        .await?;

        // content changed, so every stored aggregate is stale
        let learners = crate::model::entity::UserFormation::matricules_for(tx.conn(), self.id).await?;
        tx.defer_all(learners.into_iter().map(|matricule| ProgressEvent::FormationChanged {
            matricule,
            formation_id: self.id,
        }));

        tx.commit(mm).await?;
        tracing::info!(formation_id = %self.id, "formation updated");
        Ok(self)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        let mut tx = mm.begin().await?;

        let modules = Self::module_ids(tx.conn(), self.id).await?;
        let resources = Self::resource_ids(tx.conn(), self.id).await?;

        sqlx::query("DELETE FROM formations WHERE id = $1")
            .bind(self.id)
            .execute(tx.conn())
            .await?;

        Self::drop_orphans(&mut tx, &modules, &resources).await?;
        tx.commit(mm).await?;

        tracing::info!(formation_id = %self.id, "formation deleted");
        Ok(())
    }

    async fn find_by_id(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        Self::find(mm.executor(), id).await
    }

    async fn list(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        request: PageRequest,
    ) -> DatabaseResult<Vec<Self>> {
        let rows = sqlx::query_as(&format!(
            "{SELECT_FORMATION} ORDER BY f.title, f.id LIMIT $1 OFFSET $2"
        ))
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(mm.executor())
        .await?;
        Ok(rows)
    }

    async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM formations")
            .fetch_one(mm.executor())
            .await?;
        Ok(result)
    }
}

impl_paginatable_for!(Formation, FormationWrite, Uuid);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn removed_keeps_only_dropped_ids() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(removed(vec![a, b, c], &[b]), vec![a, c]);
        assert!(removed(vec![a], &[a, b]).is_empty());
    }

    #[test]
    fn status_defaults_to_active() {
        assert_eq!(FormationStatus::from("unknown"), FormationStatus::Active);
        assert_eq!(FormationStatus::from("inactive"), FormationStatus::Inactive);

        let write: FormationWrite = serde_json::from_str(r#"{"title": "Onboarding"}"#).unwrap();
        assert_eq!(write.status, FormationStatus::Active);
        assert!(write.modules.is_empty());
        assert!(write.quiz.is_none());
    }
}
