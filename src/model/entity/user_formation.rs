use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use sqlx::types::Json;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::error::log_error;
use crate::learning::{KNOWN_STEPS, OVERVIEW_STEP, ProgressCounts, ProgressStatus};
use crate::model::entity::{
    Formation, UserAnswer, UserModule, UserQuiz, UserQuizHistory, UserResource,
};
use crate::model::error::{DatabaseError, DatabaseResult};
use crate::model::repo::ResourceTyped;
use crate::model::{ProgressEvent, Transaction};

/// Attempts copied into the history when a formation is reset.
pub const ARCHIVED_ATTEMPTS: i64 = 3;

/// Aggregate progress of one user on one formation. Created lazily, reset
/// instead of deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserFormation {
    id: Uuid,
    matricule: String,
    formation_id: Uuid,
    progress: i32,
    status: String,
    completed_steps: Json<BTreeMap<String, bool>>,
    time_spent_seconds: i64,
    last_accessed: Option<DateTime<Utc>>,
}

/// Outcome of a reset over every enrolled user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ResetSummary {
    pub reset: u32,
    pub skipped: u32,
    pub failed: u32,
}

impl ResourceTyped for UserFormation {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::UserFormation
    }
}

impl UserFormation {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn matricule(&self) -> &str {
        &self.matricule
    }

    pub fn formation_id(&self) -> Uuid {
        self.formation_id
    }

    pub fn progress(&self) -> i32 {
        self.progress
    }

    pub fn status(&self) -> ProgressStatus {
        ProgressStatus::from(self.status.as_str())
    }

    pub fn completed_steps(&self) -> &BTreeMap<String, bool> {
        &self.completed_steps
    }

    pub fn step_done(&self, step: &str) -> bool {
        self.completed_steps.get(step).copied().unwrap_or(false)
    }

    pub fn time_spent_seconds(&self) -> i64 {
        self.time_spent_seconds
    }

    pub fn last_accessed(&self) -> Option<DateTime<Utc>> {
        self.last_accessed
    }

    pub async fn find<'e, E: PgExecutor<'e>>(
        executor: E,
        matricule: &str,
        formation_id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let row = sqlx::query_as(
            "SELECT * FROM user_formations WHERE matricule = $1 AND formation_id = $2",
        )
        .bind(matricule)
        .bind(formation_id)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    /// Records of `matricule` for the given formations.
    pub async fn for_formations<'e, E: PgExecutor<'e>>(
        executor: E,
        matricule: &str,
        formation_ids: &[Uuid],
    ) -> DatabaseResult<Vec<Self>> {
        let rows = sqlx::query_as(
            "SELECT * FROM user_formations WHERE matricule = $1 AND formation_id = ANY($2)",
        )
        .bind(matricule)
        .bind(formation_ids)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    /// Users that already have a record on the formation.
    pub async fn matricules_for<'e, E: PgExecutor<'e>>(
        executor: E,
        formation_id: Uuid,
    ) -> DatabaseResult<Vec<String>> {
        let rows = sqlx::query_scalar(
            "SELECT matricule FROM user_formations WHERE formation_id = $1 ORDER BY matricule",
        )
        .bind(formation_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    /// Returns the existing record or a zero-state one.
    pub async fn get_or_create(
        conn: &mut PgConnection,
        matricule: &str,
        formation_id: Uuid,
    ) -> DatabaseResult<Self> {
        sqlx::query(
            r#"
            INSERT INTO user_formations (id, matricule, formation_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (matricule, formation_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(matricule)
        .bind(formation_id)
        .execute(&mut *conn)
        .await?;

        Self::find(&mut *conn, matricule, formation_id)
            .await?
            .ok_or(DatabaseError::SqlxError(sqlx::Error::RowNotFound))
    }

    pub async fn counts<'e, E: PgExecutor<'e>>(&self, executor: E) -> DatabaseResult<ProgressCounts> {
        let counts = sqlx::query_as(
            r#"
            SELECT
                $3::BOOLEAN AS overview_done,
                (SELECT COUNT(*) FROM formation_modules fm WHERE fm.formation_id = $1)
                    AS total_modules,
                (SELECT COUNT(*)
                    FROM formation_modules fm
                    JOIN user_modules um ON um.module_id = fm.module_id
                    WHERE fm.formation_id = $1 AND um.matricule = $2 AND um.completed)
                    AS completed_modules,
                (SELECT COUNT(*) FROM formation_resources fr WHERE fr.formation_id = $1)
                    AS total_resources,
                (SELECT COUNT(*)
                    FROM formation_resources fr
                    JOIN user_resources ur ON ur.resource_id = fr.resource_id
                    WHERE fr.formation_id = $1 AND ur.matricule = $2 AND ur.read)
                    AS completed_resources,
                EXISTS (SELECT 1 FROM quizzes q WHERE q.formation_id = $1) AS has_quiz,
                EXISTS (SELECT 1
                    FROM quizzes q
                    JOIN user_quizzes uq ON uq.quiz_id = q.id
                    WHERE q.formation_id = $1 AND uq.matricule = $2 AND uq.completed)
                    AS quiz_completed
            "#,
        )
        .bind(self.formation_id)
        .bind(&self.matricule)
        .bind(self.step_done(OVERVIEW_STEP))
        .fetch_one(executor)
        .await?;
        Ok(counts)
    }

    /// Recomputes progress and status from the completion records and
    /// persists the record. Safe to call any number of times.
    pub async fn update_progress(&mut self, conn: &mut PgConnection) -> DatabaseResult<ProgressCounts> {
        let counts = self.counts(&mut *conn).await?;

        self.progress = counts.progress();
        self.status = counts.status().to_string();

        tracing::debug!(
            matricule = %self.matricule,
            formation_id = %self.formation_id,
            overview = counts.overview_done,
            modules = format!("{}/{}", counts.completed_modules, counts.total_modules),
            resources = format!("{}/{}", counts.completed_resources, counts.total_resources),
            quiz = counts.has_quiz && counts.quiz_completed,
            progress = self.progress,
            "progress updated"
        );

        self.save(&mut *conn).await?;
        Ok(counts)
    }

    pub async fn save<'e, E: PgExecutor<'e>>(&self, executor: E) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            UPDATE user_formations SET
                progress = $2,
                status = $3,
                completed_steps = $4,
                time_spent_seconds = $5,
                last_accessed = $6
            WHERE id = $1
            "#,
        )
        .bind(self.id)
        .bind(self.progress)
        .bind(&self.status)
        .bind(&self.completed_steps)
        .bind(self.time_spent_seconds)
        .bind(self.last_accessed)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Marks a tab as completed. Only recognized tab names are accepted.
    pub fn complete_step(&mut self, step: &str, time_spent_seconds: i64) -> DatabaseResult<()> {
        if !KNOWN_STEPS.contains(&step) {
            return Err(DatabaseError::validation(format!(
                "unknown step `{step}`, expected one of {}",
                KNOWN_STEPS.join(", ")
            )));
        }

        self.completed_steps.insert(step.to_string(), true);
        self.time_spent_seconds = self.time_spent_seconds.saturating_add(time_spent_seconds.max(0));
        self.touch();
        Ok(())
    }

    pub fn touch(&mut self) {
        self.last_accessed = Some(Utc::now());
    }

    /// Archives the latest quiz attempts, deletes every completion record of
    /// the user on the formation and zeroes the aggregate.
    ///
    /// Returns the events needed to refresh formations sharing the deleted
    /// modules and resources.
    pub async fn reset(
        &mut self,
        conn: &mut PgConnection,
        formation: &Formation,
    ) -> DatabaseResult<Vec<ProgressEvent>> {
        if let Some(quiz_id) = formation.quiz_id() {
            let attempts =
                UserQuiz::latest_attempts(&mut *conn, &self.matricule, quiz_id, ARCHIVED_ATTEMPTS)
                    .await?;
            UserQuizHistory::archive(conn, &self.matricule, formation.id(), &attempts).await?;
            UserQuiz::delete_for_quiz(&mut *conn, &self.matricule, quiz_id).await?;
            UserAnswer::delete_for_quiz(&mut *conn, &self.matricule, quiz_id).await?;
        }

        let modules = UserModule::delete_for_formation(&mut *conn, &self.matricule, formation.id()).await?;
        let resources =
            UserResource::delete_for_formation(&mut *conn, &self.matricule, formation.id()).await?;

        self.progress = 0;
        self.status = ProgressStatus::New.to_string();
        self.completed_steps = Json(BTreeMap::new());
        self.time_spent_seconds = 0;
        self.last_accessed = None;
        self.save(&mut *conn).await?;

        let matricule = &self.matricule;
        let events = modules
            .into_iter()
            .map(|module_id| ProgressEvent::ModuleChanged {
                matricule: matricule.clone(),
                module_id,
            })
            .chain(resources.into_iter().map(|resource_id| ProgressEvent::ResourceChanged {
                matricule: matricule.clone(),
                resource_id,
            }))
            .collect();

        tracing::info!(matricule = %self.matricule, formation_id = %formation.id(), "formation reset");
        Ok(events)
    }

    /// Resets every enrolled user that already has a record on the
    /// formation. Each user runs in a savepoint so one failure does not undo
    /// the others.
    #[tracing::instrument(skip(tx, formation), fields(formation_id = %formation.id()))]
    pub async fn reset_all(tx: &mut Transaction, formation: &Formation) -> DatabaseResult<ResetSummary> {
        let enrolled = Formation::enrolled(tx.conn(), formation.id()).await?;
        let mut summary = ResetSummary::default();
        let mut events = Vec::new();

        for matricule in enrolled {
            let Some(mut record) = Self::find(tx.conn(), &matricule, formation.id()).await? else {
                summary.skipped += 1;
                continue;
            };

            let mut savepoint = sqlx::Connection::begin(tx.conn()).await?;
            match record.reset(&mut savepoint, formation).await {
                Ok(produced) => {
                    savepoint.commit().await?;
                    events.extend(produced);
                    summary.reset += 1;
                }
                Err(e) => {
                    log_error(&e);
                    savepoint.rollback().await?;
                    summary.failed += 1;
                }
            }
        }

        tx.defer_all(events);
        tracing::info!(
            reset = summary.reset,
            skipped = summary.skipped,
            failed = summary.failed,
            "formation reset for all enrolled users"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn fresh() -> UserFormation {
        UserFormation {
            id: Uuid::new_v4(),
            matricule: "M-0001".to_string(),
            formation_id: Uuid::new_v4(),
            progress: 0,
            status: ProgressStatus::New.as_str().to_string(),
            completed_steps: Json(BTreeMap::new()),
            time_spent_seconds: 0,
            last_accessed: None,
        }
    }

    #[test]
    fn steps_accumulate_time_without_overflowing() {
        let mut record = fresh();
        record.complete_step(OVERVIEW_STEP, 90).unwrap();
        record.complete_step(OVERVIEW_STEP, -30).unwrap();
        assert_eq!(record.time_spent_seconds, 90);
        assert!(record.last_accessed.is_some());

        record.complete_step(OVERVIEW_STEP, i64::MAX).unwrap();
        assert_eq!(record.time_spent_seconds, i64::MAX);
    }

    #[test]
    fn unknown_step_is_rejected() {
        let mut record = fresh();
        assert!(matches!(
            record.complete_step("appendix", 10),
            Err(DatabaseError::Validation(_))
        ));
        assert_eq!(record.time_spent_seconds, 0);
    }
}
