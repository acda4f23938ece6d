use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::model::entity::{AnswerSubmission, QuizWithQuestions, UserAnswer};
use crate::model::error::DatabaseResult;
use crate::model::repo::ResourceTyped;
use crate::model::{ProgressEvent, Transaction};

/// Live quiz attempt of a user. Archived into the history on reset.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct UserQuiz {
    id: Uuid,
    matricule: String,
    quiz_id: Uuid,
    score: i32,
    completed: bool,
    completed_at: Option<DateTime<Utc>>,
    time_spent_seconds: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct QuizScore {
    pub score: i32,
    pub total: i32,
}

impl ResourceTyped for UserQuiz {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::UserQuiz
    }
}

impl UserQuiz {
    pub fn quiz_id(&self) -> Uuid {
        self.quiz_id
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn time_spent_seconds(&self) -> i64 {
        self.time_spent_seconds
    }

    pub async fn find<'e, E: PgExecutor<'e>>(
        executor: E,
        matricule: &str,
        quiz_id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let row = sqlx::query_as("SELECT * FROM user_quizzes WHERE matricule = $1 AND quiz_id = $2")
            .bind(matricule)
            .bind(quiz_id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    /// Most recent completed attempts first.
    pub async fn latest_attempts<'e, E: PgExecutor<'e>>(
        executor: E,
        matricule: &str,
        quiz_id: Uuid,
        limit: i64,
    ) -> DatabaseResult<Vec<Self>> {
        let rows = sqlx::query_as(
            r#"
            SELECT * FROM user_quizzes
            WHERE matricule = $1 AND quiz_id = $2
            ORDER BY completed_at DESC NULLS LAST
            LIMIT $3
            "#,
        )
        .bind(matricule)
        .bind(quiz_id)
        .bind(limit)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    pub async fn delete_for_quiz<'e, E: PgExecutor<'e>>(
        executor: E,
        matricule: &str,
        quiz_id: Uuid,
    ) -> DatabaseResult<u64> {
        let result = sqlx::query("DELETE FROM user_quizzes WHERE matricule = $1 AND quiz_id = $2")
            .bind(matricule)
            .bind(quiz_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Stores a completed attempt, replacing the previous one.
    pub async fn record(
        tx: &mut Transaction,
        matricule: &str,
        quiz_id: Uuid,
        score: i32,
        time_spent_seconds: i64,
    ) -> DatabaseResult<Self> {
        let row = sqlx::query_as(
            r#"
            INSERT INTO user_quizzes (id, matricule, quiz_id, score, completed, completed_at, time_spent_seconds)
            VALUES ($1, $2, $3, $4, TRUE, NOW(), $5)
            ON CONFLICT (matricule, quiz_id) DO UPDATE SET
                score = EXCLUDED.score,
                completed = TRUE,
                completed_at = EXCLUDED.completed_at,
                time_spent_seconds = EXCLUDED.time_spent_seconds
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(matricule)
        .bind(quiz_id)
        .bind(score)
        .bind(time_spent_seconds.max(0))
        .fetch_one(tx.conn())
        .await?;

        tx.defer(ProgressEvent::QuizChanged {
            matricule: matricule.to_string(),
            quiz_id,
        });
        Ok(row)
    }

    /// Validates and grades a submission, replaces every stored answer of the
    /// quiz with the submitted ones and records the attempt.
    #[tracing::instrument(skip(tx, quiz, answers), fields(quiz_id = %quiz.quiz.id()))]
    pub async fn submit(
        tx: &mut Transaction,
        matricule: &str,
        quiz: &QuizWithQuestions,
        answers: &[AnswerSubmission],
        time_spent_seconds: i64,
    ) -> DatabaseResult<QuizScore> {
        quiz.validate_submission(answers)?;

        UserAnswer::delete_for_quiz(tx.conn(), matricule, quiz.quiz.id()).await?;
        for answer in answers {
            UserAnswer::replace(tx.conn(), matricule, answer).await?;
        }

        let score = quiz.grade(answers);
        let total = quiz.total_points();
        Self::record(tx, matricule, quiz.quiz.id(), score, time_spent_seconds).await?;

        tracing::info!(score, total, "quiz submitted");
        Ok(QuizScore { score, total })
    }
}
