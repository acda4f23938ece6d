use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::model::entity::UserQuiz;
use crate::model::error::DatabaseResult;

/// Append-only snapshot of a quiz attempt taken before a reset.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct UserQuizHistory {
    id: Uuid,
    matricule: String,
    formation_id: Uuid,
    score: i32,
    completed_at: Option<DateTime<Utc>>,
    time_spent_seconds: i64,
    archived_at: DateTime<Utc>,
}

impl UserQuizHistory {
    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn archived_at(&self) -> DateTime<Utc> {
        self.archived_at
    }

    pub async fn archive(
        conn: &mut PgConnection,
        matricule: &str,
        formation_id: Uuid,
        attempts: &[UserQuiz],
    ) -> DatabaseResult<()> {
        for attempt in attempts {
            sqlx::query(
                r#"
                INSERT INTO user_quiz_history
                    (id, matricule, formation_id, score, completed_at, time_spent_seconds)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(matricule)
            .bind(formation_id)
            .bind(attempt.score())
            .bind(attempt.completed_at())
            .bind(attempt.time_spent_seconds())
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    pub async fn list<'e, E: PgExecutor<'e>>(
        executor: E,
        matricule: &str,
        formation_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let rows = sqlx::query_as(
            r#"
            SELECT * FROM user_quiz_history
            WHERE matricule = $1 AND formation_id = $2
            ORDER BY archived_at DESC, completed_at DESC NULLS LAST
            "#,
        )
        .bind(matricule)
        .bind(formation_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }
}
