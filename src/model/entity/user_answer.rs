use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::model::error::DatabaseResult;
use crate::model::repo::ResourceTyped;

/// One answer of a quiz submission.
#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct AnswerSubmission {
    pub question_id: Uuid,
    #[serde(default)]
    pub selected_option_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub text_response: Option<String>,
}

/// Stored answer of a user to a question. A new submission replaces it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct UserAnswer {
    id: Uuid,
    matricule: String,
    question_id: Uuid,
    text_response: Option<String>,
    image_response: Option<String>,
    selected_option_ids: Vec<Uuid>,
}

impl ResourceTyped for UserAnswer {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::UserAnswer
    }
}

impl UserAnswer {
    pub fn question_id(&self) -> Uuid {
        self.question_id
    }

    pub fn text_response(&self) -> Option<&str> {
        self.text_response.as_deref()
    }

    pub fn selected_option_ids(&self) -> &[Uuid] {
        &self.selected_option_ids
    }

    /// Upserts the answer of `matricule` and rewrites its selected options.
    pub async fn replace(
        conn: &mut PgConnection,
        matricule: &str,
        answer: &AnswerSubmission,
    ) -> DatabaseResult<Uuid> {
        let answer_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO user_answers (id, matricule, question_id, text_response, image_response)
            VALUES ($1, $2, $3, $4, NULL)
            ON CONFLICT (matricule, question_id) DO UPDATE SET
                text_response = EXCLUDED.text_response,
                image_response = NULL
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(matricule)
        .bind(answer.question_id)
        .bind(&answer.text_response)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query("DELETE FROM user_answer_options WHERE answer_id = $1")
            .bind(answer_id)
            .execute(&mut *conn)
            .await?;

        if let Some(options) = answer.selected_option_ids.as_deref().filter(|o| !o.is_empty()) {
            sqlx::query(
                r#"
                INSERT INTO user_answer_options (answer_id, option_id)
                SELECT $1, UNNEST($2::uuid[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(answer_id)
            .bind(options)
            .execute(&mut *conn)
            .await?;
        }

        Ok(answer_id)
    }

    pub async fn for_quiz<'e, E: PgExecutor<'e>>(
        executor: E,
        matricule: &str,
        quiz_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let rows = sqlx::query_as(
            r#"
            SELECT
                ua.id,
                ua.matricule,
                ua.question_id,
                ua.text_response,
                ua.image_response,
                COALESCE(
                    array_agg(uao.option_id) FILTER (WHERE uao.option_id IS NOT NULL),
                    '{}'
                ) AS selected_option_ids
            FROM user_answers ua
            JOIN questions q ON q.id = ua.question_id
            LEFT JOIN user_answer_options uao ON uao.answer_id = ua.id
            WHERE ua.matricule = $1 AND q.quiz_id = $2
            GROUP BY ua.id
            "#,
        )
        .bind(matricule)
        .bind(quiz_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    pub async fn delete_for_quiz<'e, E: PgExecutor<'e>>(
        executor: E,
        matricule: &str,
        quiz_id: Uuid,
    ) -> DatabaseResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM user_answers ua
            USING questions q
            WHERE q.id = ua.question_id AND ua.matricule = $1 AND q.quiz_id = $2
            "#,
        )
        .bind(matricule)
        .bind(quiz_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
