use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use sqlx::types::Json;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::learning::{QuestionRule, QuestionType, score};
use crate::model::entity::AnswerSubmission;
use crate::model::entity::module::estimated_seconds;
use crate::model::error::{DatabaseError, DatabaseResult};
use crate::model::repo::ResourceTyped;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Quiz {
    id: Uuid,
    formation_id: Uuid,
    estimated_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Question {
    id: Uuid,
    quiz_id: Uuid,
    text: String,
    kind: String,
    point: i32,
    image: Option<String>,
    correct_keywords: Json<Vec<String>>,
    position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct QuestionOption {
    id: Uuid,
    question_id: Uuid,
    text: String,
    is_correct: bool,
    position: i32,
}

/// A question with its options, loaded in one round-trip.
#[derive(Debug, Clone, FromRow)]
pub struct QuestionWithOptions {
    #[sqlx(flatten)]
    pub question: Question,
    pub options: Json<Vec<QuestionOption>>,
}

#[derive(Debug, Clone)]
pub struct QuizWithQuestions {
    pub quiz: Quiz,
    pub questions: Vec<QuestionWithOptions>,
}

#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct QuizWrite {
    /// `HH:MM:SS`
    pub estimated_time: Option<String>,
    #[serde(default)]
    pub questions: Vec<QuestionWrite>,
}

#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct QuestionWrite {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    #[serde(default = "default_point")]
    pub point: i32,
    pub image: Option<String>,
    #[serde(default)]
    pub correct_keywords: Vec<String>,
    #[serde(default)]
    pub options: Vec<OptionWrite>,
}

#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct OptionWrite {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

fn default_point() -> i32 {
    1
}

/// Upper bound of a single question's point value.
pub const MAX_POINT: i32 = 1000;

impl QuestionWrite {
    fn validate(&self) -> DatabaseResult<()> {
        if !(0..=MAX_POINT).contains(&self.point) {
            return Err(DatabaseError::validation(format!(
                "question `{}` must be worth between 0 and {MAX_POINT} points",
                self.text
            )));
        }
        if self.kind == QuestionType::Unknown {
            return Err(DatabaseError::validation(format!(
                "question `{}` has an unsupported type",
                self.text
            )));
        }
        Ok(())
    }
}

impl ResourceTyped for Quiz {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Quiz
    }
}

impl ResourceTyped for Question {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Question
    }
}

impl Quiz {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn formation_id(&self) -> Uuid {
        self.formation_id
    }

    pub fn estimated_seconds(&self) -> i64 {
        self.estimated_seconds
    }

    pub async fn find<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> DatabaseResult<Option<Self>> {
        let row = sqlx::query_as("SELECT * FROM quizzes WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    /// Formation owning the quiz, `None` when the quiz does not exist.
    pub async fn formation_id_of<'e, E: PgExecutor<'e>>(
        executor: E,
        quiz_id: Uuid,
    ) -> DatabaseResult<Option<Uuid>> {
        let id = sqlx::query_scalar("SELECT formation_id FROM quizzes WHERE id = $1")
            .bind(quiz_id)
            .fetch_optional(executor)
            .await?;
        Ok(id)
    }

    /// Makes the quiz of `formation_id` match `data`. Questions are rewritten
    /// from scratch; `None` removes the quiz.
    pub async fn sync(
        conn: &mut PgConnection,
        formation_id: Uuid,
        data: Option<QuizWrite>,
    ) -> DatabaseResult<Option<Self>> {
        let Some(data) = data else {
            sqlx::query("DELETE FROM quizzes WHERE formation_id = $1")
                .bind(formation_id)
                .execute(&mut *conn)
                .await?;
            return Ok(None);
        };

        let seconds = estimated_seconds(data.estimated_time.as_deref())?;

        let quiz: Quiz = sqlx::query_as(
            r#"
            INSERT INTO quizzes (id, formation_id, estimated_seconds)
            VALUES ($1, $2, $3)
            ON CONFLICT (formation_id) DO UPDATE SET estimated_seconds = EXCLUDED.estimated_seconds
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(formation_id)
        .bind(seconds)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query("DELETE FROM questions WHERE quiz_id = $1")
            .bind(quiz.id)
            .execute(&mut *conn)
            .await?;

        for (position, question) in data.questions.into_iter().enumerate() {
            Question::insert(conn, quiz.id, position as i32, question).await?;
        }

        Ok(Some(quiz))
    }
}

impl Question {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn quiz_id(&self) -> Uuid {
        self.quiz_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> QuestionType {
        QuestionType::from(self.kind.as_str())
    }

    pub fn point(&self) -> i32 {
        self.point
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn keywords(&self) -> &[String] {
        &self.correct_keywords
    }

    async fn insert(
        conn: &mut PgConnection,
        quiz_id: Uuid,
        position: i32,
        data: QuestionWrite,
    ) -> DatabaseResult<()> {
        data.validate()?;

        let question_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO questions (id, quiz_id, text, kind, point, image, correct_keywords, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(question_id)
        .bind(quiz_id)
        .bind(&data.text)
        .bind(data.kind.as_str())
        .bind(data.point)
        .bind(&data.image)
        .bind(Json(&data.correct_keywords))
        .bind(position)
        .execute(&mut *conn)
        .await?;

        for (position, option) in data.options.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO question_options (id, question_id, text, is_correct, position)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(question_id)
            .bind(&option.text)
            .bind(option.is_correct)
            .bind(position as i32)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }
}

impl QuestionOption {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn question_id(&self) -> Uuid {
        self.question_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_correct(&self) -> bool {
        self.is_correct
    }
}

impl QuestionWithOptions {
    pub fn id(&self) -> Uuid {
        self.question.id
    }

    pub fn options(&self) -> &[QuestionOption] {
        &self.options
    }

    pub fn correct_option_ids(&self) -> HashSet<Uuid> {
        self.options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.id)
            .collect()
    }

    pub fn rule(&self) -> QuestionRule {
        QuestionRule {
            kind: self.question.kind(),
            point: self.question.point,
            correct_options: self.correct_option_ids(),
            keywords: self.question.correct_keywords.0.clone(),
        }
    }

    pub async fn find<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> DatabaseResult<Option<Self>> {
        let row = sqlx::query_as(&questions_query("q.id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }
}

fn questions_query(filter: &str) -> String {
    format!(
        r#"
        SELECT
            q.*,
            COALESCE(
                json_agg(
                    json_build_object(
                        'id', o.id,
                        'question_id', o.question_id,
                        'text', o.text,
                        'is_correct', o.is_correct,
                        'position', o.position
                    ) ORDER BY o.position
                ) FILTER (WHERE o.id IS NOT NULL),
                '[]'
            ) AS options
        FROM questions q
        LEFT JOIN question_options o ON o.question_id = q.id
        WHERE {filter}
        GROUP BY q.id
        ORDER BY q.position
        "#
    )
}

impl QuizWithQuestions {
    pub async fn load<'e, E: PgExecutor<'e>>(executor: E, quiz: Quiz) -> DatabaseResult<Self> {
        let questions = sqlx::query_as(&questions_query("q.quiz_id = $1"))
            .bind(quiz.id)
            .fetch_all(executor)
            .await?;
        Ok(Self { quiz, questions })
    }

    pub fn question(&self, id: Uuid) -> Option<&QuestionWithOptions> {
        self.questions.iter().find(|q| q.id() == id)
    }

    pub fn total_points(&self) -> i32 {
        self.questions
            .iter()
            .fold(0i32, |total, q| total.saturating_add(q.question.point))
    }

    /// Rejects answers to questions of another quiz and options of another
    /// question.
    pub fn validate_submission(&self, answers: &[AnswerSubmission]) -> DatabaseResult<()> {
        for answer in answers {
            let question = self.question(answer.question_id).ok_or_else(|| {
                DatabaseError::validation(format!(
                    "question {} does not belong to quiz {}",
                    answer.question_id, self.quiz.id
                ))
            })?;

            let known: HashSet<Uuid> = question.options.iter().map(|o| o.id).collect();
            if let Some(option_id) = answer
                .selected_option_ids
                .iter()
                .flatten()
                .find(|id| !known.contains(*id))
            {
                return Err(DatabaseError::validation(format!(
                    "option {option_id} does not belong to question {}",
                    answer.question_id
                )));
            }
        }
        Ok(())
    }

    /// Sum of the points earned by `answers`. Unanswered questions earn
    /// nothing, and the last answer wins when a question is repeated.
    pub fn grade(&self, answers: &[AnswerSubmission]) -> i32 {
        let by_question: HashMap<Uuid, &AnswerSubmission> =
            answers.iter().map(|a| (a.question_id, a)).collect();

        self.questions
            .iter()
            .filter_map(|question| {
                let answer = by_question.get(&question.id())?;
                Some(score(
                    &question.rule(),
                    answer.selected_option_ids.as_deref(),
                    answer.text_response.as_deref(),
                ))
            })
            .fold(0i32, i32::saturating_add)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn question(point: i32, kind: QuestionType) -> QuestionWrite {
        QuestionWrite {
            text: "Which colour?".to_string(),
            kind,
            point,
            image: None,
            correct_keywords: Vec::new(),
            options: Vec::new(),
        }
    }

    fn quiz_worth(points: &[i32]) -> QuizWithQuestions {
        let quiz_id = Uuid::new_v4();
        let questions = points
            .iter()
            .enumerate()
            .map(|(position, point)| QuestionWithOptions {
                question: Question {
                    id: Uuid::new_v4(),
                    quiz_id,
                    text: format!("q{position}"),
                    kind: QuestionType::Text.as_str().to_string(),
                    point: *point,
                    image: None,
                    correct_keywords: Json(vec!["alpha".to_string()]),
                    position: position as i32,
                },
                options: Json(Vec::new()),
            })
            .collect();

        QuizWithQuestions {
            quiz: Quiz {
                id: quiz_id,
                formation_id: Uuid::new_v4(),
                estimated_seconds: 0,
            },
            questions,
        }
    }

    #[test]
    fn point_values_are_bounded() {
        assert!(question(0, QuestionType::Text).validate().is_ok());
        assert!(question(MAX_POINT, QuestionType::SingleChoice).validate().is_ok());
        assert!(matches!(
            question(MAX_POINT + 1, QuestionType::Text).validate(),
            Err(DatabaseError::Validation(_))
        ));
        assert!(question(-1, QuestionType::Text).validate().is_err());
        assert!(question(1, QuestionType::Unknown).validate().is_err());
    }

    #[test]
    fn totals_saturate_instead_of_wrapping() {
        assert_eq!(quiz_worth(&[1, 2]).total_points(), 3);
        assert_eq!(quiz_worth(&[i32::MAX, i32::MAX]).total_points(), i32::MAX);

        let quiz = quiz_worth(&[i32::MAX, i32::MAX]);
        let answers: Vec<AnswerSubmission> = quiz
            .questions
            .iter()
            .map(|q| AnswerSubmission {
                question_id: q.id(),
                selected_option_ids: None,
                text_response: Some("alpha".to_string()),
            })
            .collect();
        assert_eq!(quiz.grade(&answers), i32::MAX);
    }
}
