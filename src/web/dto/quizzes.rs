use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    learning::{QuestionType, format_hms, score},
    model::entity::{AnswerSubmission, QuestionWithOptions, QuizWithQuestions, UserAnswer, UserQuiz},
};

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct QuizSubmitBody {
    pub answers: Vec<AnswerSubmission>,
    #[serde(default)]
    pub time_spent_seconds: Option<i64>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct AnswerCheckBody {
    pub text_response: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AnswerCheckResponse {
    pub valid: bool,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OptionView {
    pub id: Uuid,
    pub text: String,
}

/// Question without its answer key.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct QuestionView {
    pub id: Uuid,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub point: i32,
    pub image: Option<String>,
    pub options: Vec<OptionView>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct QuizView {
    pub id: Uuid,
    pub estimated_time: String,
    pub total_points: i32,
    pub completed: bool,
    pub questions: Vec<QuestionView>,
}

impl From<&QuestionWithOptions> for QuestionView {
    fn from(value: &QuestionWithOptions) -> Self {
        Self {
            id: value.id(),
            text: value.question.text().to_string(),
            kind: value.question.kind(),
            point: value.question.point(),
            image: value.question.image().map(str::to_string),
            options: value
                .options()
                .iter()
                .map(|o| OptionView {
                    id: o.id(),
                    text: o.text().to_string(),
                })
                .collect(),
        }
    }
}

impl QuizView {
    pub fn new(quiz: &QuizWithQuestions, completed: bool) -> Self {
        Self {
            id: quiz.quiz.id(),
            estimated_time: format_hms(quiz.quiz.estimated_seconds()),
            total_points: quiz.total_points(),
            completed,
            questions: quiz.questions.iter().map(QuestionView::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AnswerDetail {
    pub question_id: Uuid,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub point: i32,
    pub earned: i32,
    pub selected_option_ids: Vec<Uuid>,
    pub text_response: Option<String>,
    pub correct_option_ids: Vec<Uuid>,
}

/// Last completed attempt of a user, question by question.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct QuizResult {
    pub quiz_id: Uuid,
    pub score: i32,
    pub total: i32,
    pub percentage: i32,
    pub time_spent_minutes: i64,
    pub completed_at: Option<DateTime<Utc>>,
    pub answers: Vec<AnswerDetail>,
}

/// Truncated towards zero, 0 for a quiz worth no points.
pub fn percentage(score: i32, total: i32) -> i32 {
    if total <= 0 {
        return 0;
    }
    let pct = i64::from(score) * 100 / i64::from(total);
    pct.clamp(0, 100) as i32
}

impl QuizResult {
    pub fn new(quiz: &QuizWithQuestions, attempt: &UserQuiz, answers: &[UserAnswer]) -> Self {
        let by_question: HashMap<Uuid, &UserAnswer> =
            answers.iter().map(|a| (a.question_id(), a)).collect();

        let details = quiz
            .questions
            .iter()
            .map(|question| {
                let answer = by_question.get(&question.id());
                let selected = answer
                    .map(|a| a.selected_option_ids().to_vec())
                    .unwrap_or_default();
                let text = answer.and_then(|a| a.text_response()).map(str::to_string);
                let earned = match answer {
                    Some(_) => score(&question.rule(), Some(selected.as_slice()), text.as_deref()),
                    None => 0,
                };
                let mut correct: Vec<Uuid> = question.correct_option_ids().into_iter().collect();
                correct.sort();

                AnswerDetail {
                    question_id: question.id(),
                    text: question.question.text().to_string(),
                    kind: question.question.kind(),
                    point: question.question.point(),
                    earned,
                    selected_option_ids: selected,
                    text_response: text,
                    correct_option_ids: correct,
                }
            })
            .collect();

        let total = quiz.total_points();
        Self {
            quiz_id: quiz.quiz.id(),
            score: attempt.score(),
            total,
            percentage: percentage(attempt.score(), total),
            time_spent_minutes: attempt.time_spent_seconds() / 60,
            completed_at: attempt.completed_at(),
            answers: details,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn percentage_truncates_and_handles_empty_quiz() {
        assert_eq!(percentage(2, 3), 66);
        assert_eq!(percentage(3, 3), 100);
        assert_eq!(percentage(0, 0), 0);
    }

    #[test]
    fn percentage_of_large_scores() {
        assert_eq!(percentage(30_000_000, 30_000_000), 100);
        assert_eq!(percentage(i32::MAX / 2, i32::MAX), 49);
    }
}
