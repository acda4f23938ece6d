use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    model::{
        DatabaseError, ResourceTyped,
        entity::{Quiz, QuizScore, QuizWithQuestions, UserAnswer, UserQuiz},
    },
    web::{
        AppState, RequestContext, WebError, WebResult,
        dto::quizzes::{QuizResult, QuizSubmitBody},
        error::ErrorResponse,
        middlewares,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/{id}/submit", post(quiz_submit_handler))
        .route("/{id}/results", get(quiz_results_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

fn quiz_error(e: DatabaseError) -> WebError {
    WebError::from_database(Quiz::get_resource_type(), e)
}

async fn load_quiz(state: &AppState, id: Uuid) -> WebResult<QuizWithQuestions> {
    let quiz = Quiz::find(state.mm().executor(), id)
        .await
        .map_err(quiz_error)?
        .ok_or_else(|| WebError::resource_not_found(Quiz::get_resource_type()))?;

    QuizWithQuestions::load(state.mm().executor(), quiz)
        .await
        .map_err(quiz_error)
}

#[utoipa::path(
    post,
    path = "/api/v1/quizzes/{id}/submit",
    description = "Grades a quiz submission. Answers are replaced and the attempt overwrites the previous one.",
    params(("id" = Uuid, Path, description = "Quiz id")),
    request_body = QuizSubmitBody,
    responses(
        (status = 200, description = "Submission graded", body = QuizScore),
        (status = 400, description = "An answer references a foreign question or option", body = ErrorResponse),
        (status = 401, description = "You had to be authorized to do this", body = ErrorResponse),
        (status = 404, description = "Quiz not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "quizzes",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn quiz_submit_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<QuizSubmitBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let quiz = load_quiz(&state, id).await?;

    let submit = async {
        let mut tx = state.mm().begin().await?;
        let score = UserQuiz::submit(
            &mut tx,
            user.matricule(),
            &quiz,
            &body.answers,
            body.time_spent_seconds.unwrap_or_default(),
        )
        .await?;
        tx.commit(state.mm()).await?;
        Ok::<_, DatabaseError>(score)
    };
    let score = submit
        .await
        .map_err(|e| WebError::from_database(UserQuiz::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(score)))
}

#[utoipa::path(
    get,
    path = "/api/v1/quizzes/{id}/results",
    description = "Last completed attempt of the caller with per-question detail",
    params(("id" = Uuid, Path, description = "Quiz id")),
    responses(
        (status = 200, description = "Attempt found", body = QuizResult),
        (status = 401, description = "You had to be authorized to do this", body = ErrorResponse),
        (status = 404, description = "Quiz not found or never completed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "quizzes",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn quiz_results_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let quiz = load_quiz(&state, id).await?;

    let attempt = UserQuiz::find(state.mm().executor(), user.matricule(), id)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserQuiz::get_resource_type(), e))?
        .filter(UserQuiz::completed)
        .ok_or_else(|| WebError::resource_not_found(UserQuiz::get_resource_type()))?;

    let answers = UserAnswer::for_quiz(state.mm().executor(), user.matricule(), id)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserAnswer::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(QuizResult::new(&quiz, &attempt, &answers))))
}
