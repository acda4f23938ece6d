use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::post,
};
use uuid::Uuid;

use crate::{
    learning::check_answer,
    model::{
        ResourceTyped,
        entity::{Question, QuestionWithOptions},
    },
    web::{
        AppState, RequestContext, WebError, WebResult,
        dto::quizzes::{AnswerCheckBody, AnswerCheckResponse},
        error::ErrorResponse,
        middlewares,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/{id}/check", post(question_check_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/api/v1/questions/{id}/check",
    description = "Checks a free-text answer against every keyword of an image question. Other question types always answer false.",
    params(("id" = Uuid, Path, description = "Question id")),
    request_body = AnswerCheckBody,
    responses(
        (status = 200, description = "Answer checked", body = AnswerCheckResponse),
        (status = 401, description = "You had to be authorized to do this", body = ErrorResponse),
        (status = 404, description = "Question not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "quizzes",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn question_check_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<AnswerCheckBody>,
) -> WebResult<impl IntoResponse> {
    ctx.user()?;

    let question = QuestionWithOptions::find(state.mm().executor(), id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Question::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(Question::get_resource_type()))?;

    let valid = check_answer(&question.rule(), &body.text_response);
    Ok((StatusCode::OK, Json(AnswerCheckResponse { valid })))
}
