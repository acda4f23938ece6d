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
        entity::{Module, UserModule},
    },
    web::{
        AppState, RequestContext, WebError, WebResult, error::ErrorResponse, middlewares,
        routes::stream_asset,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/{id}/complete", post(module_complete_handler))
        .route("/{id}/video", get(module_video_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

async fn find_module(state: &AppState, id: Uuid) -> WebResult<Module> {
    Module::find(state.mm().executor(), id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Module::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(Module::get_resource_type()))
}

#[utoipa::path(
    post,
    path = "/api/v1/modules/{id}/complete",
    description = "Marks the module as completed. Progress of every formation using it is refreshed.",
    params(("id" = Uuid, Path, description = "Module id")),
    responses(
        (status = 200, description = "Module completed", body = UserModule),
        (status = 401, description = "You had to be authorized to do this", body = ErrorResponse),
        (status = 404, description = "Module not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "modules",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn module_complete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let module = find_module(&state, id).await?;

    let complete = async {
        let mut tx = state.mm().begin().await?;
        let record = UserModule::complete(&mut tx, user.matricule(), module.id()).await?;
        tx.commit(state.mm()).await?;
        Ok::<_, DatabaseError>(record)
    };
    let record = complete
        .await
        .map_err(|e| WebError::from_database(UserModule::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(record)))
}

#[utoipa::path(
    get,
    path = "/api/v1/modules/{id}/video",
    description = "Streams the module video",
    params(("id" = Uuid, Path, description = "Module id")),
    responses(
        (status = 200, description = "Video bytes", content_type = "application/octet-stream"),
        (status = 401, description = "You had to be authorized to do this", body = ErrorResponse),
        (status = 404, description = "Module or video not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "modules",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn module_video_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    ctx.user()?;
    let module = find_module(&state, id).await?;

    stream_asset(state.uploads_dir(), module.video(), Module::get_resource_type()).await
}
