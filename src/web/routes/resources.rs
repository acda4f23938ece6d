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
        DatabaseError, ResourceTyped, check_resource_access,
        entity::{Resource, UserResource},
        user_has_access,
    },
    web::{
        AppState, AuthenticatedUser, RequestContext, WebError, WebResult,
        dto::resources::ResourceView, error::ErrorResponse, middlewares, routes::stream_asset,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/{id}", get(resource_get_handler))
        .route("/{id}/read", post(resource_read_handler))
        .route("/{id}/download", get(resource_download_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

fn resource_error(e: DatabaseError) -> WebError {
    WebError::from_database(Resource::get_resource_type(), e)
}

async fn find_resource(state: &AppState, id: Uuid) -> WebResult<Resource> {
    Resource::find(state.mm().executor(), id)
        .await
        .map_err(resource_error)?
        .ok_or_else(|| WebError::resource_not_found(Resource::get_resource_type()))
}

/// 404 when the resource does not exist, 403 when it exists but is closed to
/// `user`.
async fn find_accessible(
    state: &AppState,
    user: &AuthenticatedUser,
    id: Uuid,
) -> WebResult<Resource> {
    let resource = find_resource(state, id).await?;
    check_resource_access(state.mm(), &resource, user)
        .await
        .map_err(resource_error)?;
    Ok(resource)
}

#[utoipa::path(
    get,
    path = "/api/v1/resources/{id}",
    description = "Resource with the caller's access flag. `file` is only set when accessible.",
    params(("id" = Uuid, Path, description = "Resource id")),
    responses(
        (status = 200, description = "Resource found", body = ResourceView),
        (status = 401, description = "You had to be authorized to do this", body = ErrorResponse),
        (status = 404, description = "Resource not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "resources",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn resource_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let resource = find_resource(&state, id).await?;

    let accessible = user_has_access(state.mm(), &resource, user)
        .await
        .map_err(resource_error)?;
    let read = UserResource::is_read(state.mm().executor(), user.matricule(), resource.id())
        .await
        .map_err(resource_error)?;

    Ok((StatusCode::OK, Json(ResourceView::new(&resource, accessible, read))))
}

#[utoipa::path(
    post,
    path = "/api/v1/resources/{id}/read",
    description = "Marks the resource as read. Progress of every formation using it is refreshed.",
    params(("id" = Uuid, Path, description = "Resource id")),
    responses(
        (status = 200, description = "Resource marked as read", body = UserResource),
        (status = 401, description = "You had to be authorized to do this", body = ErrorResponse),
        (status = 403, description = "Confidential resource", body = ErrorResponse),
        (status = 404, description = "Resource not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "resources",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn resource_read_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let resource = find_accessible(&state, user, id).await?;

    let mark = async {
        let mut tx = state.mm().begin().await?;
        let record = UserResource::mark_read(&mut tx, user.matricule(), resource.id()).await?;
        tx.commit(state.mm()).await?;
        Ok::<_, DatabaseError>(record)
    };
    let record = mark
        .await
        .map_err(|e| WebError::from_database(UserResource::get_resource_type(), e))?;

    Ok((StatusCode::OK, Json(record)))
}

#[utoipa::path(
    get,
    path = "/api/v1/resources/{id}/download",
    description = "Streams the resource file. Access is checked before the file is opened.",
    params(("id" = Uuid, Path, description = "Resource id")),
    responses(
        (status = 200, description = "File bytes", content_type = "application/octet-stream"),
        (status = 401, description = "You had to be authorized to do this", body = ErrorResponse),
        (status = 403, description = "Confidential resource", body = ErrorResponse),
        (status = 404, description = "Resource or file not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "resources",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn resource_download_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let resource = find_accessible(&state, user, id).await?;

    stream_asset(state.uploads_dir(), resource.file(), Resource::get_resource_type()).await
}
