use std::collections::{HashMap, HashSet};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    learning::format_hms,
    model::{
        CrudRepository, DatabaseError, DatabaseResult, ModelManager, Page, PaginatableRepository, ResourceTyped,
        entity::{
            Formation, FormationContent, FormationWrite, Personne, ResetSummary, UserAnswer,
            UserFormation, UserModule, UserQuiz, UserQuizHistory, UserResource,
        },
        user_has_access,
    },
    web::{
        AppState, AuthenticatedUser, RequestContext, WebError, WebResult,
        dto::{
            formations::{
                FormationDetail, FormationSummary, ModuleView, ProgressQuery, StepBody,
            },
            progress::{ChapterProgress, Chapters, FormationProgress},
            quizzes::{QuizResult, QuizView},
            resources::ResourceView,
        },
        error::ErrorResponse,
        middlewares,
        routes::PaginationQuery,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/", get(formations_list_handler).post(formation_create_handler))
        .route(
            "/{id}",
            get(formation_get_handler)
                .put(formation_update_handler)
                .delete(formation_delete_handler),
        )
        .route("/{id}/progress", get(formation_progress_handler))
        .route("/{id}/steps", post(formation_step_handler))
        .route("/{id}/reset", post(formation_reset_handler))
        .route("/{id}/reset-all", post(formation_reset_all_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

fn formation_error(e: DatabaseError) -> WebError {
    WebError::from_database(Formation::get_resource_type(), e)
}

fn require_manager(user: &AuthenticatedUser) -> WebResult<()> {
    if user.is_manager() {
        Ok(())
    } else {
        Err(WebError::resource_forbidden(Formation::get_resource_type()))
    }
}

async fn find_formation(
    state: &AppState,
    user: &AuthenticatedUser,
    id: Uuid,
) -> WebResult<Formation> {
    Formation::find_by_id(state.mm(), user, id)
        .await
        .map_err(formation_error)?
        .ok_or_else(|| WebError::resource_not_found(Formation::get_resource_type()))
}

/// Builds the formation page of `user`, creating their progress record on the
/// first visit.
pub(crate) async fn load_detail(
    mm: &ModelManager,
    user: &AuthenticatedUser,
    formation: &Formation,
    touch: bool,
) -> DatabaseResult<FormationDetail> {
    let mut conn = mm.executor().acquire().await?;

    let mut record = UserFormation::get_or_create(&mut conn, user.matricule(), formation.id()).await?;
    if touch {
        record.touch();
    }
    let counts = record.update_progress(&mut conn).await?;

    let content = FormationContent::load(&mut conn, formation).await?;
    let completed: HashSet<Uuid> = UserModule::completed_ids(&mut *conn, user.matricule(), formation.id())
        .await?
        .into_iter()
        .collect();
    let read: HashSet<Uuid> = UserResource::read_ids(&mut *conn, user.matricule(), formation.id())
        .await?
        .into_iter()
        .collect();

    let mut resources = Vec::with_capacity(content.resources.len());
    for resource in &content.resources {
        let accessible = user_has_access(mm, resource, user).await?;
        resources.push(ResourceView::new(resource, accessible, read.contains(&resource.id())));
    }

    let quiz = content.quiz.as_ref().map(|quiz| QuizView::new(quiz, counts.quiz_completed));

    Ok(FormationDetail {
        id: formation.id(),
        title: formation.title().to_string(),
        description: formation.description().to_string(),
        status: formation.status(),
        domain_id: formation.domain_id(),
        created_by: formation.created_by().map(str::to_string),
        progress: record.progress(),
        progress_status: record.status(),
        tabs_completed: counts.tabs().filled(),
        total_estimated_time: format_hms(content.total_estimated_seconds()),
        last_accessed: record.last_accessed(),
        modules: content
            .modules
            .iter()
            .map(|m| ModuleView::new(m, completed.contains(&m.id())))
            .collect(),
        resources,
        quiz,
    })
}

/// Progress page of `matricule` on `formation`.
pub(crate) async fn load_progress(
    mm: &ModelManager,
    matricule: &str,
    formation: &Formation,
) -> DatabaseResult<FormationProgress> {
    let mut conn = mm.executor().acquire().await?;

    let mut record = UserFormation::get_or_create(&mut conn, matricule, formation.id()).await?;
    let counts = record.update_progress(&mut conn).await?;
    let content = FormationContent::load(&mut conn, formation).await?;

    let completed: HashSet<Uuid> = UserModule::completed_ids(&mut *conn, matricule, formation.id())
        .await?
        .into_iter()
        .collect();

    let quiz_result = match &content.quiz {
        Some(quiz) => match UserQuiz::find(&mut *conn, matricule, quiz.quiz.id()).await? {
            Some(attempt) if attempt.completed() => {
                let answers = UserAnswer::for_quiz(&mut *conn, matricule, quiz.quiz.id()).await?;
                Some(QuizResult::new(quiz, &attempt, &answers))
            }
            _ => None,
        },
        None => None,
    };
    let quiz_history = UserQuizHistory::list(&mut *conn, matricule, formation.id()).await?;

    Ok(FormationProgress {
        formation_id: formation.id(),
        matricule: matricule.to_string(),
        progress: record.progress(),
        status: record.status(),
        tabs_completed: counts.tabs(),
        total_estimated_time: format_hms(content.total_estimated_seconds()),
        chapters: Chapters {
            completed: counts.completed_modules,
            total: counts.total_modules,
        },
        chapter_progress: content
            .modules
            .iter()
            .map(|m| ChapterProgress::new(m, completed.contains(&m.id())))
            .collect(),
        time_spent_minutes: record.time_spent_seconds() / 60,
        last_accessed: record.last_accessed(),
        has_quiz: formation.has_quiz(),
        quiz_result,
        quiz_history,
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/formations",
    description = "Page of formations with the caller's progress on each",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Returns requested page", body = Page<FormationSummary>),
        (status = 401, description = "You had to be authorized to do this", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "formations",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn formations_list_handler(
    ctx: RequestContext,
    Query(page): Query<PaginationQuery>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let formations = Formation::page(state.mm(), user, page.request())
        .await
        .map_err(formation_error)?;

    let ids: Vec<Uuid> = formations.items.iter().map(Formation::id).collect();
    let records: HashMap<Uuid, UserFormation> =
        UserFormation::for_formations(state.mm().executor(), user.matricule(), &ids)
            .await
            .map_err(|e| WebError::resource_fetch_error(UserFormation::get_resource_type(), e))?
            .into_iter()
            .map(|r| (r.formation_id(), r))
            .collect();

    let summaries: Page<FormationSummary> =
        formations.map(|f| FormationSummary::new(&f, records.get(&f.id())));

    Ok((StatusCode::OK, Json(summaries)))
}

#[utoipa::path(
    post,
    path = "/api/v1/formations",
    description = "Creates a formation with its modules, resources and quiz",
    request_body = FormationWrite,
    responses(
        (status = 201, description = "Formation created", body = Formation),
        (status = 400, description = "Invalid content", body = ErrorResponse),
        (status = 401, description = "You had to be authorized to do this", body = ErrorResponse),
        (status = 403, description = "Only managers edit formations", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "formations",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn formation_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(payload): Json<FormationWrite>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    require_manager(user)?;

    let created = Formation::create(state.mm(), user, payload)
        .await
        .map_err(formation_error)?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/v1/formations/{id}",
    description = "Formation page with the caller's progress. Opening it counts as an access.",
    params(("id" = Uuid, Path, description = "Formation id")),
    responses(
        (status = 200, description = "Formation found", body = FormationDetail),
        (status = 401, description = "You had to be authorized to do this", body = ErrorResponse),
        (status = 404, description = "Formation not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "formations",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn formation_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let formation = find_formation(&state, user, id).await?;

    let detail = load_detail(state.mm(), user, &formation, true)
        .await
        .map_err(formation_error)?;

    Ok((StatusCode::OK, Json(detail)))
}

#[utoipa::path(
    put,
    path = "/api/v1/formations/{id}",
    description = "Replaces the formation and its content. Modules and resources left without formation are deleted.",
    params(("id" = Uuid, Path, description = "Formation id")),
    request_body = FormationWrite,
    responses(
        (status = 200, description = "Formation updated", body = Formation),
        (status = 400, description = "Invalid content", body = ErrorResponse),
        (status = 401, description = "You had to be authorized to do this", body = ErrorResponse),
        (status = 403, description = "Only managers edit formations", body = ErrorResponse),
        (status = 404, description = "Formation not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "formations",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn formation_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<FormationWrite>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    require_manager(user)?;

    let found = find_formation(&state, user, id).await?;
    let updated = found
        .update(state.mm(), user, payload)
        .await
        .map_err(formation_error)?;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/formations/{id}",
    description = "Deletes the formation. Modules and resources left without formation are deleted too.",
    params(("id" = Uuid, Path, description = "Formation id")),
    responses(
        (status = 200, description = "Formation deleted"),
        (status = 401, description = "You had to be authorized to do this", body = ErrorResponse),
        (status = 403, description = "Only managers edit formations", body = ErrorResponse),
        (status = 404, description = "Formation not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "formations",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn formation_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    require_manager(user)?;

    let found = find_formation(&state, user, id).await?;
    found
        .delete(state.mm(), user)
        .await
        .map_err(formation_error)?;

    Ok(StatusCode::OK)
}

#[utoipa::path(
    get,
    path = "/api/v1/formations/{id}/progress",
    description = "Progress page of the caller, or of `user` for managers",
    params(("id" = Uuid, Path, description = "Formation id"), ProgressQuery),
    responses(
        (status = 200, description = "Progress computed", body = FormationProgress),
        (status = 401, description = "You had to be authorized to do this", body = ErrorResponse),
        (status = 403, description = "Only managers read other users' progress", body = ErrorResponse),
        (status = 404, description = "Formation or user not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "formations",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn formation_progress_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ProgressQuery>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let formation = find_formation(&state, user, id).await?;

    let matricule = match query.user {
        Some(other) if other != user.matricule() => {
            if !user.is_manager() {
                return Err(WebError::resource_forbidden(UserFormation::get_resource_type()));
            }
            Personne::find_by_matricule(state.mm().executor(), &other)
                .await
                .map_err(|e| WebError::resource_fetch_error(Personne::get_resource_type(), e))?
                .ok_or_else(|| WebError::resource_not_found(Personne::get_resource_type()))?;
            other
        }
        _ => user.matricule().to_string(),
    };

    let progress = load_progress(state.mm(), &matricule, &formation)
        .await
        .map_err(formation_error)?;

    Ok((StatusCode::OK, Json(progress)))
}

#[utoipa::path(
    post,
    path = "/api/v1/formations/{id}/steps",
    description = "Marks a tab of the formation as completed",
    params(("id" = Uuid, Path, description = "Formation id")),
    request_body = StepBody,
    responses(
        (status = 200, description = "Step recorded", body = FormationProgress),
        (status = 400, description = "Unknown step", body = ErrorResponse),
        (status = 401, description = "You had to be authorized to do this", body = ErrorResponse),
        (status = 404, description = "Formation not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "formations",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn formation_step_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StepBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let formation = find_formation(&state, user, id).await?;

    let mut conn = state
        .mm()
        .executor()
        .acquire()
        .await
        .map_err(|e| formation_error(e.into()))?;
    let mut record = UserFormation::get_or_create(&mut conn, user.matricule(), formation.id())
        .await
        .map_err(formation_error)?;
    record
        .complete_step(&payload.step, payload.time_spent_seconds.unwrap_or(0))
        .map_err(formation_error)?;
    record
        .update_progress(&mut conn)
        .await
        .map_err(formation_error)?;
    drop(conn);

    let progress = load_progress(state.mm(), user.matricule(), &formation)
        .await
        .map_err(formation_error)?;

    Ok((StatusCode::OK, Json(progress)))
}

#[utoipa::path(
    post,
    path = "/api/v1/formations/{id}/reset",
    description = "Restarts the formation for the caller. Quiz attempts are archived first.",
    params(("id" = Uuid, Path, description = "Formation id")),
    responses(
        (status = 200, description = "Progress reset", body = FormationDetail),
        (status = 401, description = "You had to be authorized to do this", body = ErrorResponse),
        (status = 404, description = "Formation not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "formations",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn formation_reset_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let formation = find_formation(&state, user, id).await?;

    let reset = async {
        let mut tx = state.mm().begin().await?;
        let mut record = UserFormation::get_or_create(tx.conn(), user.matricule(), formation.id()).await?;
        let events = record.reset(tx.conn(), &formation).await?;
        tx.defer_all(events);
        tx.commit(state.mm()).await?;
        Ok::<_, DatabaseError>(())
    };
    reset.await.map_err(formation_error)?;

    let detail = load_detail(state.mm(), user, &formation, false)
        .await
        .map_err(formation_error)?;

    Ok((StatusCode::OK, Json(detail)))
}

#[utoipa::path(
    post,
    path = "/api/v1/formations/{id}/reset-all",
    description = "Restarts the formation for every user of the teams attached to its domain",
    params(("id" = Uuid, Path, description = "Formation id")),
    responses(
        (status = 200, description = "Batch finished, see counters", body = ResetSummary),
        (status = 401, description = "You had to be authorized to do this", body = ErrorResponse),
        (status = 403, description = "Only managers reset other users", body = ErrorResponse),
        (status = 404, description = "Formation not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "formations",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn formation_reset_all_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    require_manager(user)?;
    let formation = find_formation(&state, user, id).await?;

    let reset_all = async {
        let mut tx = state.mm().begin().await?;
        let summary = UserFormation::reset_all(&mut tx, &formation).await?;
        tx.commit(state.mm()).await?;
        Ok::<_, DatabaseError>(summary)
    };
    let summary = reset_all.await.map_err(formation_error)?;

    Ok((StatusCode::OK, Json(summary)))
}
