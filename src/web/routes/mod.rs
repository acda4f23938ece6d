use std::path::Path;

use axum::{
    Router,
    body::Body,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tower_cookies::CookieManagerLayer;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    Config,
    model::{PageRequest, ResourceType},
    utils::uploads::resolve_asset,
    web::{AppState, WebError, WebResult, doc::ApiDoc},
};

pub mod formations;
pub mod modules;
pub mod questions;
pub mod quizzes;
pub mod resources;

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationQuery {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    20
}

impl PaginationQuery {
    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.limit, self.offset)
    }
}

pub fn build_app<S: Send + Sync + Clone + 'static>(
    state: AppState,
    config: &'static Config,
) -> Router<S> {
    let mut router = Router::new()
        .nest("/api/v1/formations", formations::routes(state.clone()))
        .nest("/api/v1/modules", modules::routes(state.clone()))
        .nest("/api/v1/resources", resources::routes(state.clone()))
        .nest("/api/v1/quizzes", quizzes::routes(state.clone()))
        .nest("/api/v1/questions", questions::routes(state.clone()))
        .layer(CookieManagerLayer::default())
        .layer(CorsLayer::very_permissive())
        .with_state(state);

    if config.app().docs() {
        let openapi = ApiDoc::openapi();

        router = router.merge(SwaggerUi::new("/api/v1/docs").url("/api-doc/openapi.json", openapi));
    }

    router
}

/// Streams a stored file. Missing files are reported as a missing `r#type`.
pub(crate) async fn stream_asset(
    uploads_dir: &Path,
    relative: &str,
    r#type: ResourceType,
) -> WebResult<Response> {
    let path = resolve_asset(uploads_dir, relative)
        .ok_or_else(|| WebError::resource_not_found(r#type.clone()))?;

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(WebError::resource_not_found(r#type));
        }
        Err(e) => return Err(WebError::server_io_error(e)),
    };

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("download")
        .replace('"', "");

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response())
}
