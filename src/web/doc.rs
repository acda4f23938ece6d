use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::web::middlewares::AUTH_TOKEN;

/// Declares the `SID` session cookie used by every secured route.
pub struct SessionCookieModifier;

impl Modify for SessionCookieModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    AUTH_TOKEN,
                    "JWT whose subject is the caller's matricule",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "forma", description = "Formation progress and quiz scoring"),
    paths(
        crate::web::routes::formations::formations_list_handler,
        crate::web::routes::formations::formation_create_handler,
        crate::web::routes::formations::formation_get_handler,
        crate::web::routes::formations::formation_update_handler,
        crate::web::routes::formations::formation_delete_handler,
        crate::web::routes::formations::formation_progress_handler,
        crate::web::routes::formations::formation_step_handler,
        crate::web::routes::formations::formation_reset_handler,
        crate::web::routes::formations::formation_reset_all_handler,
        crate::web::routes::modules::module_complete_handler,
        crate::web::routes::modules::module_video_handler,
        crate::web::routes::resources::resource_get_handler,
        crate::web::routes::resources::resource_read_handler,
        crate::web::routes::resources::resource_download_handler,
        crate::web::routes::quizzes::quiz_submit_handler,
        crate::web::routes::quizzes::quiz_results_handler,
        crate::web::routes::questions::question_check_handler,
    ),
    tags(
        (name = "formations", description = "Formation content and per-user progress"),
        (name = "modules", description = "Module completion and videos"),
        (name = "resources", description = "Resource access, reading and downloads"),
        (name = "quizzes", description = "Quiz submission, results and answer checks"),
    ),
    modifiers(&SessionCookieModifier),
)]
pub struct ApiDoc;
