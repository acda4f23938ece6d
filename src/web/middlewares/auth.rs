use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{
    Config, auth,
    model::{ResourceTyped, entity::Personne},
    web::{AppState, RequestContext, WebResult, context::AuthenticatedUser, error::WebError},
};

/// Name of the session cookie carrying the JWT.
pub static AUTH_TOKEN: &str = "SID";

/// Resolves the `SID` cookie into a [`RequestContext`]. Requests without a
/// cookie continue anonymously; handlers decide whether that is enough.
pub async fn extract_context_fn(
    State(state): State<AppState>,
    cookies: Cookies,
    mut req: Request,
    next: Next,
) -> Result<Response, WebError> {
    let user = match cookies.get(AUTH_TOKEN) {
        Some(token) => Some(resolve_user(&state, token.value()).await?),
        None => None,
    };

    req.extensions_mut().insert(RequestContext::new(user));
    Ok(next.run(req).await)
}

/// Verifies the token, then loads the role of its matricule. A valid token
/// for someone missing from `personnes` is still rejected.
async fn resolve_user(state: &AppState, token: &str) -> WebResult<AuthenticatedUser> {
    let secret = Config::get_or_init(false).await.app().jwt();
    let claims = auth::process_token(token, secret)
        .map_err(|e| WebError::auth_cookie_invalid(AUTH_TOKEN, e))?
        .claims;

    let personne = Personne::find_by_matricule(state.mm().executor(), &claims.sub)
        .await
        .map_err(|e| WebError::resource_fetch_error(Personne::get_resource_type(), e))?
        .ok_or_else(|| WebError::auth_unknown_user(&claims.sub))?;

    tracing::trace!(matricule = %claims.sub, "session resolved");
    Ok(AuthenticatedUser::new(personne.matricule(), personne.role()))
}
