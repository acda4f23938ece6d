//! Request context, e.g. the caller's matricule and role.
//!

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};

use crate::web::{WebResult, error::WebError};

/// Matricule of the service account seeded by the initial migration.
pub const ADMIN_MATRICULE: &str = "admin";

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    matricule: String,
    user_role: UserRole,
}

impl AuthenticatedUser {
    pub fn new<S: Into<String>>(matricule: S, user_role: UserRole) -> Self {
        Self {
            matricule: matricule.into(),
            user_role,
        }
    }

    pub fn admin() -> Self {
        Self {
            matricule: ADMIN_MATRICULE.to_string(),
            user_role: UserRole::Admin,
        }
    }

    pub fn matricule(&self) -> &str {
        &self.matricule
    }

    pub fn user_role(&self) -> UserRole {
        self.user_role.clone()
    }

    pub fn is_manager(&self) -> bool {
        self.user_role.is_manager()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub enum UserRole {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "TL1")]
    Tl1,
    #[serde(rename = "TL2")]
    Tl2,
    #[serde(rename = "CL")]
    Cl,
    #[serde(rename = "UDL")]
    Udl,
    #[serde(rename = "COLLABORATEUR", other)]
    Collaborateur,
}

impl UserRole {
    /// Roles that edit formations and follow other people's progress.
    pub fn is_manager(&self) -> bool {
        !matches!(self, Self::Collaborateur)
    }
}

impl From<&str> for UserRole {
    fn from(value: &str) -> Self {
        match value {
            "admin" => Self::Admin,
            "TL1" => Self::Tl1,
            "TL2" => Self::Tl2,
            "CL" => Self::Cl,
            "UDL" => Self::Udl,
            _ => Self::Collaborateur,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Tl1 => write!(f, "TL1"),
            Self::Tl2 => write!(f, "TL2"),
            Self::Cl => write!(f, "CL"),
            Self::Udl => write!(f, "UDL"),
            Self::Collaborateur => write!(f, "COLLABORATEUR"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    maybe_user: Option<AuthenticatedUser>,
}

impl RequestContext {
    pub fn new(maybe_user: Option<AuthenticatedUser>) -> Self {
        Self { maybe_user }
    }

    pub fn user(&self) -> WebResult<&AuthenticatedUser> {
        self.maybe_user.as_ref().ok_or(WebError::auth_required())
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts.extensions.get::<RequestContext>();
        if let Some(ctx) = ctx {
            Ok(ctx.clone())
        } else {
            Ok(RequestContext::new(None))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roles_roundtrip_through_their_stored_names() {
        for role in [
            UserRole::Admin,
            UserRole::Tl1,
            UserRole::Tl2,
            UserRole::Cl,
            UserRole::Udl,
            UserRole::Collaborateur,
        ] {
            assert_eq!(UserRole::from(role.to_string().as_str()), role);
        }
    }

    #[test]
    fn unknown_roles_are_collaborators() {
        assert_eq!(UserRole::from("intern"), UserRole::Collaborateur);
        let parsed: UserRole = serde_json::from_str(r#""intern""#).unwrap();
        assert_eq!(parsed, UserRole::Collaborateur);
    }

    #[test]
    fn only_collaborators_are_not_managers() {
        assert!(!UserRole::Collaborateur.is_manager());
        assert!(UserRole::Udl.is_manager());
        assert!(AuthenticatedUser::admin().is_manager());
    }
}
