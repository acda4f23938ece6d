use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;

use crate::{
    error::log_error,
    model::{DatabaseError, ResourceType},
};

pub type WebResult<T> = std::result::Result<T, WebError>;

#[derive(Debug, Error)]
pub enum AuthenticationError {
    #[error("AuthenticationCookieInvalid, cookie: {cookie}. Error: {error}")]
    AuthenticationCookieInvalid {
        cookie: String,
        error: crate::auth::CryptError,
    },

    #[error("AuthenticationRequired")]
    AuthenticationRequired,

    #[error("AuthenticationUnknownUser: {matricule}")]
    AuthenticationUnknownUser { matricule: String },
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("ResourceNotFound: {resource_type:?}")]
    ResourceNotFound { resource_type: ResourceType },

    #[error("ResourceForbidden: {resource_type:?}")]
    ResourceForbidden { resource_type: ResourceType },

    #[error("ResourceFetchError: {resource_type:?}. Error: {error}")]
    ResourceFetchError {
        resource_type: ResourceType,
        error: DatabaseError,
    },

    #[error("ResourceValidation: {resource_type:?}. Details: {details}")]
    ResourceValidation {
        resource_type: ResourceType,
        details: String,
    },
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("ServerIoError: {0}")]
    ServerIoError(#[from] std::io::Error),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    pub fn client_display(&self) -> String {
        String::from("Internal server error.")
    }
}

impl AuthenticationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            Self::AuthenticationUnknownUser { .. } => StatusCode::UNAUTHORIZED,
            Self::AuthenticationCookieInvalid {
                error: crate::auth::CryptError::Expired,
                ..
            } => StatusCode::UNAUTHORIZED,
            Self::AuthenticationCookieInvalid { .. } => StatusCode::BAD_REQUEST,
        }
    }

    pub fn client_display(&self) -> String {
        match self {
            Self::AuthenticationCookieInvalid {
                error: crate::auth::CryptError::Expired,
                ..
            } => String::from("Authentication error, session expired."),
            Self::AuthenticationCookieInvalid { .. } => {
                String::from("Authentication error, cookie invalid.")
            }
            Self::AuthenticationRequired => String::from("Authentication required."),
            Self::AuthenticationUnknownUser { .. } => {
                String::from("Authentication error, user not found.")
            }
        }
    }
}

impl ResourceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
            Self::ResourceForbidden { .. } => StatusCode::FORBIDDEN,
            Self::ResourceFetchError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ResourceValidation { .. } => StatusCode::BAD_REQUEST,
        }
    }

    pub fn client_display(&self) -> String {
        match self {
            Self::ResourceNotFound { .. } => String::from("Resource error, resource not found."),
            Self::ResourceForbidden { .. } => String::from("Resource error, resource forbidden."),
            Self::ResourceFetchError { .. } => {
                String::from("Resource error, unable to fetch resource.")
            }
            Self::ResourceValidation { details, .. } => {
                format!("Resource error, invalid request: {details}")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum WebError {
    #[error("ResourceError - {0}")]
    ResourceError(#[from] ResourceError),
    #[error("AuthenticationError - {0}")]
    AuthenticationError(#[from] AuthenticationError),
    #[error("ServerError - {0}")]
    ServerError(#[from] ServerError),
}

impl WebError {
    pub fn resource_not_found(r#type: ResourceType) -> Self {
        Self::ResourceError(ResourceError::ResourceNotFound {
            resource_type: r#type,
        })
    }

    pub fn resource_forbidden(r#type: ResourceType) -> Self {
        Self::ResourceError(ResourceError::ResourceForbidden {
            resource_type: r#type,
        })
    }

    pub fn resource_fetch_error(r#type: ResourceType, error: DatabaseError) -> Self {
        Self::ResourceError(ResourceError::ResourceFetchError {
            resource_type: r#type,
            error,
        })
    }

    pub fn resource_validation<S: Into<String>>(r#type: ResourceType, details: S) -> Self {
        Self::ResourceError(ResourceError::ResourceValidation {
            resource_type: r#type,
            details: details.into(),
        })
    }

    /// Maps model errors onto their HTTP meaning for `r#type`.
    pub fn from_database(r#type: ResourceType, error: DatabaseError) -> Self {
        match error {
            DatabaseError::Forbidden => Self::resource_forbidden(r#type),
            DatabaseError::Validation(details) => Self::resource_validation(r#type, details),
            error => Self::resource_fetch_error(r#type, error),
        }
    }

    pub fn auth_cookie_invalid<S: Into<String>>(
        cookie: S,
        error: crate::auth::CryptError,
    ) -> Self {
        Self::AuthenticationError(AuthenticationError::AuthenticationCookieInvalid {
            cookie: cookie.into(),
            error,
        })
    }

    pub fn auth_required() -> Self {
        Self::AuthenticationError(AuthenticationError::AuthenticationRequired)
    }

    pub fn auth_unknown_user<S: Into<String>>(matricule: S) -> Self {
        Self::AuthenticationError(AuthenticationError::AuthenticationUnknownUser {
            matricule: matricule.into(),
        })
    }

    pub fn server_io_error(e: std::io::Error) -> Self {
        Self::ServerError(ServerError::ServerIoError(e))
    }

    pub fn status_code(&self) -> axum::http::StatusCode {
        match self {
            Self::ResourceError(e) => e.status_code(),
            Self::AuthenticationError(e) => e.status_code(),
            Self::ServerError(e) => e.status_code(),
        }
    }

    pub fn client_display(&self) -> String {
        match self {
            Self::ResourceError(e) => e.client_display(),
            Self::AuthenticationError(e) => e.client_display(),
            Self::ServerError(e) => e.client_display(),
        }
    }
}

#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Human-readable message for the client
    pub message: String,
    /// HTTP status code (stringified)
    pub status_code: String,
    /// Optional debug details (only in debug mode)
    pub details: Option<String>,
}

impl IntoResponse for WebError {
    fn into_response(self) -> axum::response::Response {
        log_error(&self);

        let status_code = self.status_code();
        let display = self.client_display();

        let body = ErrorResponse {
            message: display,
            status_code: status_code.as_str().to_string(),
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        };

        (status_code, Json(body)).into_response()
    }
}
