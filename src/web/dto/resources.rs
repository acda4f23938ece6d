use serde::Serialize;
use uuid::Uuid;

use crate::{learning::format_hms, model::entity::Resource};

/// A resource as seen by one user. `file` is only disclosed when the user
/// may download it.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ResourceView {
    pub id: Uuid,
    pub name: String,
    pub confidential: bool,
    pub estimated_time: String,
    pub accessible: bool,
    pub file: Option<String>,
    pub read: bool,
}

impl ResourceView {
    pub fn new(resource: &Resource, accessible: bool, read: bool) -> Self {
        Self {
            id: resource.id(),
            name: resource.name().to_string(),
            confidential: resource.confidential(),
            estimated_time: format_hms(resource.estimated_seconds()),
            accessible,
            file: (accessible && !resource.file().is_empty())
                .then(|| format!("/api/v1/resources/{}/download", resource.id())),
            read,
        }
    }
}
