use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    learning::{ProgressStatus, TabsCompleted, format_hms},
    model::entity::{Formation, FormationStatus, Module, UserFormation},
    web::dto::{quizzes::QuizView, resources::ResourceView},
};

/// One row of the formation listing, with the caller's progress if any.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct FormationSummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: FormationStatus,
    pub domain_id: Option<Uuid>,
    pub has_quiz: bool,
    pub progress: i32,
    pub progress_status: ProgressStatus,
}

impl FormationSummary {
    pub fn new(formation: &Formation, record: Option<&UserFormation>) -> Self {
        Self {
            id: formation.id(),
            title: formation.title().to_string(),
            description: formation.description().to_string(),
            status: formation.status(),
            domain_id: formation.domain_id(),
            has_quiz: formation.has_quiz(),
            progress: record.map_or(0, UserFormation::progress),
            progress_status: record.map_or(ProgressStatus::New, UserFormation::status),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ModuleView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub video: Option<String>,
    pub estimated_time: String,
    pub completed: bool,
}

impl ModuleView {
    pub fn new(module: &Module, completed: bool) -> Self {
        Self {
            id: module.id(),
            title: module.title().to_string(),
            description: module.description().to_string(),
            video: (!module.video().is_empty())
                .then(|| format!("/api/v1/modules/{}/video", module.id())),
            estimated_time: format_hms(module.estimated_seconds()),
            completed,
        }
    }
}

/// Formation page with the caller's progress. Every tab flag is present.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct FormationDetail {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: FormationStatus,
    pub domain_id: Option<Uuid>,
    pub created_by: Option<String>,
    pub progress: i32,
    pub progress_status: ProgressStatus,
    #[serde(rename = "tabsCompleted")]
    pub tabs_completed: TabsCompleted,
    pub total_estimated_time: String,
    pub last_accessed: Option<DateTime<Utc>>,
    pub modules: Vec<ModuleView>,
    pub resources: Vec<ResourceView>,
    pub quiz: Option<QuizView>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct StepBody {
    /// One of `overview`, `modules`, `resources`, `quiz`.
    pub step: String,
    #[serde(default)]
    pub time_spent_seconds: Option<i64>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProgressQuery {
    /// Matricule of another user, managers only.
    pub user: Option<String>,
}
