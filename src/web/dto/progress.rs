use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    learning::{ProgressStatus, TabsCompleted, format_hms},
    model::entity::{Module, UserQuizHistory},
    web::dto::quizzes::QuizResult,
};

#[derive(Debug, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct Chapters {
    pub completed: i64,
    pub total: i64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ChapterProgress {
    pub id: Uuid,
    pub title: String,
    pub completed: bool,
    pub estimated_time: String,
}

impl ChapterProgress {
    pub fn new(module: &Module, completed: bool) -> Self {
        Self {
            id: module.id(),
            title: module.title().to_string(),
            completed,
            estimated_time: format_hms(module.estimated_seconds()),
        }
    }
}

/// Progress page of one user on one formation. Tabs without content are
/// omitted from `tabsCompleted`.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct FormationProgress {
    pub formation_id: Uuid,
    pub matricule: String,
    pub progress: i32,
    pub status: ProgressStatus,
    #[serde(rename = "tabsCompleted")]
    pub tabs_completed: TabsCompleted,
    pub total_estimated_time: String,
    pub chapters: Chapters,
    pub chapter_progress: Vec<ChapterProgress>,
    pub time_spent_minutes: i64,
    pub last_accessed: Option<DateTime<Utc>>,
    pub has_quiz: bool,
    pub quiz_result: Option<QuizResult>,
    pub quiz_history: Vec<UserQuizHistory>,
}
