use std::path::Path;

use crate::model::ModelManager;

/// Shared by every handler. Cloning only bumps the pool's reference count.
#[derive(Debug, Clone)]
pub struct AppState {
    mm: ModelManager,
}

impl AppState {
    pub fn new(mm: ModelManager) -> Self {
        Self { mm }
    }

    pub fn mm(&self) -> &ModelManager {
        &self.mm
    }

    pub fn uploads_dir(&self) -> &Path {
        self.mm.uploads_dir()
    }
}
