//! Post-commit progress propagation.
//!
//! Every write to a per-user completion record (module, resource, quiz)
//! produces a [`ProgressEvent`]. Once the surrounding transaction is
//! committed, each event is resolved to the formations it touches and the
//! matching `UserFormation` is recomputed.

use std::collections::BTreeSet;

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::log_error,
    model::{
        ModelManager,
        entity::{Module, Quiz, Resource, UserFormation},
        error::DatabaseResult,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    ModuleChanged { matricule: String, module_id: Uuid },
    ResourceChanged { matricule: String, resource_id: Uuid },
    QuizChanged { matricule: String, quiz_id: Uuid },
    FormationChanged { matricule: String, formation_id: Uuid },
}

impl ProgressEvent {
    pub fn matricule(&self) -> &str {
        match self {
            Self::ModuleChanged { matricule, .. }
            | Self::ResourceChanged { matricule, .. }
            | Self::QuizChanged { matricule, .. }
            | Self::FormationChanged { matricule, .. } => matricule,
        }
    }

    /// Formations whose aggregate depends on the changed record.
    pub async fn affected_formations(&self, conn: &mut PgConnection) -> DatabaseResult<Vec<Uuid>> {
        match self {
            // modules and resources may be shared by several formations
            Self::ModuleChanged { module_id, .. } => Module::formation_ids(conn, *module_id).await,
            Self::ResourceChanged { resource_id, .. } => {
                Resource::formation_ids(conn, *resource_id).await
            }
            Self::QuizChanged { quiz_id, .. } => Ok(Quiz::formation_id_of(conn, *quiz_id)
                .await?
                .into_iter()
                .collect()),
            Self::FormationChanged { formation_id, .. } => Ok(vec![*formation_id]),
        }
    }
}

/// Recomputes the progress of `matricule` on `formation_id`, creating the
/// `UserFormation` when it does not exist yet.
pub async fn recompute(
    conn: &mut PgConnection,
    matricule: &str,
    formation_id: Uuid,
) -> DatabaseResult<UserFormation> {
    let mut user_formation = UserFormation::get_or_create(conn, matricule, formation_id).await?;
    user_formation.update_progress(conn).await?;
    Ok(user_formation)
}

/// Runs deferred events against a fresh connection.
///
/// The triggering writes are already committed at this point, so failures are
/// logged and the remaining events still run.
#[tracing::instrument(skip(mm, events), fields(count = events.len()))]
pub async fn dispatch(mm: &ModelManager, events: Vec<ProgressEvent>) {
    let mut conn = match mm.executor().acquire().await {
        Ok(conn) => conn,
        Err(e) => {
            log_error(&e);
            return;
        }
    };

    let mut targets = BTreeSet::new();
    for event in &events {
        match event.affected_formations(&mut conn).await {
            Ok(formations) => {
                for formation_id in formations {
                    targets.insert((event.matricule().to_string(), formation_id));
                }
            }
            Err(e) => log_error(&e),
        }
    }

    for (matricule, formation_id) in targets {
        tracing::debug!(%matricule, %formation_id, "recomputing formation progress");
        if let Err(e) = recompute(&mut conn, &matricule, formation_id).await {
            log_error(&e);
        }
    }
}
