use crate::{
    model::{
        ModelManager,
        entity::Resource,
        error::{DatabaseError, DatabaseResult},
    },
    web::{AuthenticatedUser, UserRole},
};

/// Roles that can open every confidential resource.
pub const PRIVILEGED_ROLES: [UserRole; 3] = [UserRole::Tl1, UserRole::Tl2, UserRole::Admin];

/// Confidentiality rule for resources.
pub fn grants_access(confidential: bool, role: &UserRole, in_allowed_team: bool) -> bool {
    if !confidential {
        return true;
    }

    PRIVILEGED_ROLES.contains(role) || in_allowed_team
}

pub async fn user_has_access(
    mm: &ModelManager,
    resource: &Resource,
    user: &AuthenticatedUser,
) -> DatabaseResult<bool> {
    let role = user.user_role();

    // team lookup only matters for confidential resources and regular roles
    if grants_access(resource.confidential(), &role, false) {
        return Ok(true);
    }

    let in_allowed_team =
        Resource::shares_team_with(mm.executor(), resource.id(), user.matricule()).await?;
    Ok(grants_access(resource.confidential(), &role, in_allowed_team))
}

pub async fn check_resource_access(
    mm: &ModelManager,
    resource: &Resource,
    user: &AuthenticatedUser,
) -> DatabaseResult<()> {
    if user_has_access(mm, resource, user).await? {
        Ok(())
    } else {
        Err(DatabaseError::Forbidden)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn public_resources_are_open_to_everyone() {
        assert!(grants_access(false, &UserRole::Collaborateur, false));
        assert!(grants_access(false, &UserRole::Cl, false));
    }

    #[test]
    fn confidential_resources_need_a_team_or_a_privileged_role() {
        assert!(!grants_access(true, &UserRole::Collaborateur, false));
        assert!(!grants_access(true, &UserRole::Udl, false));
        assert!(grants_access(true, &UserRole::Collaborateur, true));
        assert!(grants_access(true, &UserRole::Tl1, false));
        assert!(grants_access(true, &UserRole::Tl2, false));
        assert!(grants_access(true, &UserRole::Admin, false));
    }
}
