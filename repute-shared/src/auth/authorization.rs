/// Role checks on top of [`AuthContext`]

use sqlx::PgPool;
use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::membership::{Membership, MembershipRole};

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Not a member of tenant {0}")]
    NotMember(Uuid),

    #[error("Insufficient permissions: requires {required:?}, has {actual:?}")]
    InsufficientRole {
        required: MembershipRole,
        actual: MembershipRole,
    },

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Succeeds when the caller holds at least `required` in their tenant
///
/// Returns the caller's actual role.
pub async fn require_role(
    pool: &PgPool,
    auth: &AuthContext,
    required: MembershipRole,
) -> Result<MembershipRole, AuthzError> {
    let role = Membership::get_role(pool, auth.tenant_id, auth.user_id)
        .await?
        .ok_or(AuthzError::NotMember(auth.tenant_id))?;

    check_role(role, required)?;
    Ok(role)
}

/// Pure part of [`require_role`]
pub fn check_role(actual: MembershipRole, required: MembershipRole) -> Result<(), AuthzError> {
    if actual.has_permission(&required) {
        Ok(())
    } else {
        Err(AuthzError::InsufficientRole { required, actual })
    }
}

/// Requires `user_id` to be a member of the caller's tenant
pub async fn require_same_tenant(
    pool: &PgPool,
    auth: &AuthContext,
    user_id: Uuid,
) -> Result<(), AuthzError> {
    Membership::get_role(pool, auth.tenant_id, user_id)
        .await?
        .map(|_| ())
        .ok_or(AuthzError::NotMember(auth.tenant_id))
}
