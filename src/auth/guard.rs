/// Ownership and self-action checks shared by every mutation path
use crate::{
    db::account::{Account, AccountRole},
    error::{AppError, AppResult},
};

/// A record with exactly one immutable owner
pub trait OwnedResource {
    /// Human-readable resource name used in denial messages
    const KIND: &'static str;

    /// Roles allowed to mutate the resource without owning it
    const OVERRIDE_ROLES: &'static [AccountRole];

    fn owner_id(&self) -> &str;
}

/// Succeeds iff the caller owns the resource or holds one of `allowed_roles`
///
/// Ownership is checked first and never depends on the role list; roles only
/// widen access.
pub fn authorize_owner_or_role(
    account: &Account,
    resource_owner_id: &str,
    allowed_roles: &[AccountRole],
) -> AppResult<()> {
    if account.id == resource_owner_id {
        return Ok(());
    }

    if allowed_roles.contains(&account.role) {
        tracing::info!(
            "Account {} acting on resource owned by {} via {} role",
            account.id,
            resource_owner_id,
            account.role.as_str()
        );
        return Ok(());
    }

    tracing::warn!(
        "Account {} denied mutation of resource owned by {}",
        account.id,
        resource_owner_id
    );
    Err(AppError::Forbidden(
        "You are not allowed to modify this resource".to_string(),
    ))
}

/// Ownership gate for a loaded resource, using its declared override roles
pub fn authorize_mutation<R: OwnedResource>(account: &Account, resource: &R) -> AppResult<()> {
    authorize_owner_or_role(account, resource.owner_id(), R::OVERRIDE_ROLES).map_err(|_| {
        AppError::Forbidden(format!("You cannot modify someone else's {}", R::KIND))
    })
}

/// Reject actions an account may not direct at itself
pub fn authorize_not_self(actor_id: &str, target_id: &str) -> AppResult<()> {
    if actor_id == target_id {
        return Err(AppError::InvalidOperation(
            "You cannot subscribe to yourself".to_string(),
        ));
    }
    Ok(())
}
