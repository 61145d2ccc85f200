//! Authorization
//!
//! A user holds a role on an object when it is active and:
//! - it is the organization account, or
//! - the role is `owner` and it owns the object, or
//! - it holds the role directly, or
//! - it is a transitive delegatee of a user satisfying one of the above for
//!   that role.

use chrono::{DateTime, Utc};

use super::errors::{GovernanceError, GovernanceResult};
use crate::catalog::{Catalog, UserId, VersionedObject};
use crate::delegation::DelegationResolver;
use crate::lifecycle::Role;

/// Permission checks against one catalog snapshot.
#[derive(Clone, Copy)]
pub struct Authority<'a> {
    catalog: &'a Catalog,
}

impl<'a> Authority<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    fn is_active(&self, user: UserId) -> bool {
        self.catalog.user(user).map(|u| u.active).unwrap_or(false)
    }

    fn holds_directly(
        &self,
        object: &VersionedObject,
        user: UserId,
        role: Role,
        as_of: Option<DateTime<Utc>>,
    ) -> bool {
        (role == Role::Owner && object.owner == user)
            || self.catalog.has_role(object.id, user, role, as_of)
    }

    /// Whether `user` may act with `role` on `object`.
    pub fn has_role(
        &self,
        object: &VersionedObject,
        user: UserId,
        role: Role,
        as_of: Option<DateTime<Utc>>,
    ) -> bool {
        if !self.is_active(user) {
            return false;
        }
        if self.catalog.is_company(user) || self.holds_directly(object, user, role, as_of) {
            return true;
        }
        DelegationResolver::new(self.catalog)
            .delegators_of(user, role, as_of)
            .into_iter()
            .any(|delegator| self.holds_directly(object, delegator, role, as_of))
    }

    pub fn is_owner(&self, object: &VersionedObject, user: UserId) -> bool {
        self.has_role(object, user, Role::Owner, None)
    }

    pub fn check_active(&self, user: UserId) -> GovernanceResult<()> {
        if self.is_active(user) {
            Ok(())
        } else {
            Err(GovernanceError::permission(format!(
                "user {} is unknown or inactive",
                user
            )))
        }
    }

    pub fn check_owner(&self, object: &VersionedObject, user: UserId) -> GovernanceResult<()> {
        if self.is_owner(object, user) {
            Ok(())
        } else {
            Err(self.denied(object, user, Role::Owner))
        }
    }

    /// Promotion is open to the owner and to the signers of the current
    /// level (directly or by delegation).
    pub fn check_promote(&self, object: &VersionedObject, user: UserId) -> GovernanceResult<()> {
        let role = self
            .catalog
            .lifecycle(&object.lifecycle)?
            .signer_role_for(&object.state)?;
        if self.has_role(object, user, role, None) || self.is_owner(object, user) {
            Ok(())
        } else {
            Err(self.denied(object, user, role))
        }
    }

    /// Recording an approval is a signer act: ownership is not enough.
    pub fn check_sign(&self, object: &VersionedObject, user: UserId) -> GovernanceResult<()> {
        let role = self
            .catalog
            .lifecycle(&object.lifecycle)?
            .signer_role_for(&object.state)?;
        if self.has_role(object, user, role, None) {
            Ok(())
        } else {
            Err(self.denied(object, user, role))
        }
    }

    /// Demotion is open to the owner and to the signers of the previous
    /// level.
    pub fn check_demote(&self, object: &VersionedObject, user: UserId) -> GovernanceResult<()> {
        let lifecycle = self.catalog.lifecycle(&object.lifecycle)?;
        // the first state has no previous level, its own signers are asked
        let role = Role::signer(lifecycle.position(&object.state)?.saturating_sub(1));
        if self.has_role(object, user, role, None) || self.is_owner(object, user) {
            Ok(())
        } else {
            Err(self.denied(object, user, role))
        }
    }

    fn denied(&self, object: &VersionedObject, user: UserId, role: Role) -> GovernanceError {
        let name = self
            .catalog
            .user(user)
            .map(|u| u.username.clone())
            .unwrap_or_else(|_| user.to_string());
        GovernanceError::permission(format!(
            "{} is not {} of {} (nor a delegate)",
            name,
            role,
            object.label()
        ))
    }
}
