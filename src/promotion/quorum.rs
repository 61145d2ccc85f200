//! Quorum evaluation
//!
//! The transition out of a state is gated by the direct holders of that
//! state's signer role. A holder is satisfied when the acting user may act
//! for it, or when the holder or one of its representatives has recorded
//! an approval for the same `(current, next)` transition. Any signer may
//! be the one whose call completes the quorum.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::errors::GovernanceResult;
use crate::catalog::{Catalog, UserId, VersionedObject};
use crate::delegation::DelegationResolver;
use crate::lifecycle::Role;

/// Outcome of a quorum evaluation for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quorum {
    pub role: Role,
    pub current_state: String,
    pub next_state: String,
    /// Direct holders of `role`, in link order.
    pub required: Vec<UserId>,
    /// Holders neither represented by the acting user nor approved.
    pub missing: Vec<UserId>,
    /// Effective approvers after delegation.
    pub approvers: BTreeSet<UserId>,
}

impl Quorum {
    pub fn is_met(&self) -> bool {
        self.missing.is_empty()
    }

    /// Evaluate the quorum for moving `object` to `next_state` on behalf of
    /// `acting`. `acting = None` only counts recorded approvals.
    pub fn evaluate(
        catalog: &Catalog,
        object: &VersionedObject,
        next_state: &str,
        acting: Option<UserId>,
        as_of: Option<DateTime<Utc>>,
    ) -> GovernanceResult<Self> {
        let role = catalog
            .lifecycle(&object.lifecycle)?
            .signer_role_for(&object.state)?;
        let resolver = DelegationResolver::new(catalog);
        let required = catalog.role_holders(object.id, role, as_of);

        let missing = required
            .iter()
            .copied()
            .filter(|holder| {
                let representatives = resolver.representatives(*holder, role, as_of);
                let acting_covers = acting
                    .map(|user| representatives.contains(&user))
                    .unwrap_or(false);
                let approved = representatives.iter().any(|user| {
                    catalog.has_approved(object.id, *user, &object.state, next_state, as_of)
                });
                !(acting_covers || approved)
            })
            .collect();

        Ok(Self {
            role,
            current_state: object.state.clone(),
            next_state: next_state.to_string(),
            approvers: resolver.effective_approvers(object.id, role, as_of),
            required,
            missing,
        })
    }

    /// Holders `acting` represents that still lack an approval.
    pub fn represented_by(
        catalog: &Catalog,
        object: &VersionedObject,
        next_state: &str,
        acting: UserId,
    ) -> GovernanceResult<Vec<UserId>> {
        let unapproved = Self::evaluate(catalog, object, next_state, None, None)?;
        let resolver = DelegationResolver::new(catalog);
        Ok(unapproved
            .missing
            .into_iter()
            .filter(|holder| resolver.can_act_for(acting, *holder, unapproved.role, None))
            .collect())
    }
}
