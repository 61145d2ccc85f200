//! Delegation Resolver
//!
//! A delegation `(delegator, delegatee, role)` lets the delegatee act as
//! the delegator for that exact role. Chains may span several hops and may
//! contain cycles; every walk keeps a visited set so it always terminates.
//!
//! Resolution is read-only and works on one catalog snapshot.

use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Utc};

use crate::catalog::{Catalog, ObjectId, UserId};
use crate::lifecycle::Role;

/// Resolves role holders to the users who may effectively act for them.
#[derive(Clone, Copy)]
pub struct DelegationResolver<'a> {
    catalog: &'a Catalog,
}

impl<'a> DelegationResolver<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Direct holders of `role` on `object`, each replaced by the ultimate
    /// delegatees of its delegation chain.
    ///
    /// A holder who delegated nothing is its own approver. Users caught in a
    /// delegation cycle are approvers themselves.
    pub fn effective_approvers(
        &self,
        object: ObjectId,
        role: Role,
        as_of: Option<DateTime<Utc>>,
    ) -> BTreeSet<UserId> {
        self.catalog
            .role_holders(object, role, as_of)
            .into_iter()
            .flat_map(|holder| self.ultimate_delegatees(holder, role, as_of))
            .collect()
    }

    /// Ends of the delegation chains starting at `holder`.
    pub fn ultimate_delegatees(
        &self,
        holder: UserId,
        role: Role,
        as_of: Option<DateTime<Utc>>,
    ) -> BTreeSet<UserId> {
        let mut path = Vec::new();
        let mut expanded = BTreeSet::from([holder]);
        let mut out = BTreeSet::new();
        self.expand(holder, role, as_of, &mut path, &mut expanded, &mut out);
        out
    }

    fn expand(
        &self,
        user: UserId,
        role: Role,
        as_of: Option<DateTime<Utc>>,
        path: &mut Vec<UserId>,
        expanded: &mut BTreeSet<UserId>,
        out: &mut BTreeSet<UserId>,
    ) {
        let delegatees = self.catalog.delegatees(user, role, as_of);
        if delegatees.is_empty() {
            out.insert(user);
            return;
        }
        path.push(user);
        for delegatee in delegatees {
            if path.contains(&delegatee) {
                // back edge: both ends of the cycle keep the right to approve
                out.insert(user);
                out.insert(delegatee);
            } else if expanded.insert(delegatee) {
                self.expand(delegatee, role, as_of, path, expanded, out);
            }
        }
        path.pop();
    }

    /// `holder` and everyone it transitively delegated `role` to: the users
    /// who may act for `holder`.
    pub fn representatives(
        &self,
        holder: UserId,
        role: Role,
        as_of: Option<DateTime<Utc>>,
    ) -> BTreeSet<UserId> {
        self.closure(holder, |user| self.catalog.delegatees(user, role, as_of))
    }

    /// Users `user` transitively acts for through `role` delegations,
    /// `user` excluded.
    pub fn delegators_of(
        &self,
        user: UserId,
        role: Role,
        as_of: Option<DateTime<Utc>>,
    ) -> BTreeSet<UserId> {
        let mut found = self.closure(user, |u| self.catalog.delegators(u, role, as_of));
        found.remove(&user);
        found
    }

    /// Whether `user` may act for `holder` on `role`.
    pub fn can_act_for(
        &self,
        user: UserId,
        holder: UserId,
        role: Role,
        as_of: Option<DateTime<Utc>>,
    ) -> bool {
        user == holder || self.representatives(holder, role, as_of).contains(&user)
    }

    /// Breadth-first closure of `start` under `step`.
    fn closure<F>(&self, start: UserId, step: F) -> BTreeSet<UserId>
    where
        F: Fn(UserId) -> Vec<UserId>,
    {
        let mut visited = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for next in step(current) {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        visited
    }
}
