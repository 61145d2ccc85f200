//! Assembly Promotion Coordinator
//!
//! Promotes a part together with every descendant that shares its lifecycle
//! and state. The participant set is fixed first, then every check runs
//! against it, and only then is any object moved. A single failure leaves
//! the whole assembly untouched.
//!
//! Participants are treated as mature for each other: a parent whose
//! children are promoted in the same call is not blocked by them.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use super::authority::Authority;
use super::eligibility::{EligibilityContext, EligibilityRegistry};
use super::entity::{missing_signers, Outcome, PromotableEntity};
use super::errors::{GovernanceError, GovernanceResult};
use super::quorum::Quorum;
use crate::bom::{BomTraversal, TraversalOptions};
use crate::catalog::{Catalog, ObjectId, UserId, VersionedObject};

/// A member of an assembly promotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ObjectId,
    /// Deepest level at which the object was reached from the root.
    pub depth: u32,
}

/// The root plus every child linked from a participant with the root's
/// lifecycle and state. Shared parts appear once.
pub(crate) fn participant_set(
    catalog: &Catalog,
    root: &VersionedObject,
) -> GovernanceResult<Vec<Participant>> {
    let mut depths: BTreeMap<ObjectId, u32> = BTreeMap::from([(root.id, 0)]);

    for entry in BomTraversal::children(catalog, root.id, TraversalOptions::unbounded()) {
        if !depths.contains_key(&entry.link.parent) {
            continue;
        }
        let child = catalog.object(entry.node)?;
        if child.cancelled || child.lifecycle != root.lifecycle || child.state != root.state {
            continue;
        }
        let depth = depths.entry(child.id).or_insert(entry.depth);
        *depth = (*depth).max(entry.depth);
    }

    Ok(depths
        .into_iter()
        .map(|(id, depth)| Participant { id, depth })
        .collect())
}

pub struct AssemblyPromotionCoordinator<'a> {
    catalog: &'a mut Catalog,
    registry: &'a EligibilityRegistry,
    now: DateTime<Utc>,
}

impl<'a> AssemblyPromotionCoordinator<'a> {
    pub fn new(
        catalog: &'a mut Catalog,
        registry: &'a EligibilityRegistry,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            catalog,
            registry,
            now,
        }
    }

    // =========================================================================
    // Participant set
    // =========================================================================

    pub fn participants(&self, root: &VersionedObject) -> GovernanceResult<Vec<Participant>> {
        participant_set(self.catalog, root)
    }

    /// Two revisions of the same reference cannot be promoted together.
    fn check_revisions(&self, members: &[&VersionedObject]) -> GovernanceResult<()> {
        let mut seen: BTreeMap<(&str, &str), &str> = BTreeMap::new();
        for object in members {
            let key = (object.type_name.as_str(), object.reference.as_str());
            if let Some(revision) = seen.insert(key, object.revision.as_str()) {
                return Err(GovernanceError::controller(format!(
                    "{}/{} has several revisions in the assembly ({} and {})",
                    object.type_name, object.reference, revision, object.revision
                )));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Promotion
    // =========================================================================

    /// Promote `root` and its participants. Returns the promoted objects.
    pub fn promote_assembly(
        &mut self,
        root: ObjectId,
        acting: UserId,
    ) -> GovernanceResult<Outcome<BTreeSet<ObjectId>>> {
        let root_object = self.catalog.object(root)?.clone();
        if !root_object.is_part() {
            return Err(GovernanceError::controller(format!(
                "{} is not a part",
                root_object.label()
            )));
        }
        if root_object.cancelled {
            return Err(GovernanceError::promotion(
                root_object.label(),
                vec!["the object is cancelled".to_string()],
            ));
        }
        let lifecycle = self.catalog.lifecycle(&root_object.lifecycle)?;
        let next = lifecycle.next(&root_object.state)?.to_string();
        if !lifecycle.is_editable(&root_object.state) {
            return Err(GovernanceError::permission(format!(
                "{} is not editable",
                root_object.label()
            )));
        }
        let authority = Authority::new(self.catalog);
        authority.check_promote(&root_object, acting)?;

        let participants = self.participants(&root_object)?;
        let members = participants
            .iter()
            .map(|p| self.catalog.object(p.id))
            .collect::<Result<Vec<_>, _>>()?;
        self.check_revisions(&members)?;

        for member in &members {
            authority.check_promote(member, acting)?;
        }

        let co_promoted: BTreeSet<ObjectId> = participants.iter().map(|p| p.id).collect();
        let ctx = EligibilityContext {
            catalog: self.catalog,
            co_promoted: &co_promoted,
        };
        let mut reasons = Vec::new();
        for member in &members {
            for reason in self.registry.blockers(member, &ctx) {
                reasons.push(format!("{}: {}", member.label(), reason.description()));
            }
        }
        if !reasons.is_empty() {
            return Err(GovernanceError::promotion(root_object.label(), reasons));
        }

        for member in &members {
            let quorum = Quorum::evaluate(self.catalog, member, &next, Some(acting), None)?;
            for missing in missing_signers(self.catalog, &quorum) {
                reasons.push(format!("{}: {}", member.label(), missing));
            }
        }
        if !reasons.is_empty() {
            return Err(GovernanceError::promotion(root_object.label(), reasons));
        }

        let mut order = participants;
        order.sort_by(|a, b| b.depth.cmp(&a.depth).then(a.id.cmp(&b.id)));
        tracing::debug!(
            root = %root,
            participants = order.len(),
            "assembly checks passed"
        );

        let mut events = Vec::new();
        for participant in &order {
            let promoted =
                PromotableEntity::new(self.catalog, self.registry, participant.id, self.now)?
                    .apply_promotion(acting)?;
            events.extend(promoted.events);
        }
        Ok(Outcome::new(co_promoted, events))
    }
}
