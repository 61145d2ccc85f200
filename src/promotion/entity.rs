//! Promotable Entity
//!
//! The lifecycle state machine of one versioned object. States are the
//! positions of the object's lifecycle. The official position is a one-way
//! gate: reaching it hands the object to the organization and settles
//! earlier revisions; an official object cannot be demoted.
//!
//! An entity works on a catalog transaction. Checks run before any
//! mutation, and every change made here becomes visible only when the
//! caller commits.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::authority::Authority;
use super::coordinator::participant_set;
use super::eligibility::{EligibilityContext, EligibilityRegistry, IneligibilityReason};
use super::errors::{GovernanceError, GovernanceResult};
use super::observability::PromotionEvent;
use super::quorum::Quorum;
use crate::catalog::{Catalog, HistoryAction, ObjectId, UserId, VersionedObject};

/// A value produced by a governance operation, with the events to deliver
/// once the transaction has committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T> {
    pub value: T,
    pub events: Vec<PromotionEvent>,
}

impl<T> Outcome<T> {
    pub fn new(value: T, events: Vec<PromotionEvent>) -> Self {
        Self { value, events }
    }

    pub fn quiet(value: T) -> Self {
        Self::new(value, Vec::new())
    }
}

/// Result of recording an approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// Approvals stored; the object has not moved yet.
    Recorded { signers: Vec<UserId> },
    /// The approval completed the quorum and the object moved on.
    Promoted { signers: Vec<UserId>, state: String },
}

/// State machine of one object inside a catalog transaction.
pub struct PromotableEntity<'a> {
    catalog: &'a mut Catalog,
    registry: &'a EligibilityRegistry,
    id: ObjectId,
    now: DateTime<Utc>,
}

impl<'a> PromotableEntity<'a> {
    pub fn new(
        catalog: &'a mut Catalog,
        registry: &'a EligibilityRegistry,
        id: ObjectId,
        now: DateTime<Utc>,
    ) -> GovernanceResult<Self> {
        catalog.object(id)?;
        Ok(Self {
            catalog,
            registry,
            id,
            now,
        })
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn object(&self) -> GovernanceResult<&VersionedObject> {
        Ok(self.catalog.object(self.id)?)
    }

    pub(crate) fn catalog(&self) -> &Catalog {
        self.catalog
    }

    pub(crate) fn catalog_mut(&mut self) -> &mut Catalog {
        self.catalog
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub(crate) fn snapshot(&self) -> GovernanceResult<VersionedObject> {
        self.object().cloned()
    }

    // =========================================================================
    // Eligibility
    // =========================================================================

    pub fn promotion_blockers(&self) -> GovernanceResult<Vec<IneligibilityReason>> {
        self.blockers_with(&BTreeSet::new())
    }

    /// Blockers when `co_promoted` move forward together with this object.
    pub(crate) fn blockers_with(
        &self,
        co_promoted: &BTreeSet<ObjectId>,
    ) -> GovernanceResult<Vec<IneligibilityReason>> {
        let ctx = EligibilityContext {
            catalog: self.catalog,
            co_promoted,
        };
        Ok(self.registry.blockers(self.object()?, &ctx))
    }

    /// No structural blocker, and the recorded approvals already meet the
    /// quorum of the next transition.
    pub fn is_promotable(&self) -> bool {
        self.approved_and_eligible().unwrap_or(false)
    }

    fn approved_and_eligible(&self) -> GovernanceResult<bool> {
        if !self.promotion_blockers()?.is_empty() {
            return Ok(false);
        }
        let object = self.object()?;
        let next = self.catalog.lifecycle(&object.lifecycle)?.next(&object.state)?;
        Ok(Quorum::evaluate(self.catalog, object, next, None, None)?.is_met())
    }

    /// Parts that would move together with `object` in an assembly
    /// promotion rooted at it.
    fn assembly_members(&self, object: &VersionedObject) -> GovernanceResult<BTreeSet<ObjectId>> {
        if !object.is_part() {
            return Ok(BTreeSet::new());
        }
        Ok(participant_set(self.catalog, object)?
            .into_iter()
            .map(|p| p.id)
            .collect())
    }

    fn require_eligible(
        &self,
        object: &VersionedObject,
        co_promoted: &BTreeSet<ObjectId>,
    ) -> GovernanceResult<()> {
        let reasons = self.blockers_with(co_promoted)?;
        if reasons.is_empty() {
            Ok(())
        } else {
            Err(GovernanceError::promotion(
                object.label(),
                reasons.iter().map(|r| r.description()).collect(),
            ))
        }
    }

    fn require_quorum(&self, object: &VersionedObject, next: &str, acting: UserId) -> GovernanceResult<()> {
        let quorum = Quorum::evaluate(self.catalog, object, next, Some(acting), None)?;
        if quorum.is_met() {
            return Ok(());
        }
        Err(GovernanceError::promotion(
            object.label(),
            missing_signers(self.catalog, &quorum),
        ))
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Move to the next state after checking authority, structure and quorum.
    pub fn promote(&mut self, acting: UserId) -> GovernanceResult<Outcome<String>> {
        let object = self.snapshot()?;
        if object.cancelled {
            return Err(GovernanceError::promotion(
                object.label(),
                vec![IneligibilityReason::Cancelled.description()],
            ));
        }
        let next = self
            .catalog
            .lifecycle(&object.lifecycle)?
            .next(&object.state)?
            .to_string();

        Authority::new(self.catalog).check_promote(&object, acting)?;
        self.require_eligible(&object, &BTreeSet::new())?;
        self.require_quorum(&object, &next, acting)?;

        self.apply_promotion(acting)
    }

    /// Apply the next-state transition. Callers have already validated it.
    pub(crate) fn apply_promotion(&mut self, acting: UserId) -> GovernanceResult<Outcome<String>> {
        let object = self.snapshot()?;
        let lifecycle = self.catalog.lifecycle(&object.lifecycle)?.clone();
        let next = lifecycle.next(&object.state)?.to_string();

        self.catalog.set_state(self.id, &next, self.now)?;
        self.catalog.end_approvals(self.id, self.now);
        self.catalog.record(
            self.id,
            HistoryAction::Promote,
            format!("{} -> {}", object.state, next),
            acting,
            self.now,
        );

        let mut events = vec![PromotionEvent::Promoted {
            object: self.id,
            from: object.state.clone(),
            to: next.clone(),
            actor: acting,
        }];
        if lifecycle.is_official(&next) {
            events.extend(self.officialize(acting)?);
        }
        Ok(Outcome::new(next, events))
    }

    /// Hand the object to the organization and settle earlier revisions:
    /// editable ones are cancelled, official ones are deprecated.
    fn officialize(&mut self, acting: UserId) -> GovernanceResult<Vec<PromotionEvent>> {
        let mut events = Vec::new();
        let label = self.object()?.label();
        match self.catalog.company() {
            Some(company) => self.catalog.set_owner(self.id, company)?,
            None => tracing::warn!(object = %self.id, "no company account, owner kept"),
        }

        for previous in self.catalog.previous_revisions(self.id) {
            let old = self.catalog.object(previous)?.clone();
            if old.cancelled {
                continue;
            }
            let lifecycle = self.catalog.lifecycle(&old.lifecycle)?.clone();
            if lifecycle.is_editable(&old.state) {
                events.push(cancel_object(self.catalog, previous, acting, self.now)?);
            } else if lifecycle.is_official(&old.state) {
                self.catalog
                    .set_state(previous, lifecycle.last_state(), self.now)?;
                if let Some(company) = self.catalog.company() {
                    self.catalog.set_owner(previous, company)?;
                }
                self.catalog.end_approvals(previous, self.now);
                self.catalog.record(
                    previous,
                    HistoryAction::Deprecate,
                    format!("superseded by {}", label),
                    acting,
                    self.now,
                );
                events.push(PromotionEvent::Deprecated {
                    object: previous,
                    superseded_by: self.id,
                });
            }
        }
        Ok(events)
    }

    /// Move back one state. An official object cannot be demoted.
    pub fn demote(&mut self, acting: UserId) -> GovernanceResult<Outcome<String>> {
        let object = self.snapshot()?;
        let lifecycle = self.catalog.lifecycle(&object.lifecycle)?;
        if object.cancelled {
            return Err(GovernanceError::promotion(
                object.label(),
                vec![IneligibilityReason::Cancelled.description()],
            ));
        }
        if lifecycle.is_official(&object.state) {
            return Err(GovernanceError::promotion(
                object.label(),
                vec!["an official object cannot be demoted".to_string()],
            ));
        }
        Authority::new(self.catalog).check_demote(&object, acting)?;
        let previous = lifecycle.previous(&object.state)?.to_string();

        self.catalog.set_state(self.id, &previous, self.now)?;
        self.catalog.end_approvals(self.id, self.now);
        self.catalog.record(
            self.id,
            HistoryAction::Demote,
            format!("{} -> {}", object.state, previous),
            acting,
            self.now,
        );
        Ok(Outcome::new(
            previous.clone(),
            vec![PromotionEvent::Demoted {
                object: self.id,
                from: object.state,
                to: previous,
                actor: acting,
            }],
        ))
    }

    // =========================================================================
    // Approvals
    // =========================================================================

    /// Record approvals for every current signer `acting` represents. When
    /// this completes the quorum and the object may move on its own, it is
    /// promoted in the same transaction. A part whose children share its
    /// state accepts approvals too; they wait for the assembly promotion.
    pub fn record_approval(&mut self, acting: UserId) -> GovernanceResult<Outcome<ApprovalOutcome>> {
        let object = self.snapshot()?;
        let members = self.assembly_members(&object)?;
        self.require_eligible(&object, &members)?;
        let next = self
            .catalog
            .lifecycle(&object.lifecycle)?
            .next(&object.state)?
            .to_string();
        Authority::new(self.catalog).check_sign(&object, acting)?;

        let signers = Quorum::represented_by(self.catalog, &object, &next, acting)?;
        if signers.is_empty() {
            return Err(GovernanceError::promotion(
                object.label(),
                vec!["no pending signature is represented by the acting user".to_string()],
            ));
        }
        for signer in &signers {
            self.catalog
                .add_approval(self.id, *signer, &object.state, &next, self.now)?;
        }
        self.catalog.record(
            self.id,
            HistoryAction::Approve,
            format!("{} -> {} ({} signature(s))", object.state, next, signers.len()),
            acting,
            self.now,
        );
        let mut events = vec![PromotionEvent::ApprovalRecorded {
            object: self.id,
            actor: acting,
            signers: signers.clone(),
            from: object.state.clone(),
            to: next.clone(),
        }];

        let quorum = Quorum::evaluate(self.catalog, &object, &next, None, None)?;
        if !quorum.is_met() || !self.promotion_blockers()?.is_empty() {
            return Ok(Outcome::new(ApprovalOutcome::Recorded { signers }, events));
        }
        let promoted = self.apply_promotion(acting)?;
        events.extend(promoted.events);
        Ok(Outcome::new(
            ApprovalOutcome::Promoted {
                signers,
                state: promoted.value,
            },
            events,
        ))
    }

    /// End every pending approval of the object.
    pub fn discard_approvals(&mut self, acting: UserId) -> GovernanceResult<Outcome<usize>> {
        let object = self.snapshot()?;
        Authority::new(self.catalog).check_promote(&object, acting)?;
        let count = self.catalog.end_approvals(self.id, self.now);
        if count == 0 {
            return Ok(Outcome::quiet(0));
        }
        self.catalog.record(
            self.id,
            HistoryAction::DiscardApprovals,
            format!("{} approval(s) discarded", count),
            acting,
            self.now,
        );
        Ok(Outcome::new(
            count,
            vec![PromotionEvent::ApprovalsDiscarded {
                object: self.id,
                actor: acting,
                count,
            }],
        ))
    }
}

/// Cancel an object: the organization takes ownership, BOM and document
/// links, signer links and pending approvals end.
pub(crate) fn cancel_object(
    catalog: &mut Catalog,
    id: ObjectId,
    acting: UserId,
    now: DateTime<Utc>,
) -> GovernanceResult<PromotionEvent> {
    catalog.mark_cancelled(id, now)?;
    if let Some(company) = catalog.company() {
        catalog.set_owner(id, company)?;
    }
    let ended = catalog.end_links_of(id, now);
    tracing::debug!(object = %id, links = ended, "links of cancelled object ended");
    catalog.end_signer_roles(id, now);
    catalog.end_approvals(id, now);
    catalog.record(id, HistoryAction::Cancel, "object cancelled", acting, now);
    Ok(PromotionEvent::Cancelled { object: id, actor: acting })
}

/// One line per unsatisfied signer, by username.
pub(crate) fn missing_signers(catalog: &Catalog, quorum: &Quorum) -> Vec<String> {
    quorum
        .missing
        .iter()
        .map(|user| {
            let name = catalog
                .user(*user)
                .map(|u| u.username.clone())
                .unwrap_or_else(|_| user.to_string());
            format!("{} {} has not approved", quorum.role, name)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::NewObject;
    use crate::lifecycle::{LifecycleDefinition, Role};
    use crate::promotion::errors::GovernanceErrorKind;

    struct Fixture {
        catalog: Catalog,
        registry: EligibilityRegistry,
        company: UserId,
        owner: UserId,
        now: DateTime<Utc>,
    }

    impl Fixture {
        fn new() -> Self {
            let now = Utc::now();
            let mut catalog = Catalog::new();
            catalog
                .register_lifecycle(
                    LifecycleDefinition::new(
                        "dpod",
                        ["draft", "proposed", "official", "deprecated"],
                        "official",
                    )
                    .unwrap(),
                )
                .unwrap();
            let company = catalog.add_user("company", now).unwrap();
            catalog.set_company(company).unwrap();
            let owner = catalog.add_user("owner", now).unwrap();
            Self {
                catalog,
                registry: EligibilityRegistry::standard(),
                company,
                owner,
                now,
            }
        }

        /// A leaf part with a draft document attached.
        fn ready_part(&mut self, reference: &str, revision: &str) -> ObjectId {
            let part = self
                .catalog
                .create_object(NewObject::part("Part", reference, revision), self.owner, self.now)
                .unwrap();
            let doc = self
                .catalog
                .create_object(
                    NewObject::document("Document", &format!("D-{}", reference), revision),
                    self.owner,
                    self.now,
                )
                .unwrap();
            self.catalog.attach_document(doc, part, self.now).unwrap();
            part
        }

        fn entity(&mut self, id: ObjectId) -> PromotableEntity<'_> {
            PromotableEntity::new(&mut self.catalog, &self.registry, id, self.now).unwrap()
        }

        fn state(&self, id: ObjectId) -> String {
            self.catalog.object(id).unwrap().state.clone()
        }
    }

    // =========================================================================
    // Promote
    // =========================================================================

    #[test]
    fn test_promote_moves_to_next_state() {
        let mut f = Fixture::new();
        let part = f.ready_part("P1", "a");
        let owner = f.owner;
        let outcome = f.entity(part).promote(owner).unwrap();
        assert_eq!(outcome.value, "proposed");
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(f.state(part), "proposed");
    }

    #[test]
    fn test_promote_to_official_gives_object_to_company() {
        let mut f = Fixture::new();
        let part = f.ready_part("P1", "a");
        let owner = f.owner;
        f.entity(part).promote(owner).unwrap();
        f.entity(part).promote(owner).unwrap();
        assert_eq!(f.state(part), "official");
        assert_eq!(f.catalog.object(part).unwrap().owner, f.company);
    }

    #[test]
    fn test_promote_without_document_fails() {
        let mut f = Fixture::new();
        let owner = f.owner;
        let now = f.now;
        let part = f
            .catalog
            .create_object(NewObject::part("Part", "P1", "a"), owner, now)
            .unwrap();
        let err = f.entity(part).promote(owner).unwrap_err();
        assert_eq!(err.kind(), GovernanceErrorKind::Promotion);
        assert_eq!(f.state(part), "draft");
    }

    #[test]
    fn test_promote_at_last_state_is_no_such_transition() {
        let mut f = Fixture::new();
        let part = f.ready_part("P1", "a");
        let now = f.now;
        f.catalog.set_state(part, "deprecated", now).unwrap();
        let company = f.company;
        let err = f.entity(part).promote(company).unwrap_err();
        assert_eq!(err.kind(), GovernanceErrorKind::NoSuchTransition);
    }

    #[test]
    fn test_unauthorized_promote_changes_nothing() {
        let mut f = Fixture::new();
        let part = f.ready_part("P1", "a");
        let now = f.now;
        let stranger = f.catalog.add_user("stranger", now).unwrap();
        let err = f.entity(part).promote(stranger).unwrap_err();
        assert_eq!(err.kind(), GovernanceErrorKind::Permission);
        assert_eq!(f.state(part), "draft");
    }

    // =========================================================================
    // Demote
    // =========================================================================

    #[test]
    fn test_demote_official_fails() {
        let mut f = Fixture::new();
        let part = f.ready_part("P1", "a");
        let now = f.now;
        f.catalog.set_state(part, "official", now).unwrap();
        let company = f.company;
        let err = f.entity(part).demote(company).unwrap_err();
        assert_eq!(err.kind(), GovernanceErrorKind::Promotion);
        assert_eq!(f.state(part), "official");
    }

    #[test]
    fn test_demote_from_proposed() {
        let mut f = Fixture::new();
        let part = f.ready_part("P1", "a");
        let owner = f.owner;
        f.entity(part).promote(owner).unwrap();
        let outcome = f.entity(part).demote(owner).unwrap();
        assert_eq!(outcome.value, "draft");
        assert_eq!(f.state(part), "draft");
    }

    #[test]
    fn test_demote_from_first_state() {
        let mut f = Fixture::new();
        let part = f.ready_part("P1", "a");
        let owner = f.owner;
        let err = f.entity(part).demote(owner).unwrap_err();
        assert_eq!(err.kind(), GovernanceErrorKind::NoSuchTransition);
    }

    #[test]
    fn test_unauthorized_demote_from_first_state() {
        let mut f = Fixture::new();
        let part = f.ready_part("P1", "a");
        let now = f.now;
        let stranger = f.catalog.add_user("stranger", now).unwrap();
        let err = f.entity(part).demote(stranger).unwrap_err();
        assert_eq!(err.kind(), GovernanceErrorKind::Permission);
    }

    #[test]
    fn test_is_promotable_counts_recorded_approvals() {
        let mut f = Fixture::new();
        let part = f.ready_part("P1", "a");
        let owner = f.owner;
        assert!(f.entity(part).promotion_blockers().unwrap().is_empty());
        assert!(!f.entity(part).is_promotable());

        let now = f.now;
        f.catalog.add_approval(part, owner, "draft", "proposed", now).unwrap();
        assert!(f.entity(part).is_promotable());
    }

    #[test]
    fn test_deprecated_can_be_demoted() {
        let mut f = Fixture::new();
        let part = f.ready_part("P1", "a");
        let now = f.now;
        f.catalog.set_state(part, "deprecated", now).unwrap();
        let company = f.company;
        assert_eq!(f.entity(part).demote(company).unwrap().value, "official");
    }

    // =========================================================================
    // Approvals
    // =========================================================================

    #[test]
    fn test_two_signers_need_two_approvals() {
        let mut f = Fixture::new();
        let part = f.ready_part("P1", "a");
        let now = f.now;
        let brian = f.catalog.add_user("brian", now).unwrap();
        f.catalog.add_role(part, brian, Role::Signer(0), now).unwrap();
        let owner = f.owner;

        let err = f.entity(part).promote(owner).unwrap_err();
        assert!(err.to_string().contains("brian"));

        let first = f.entity(part).record_approval(owner).unwrap();
        assert_eq!(first.value, ApprovalOutcome::Recorded { signers: vec![owner] });
        assert_eq!(f.state(part), "draft");

        let second = f.entity(part).record_approval(brian).unwrap();
        assert!(matches!(second.value, ApprovalOutcome::Promoted { ref state, .. } if state == "proposed"));
        assert_eq!(f.state(part), "proposed");
        assert_eq!(f.catalog.approvals(part, None).count(), 0);
    }

    #[test]
    fn test_approving_twice_fails() {
        let mut f = Fixture::new();
        let part = f.ready_part("P1", "a");
        let now = f.now;
        let brian = f.catalog.add_user("brian", now).unwrap();
        f.catalog.add_role(part, brian, Role::Signer(0), now).unwrap();
        let owner = f.owner;
        f.entity(part).record_approval(owner).unwrap();
        let err = f.entity(part).record_approval(owner).unwrap_err();
        assert_eq!(err.kind(), GovernanceErrorKind::Promotion);
    }

    #[test]
    fn test_discard_approvals() {
        let mut f = Fixture::new();
        let part = f.ready_part("P1", "a");
        let now = f.now;
        let brian = f.catalog.add_user("brian", now).unwrap();
        f.catalog.add_role(part, brian, Role::Signer(0), now).unwrap();
        let owner = f.owner;
        f.entity(part).record_approval(owner).unwrap();

        let outcome = f.entity(part).discard_approvals(owner).unwrap();
        assert_eq!(outcome.value, 1);
        assert_eq!(outcome.events.len(), 1);
        assert!(f.entity(part).discard_approvals(owner).unwrap().events.is_empty());
    }

    // =========================================================================
    // Revision cascade
    // =========================================================================

    #[test]
    fn test_official_revision_deprecates_previous_official() {
        let mut f = Fixture::new();
        let a = f.ready_part("P1", "a");
        let now = f.now;
        f.catalog.set_state(a, "official", now).unwrap();
        let b = f.ready_part("P1", "b");
        f.catalog.add_revision_link(a, b, now).unwrap();

        let owner = f.owner;
        f.entity(b).promote(owner).unwrap();
        let outcome = f.entity(b).promote(owner).unwrap();

        assert_eq!(f.state(b), "official");
        assert_eq!(f.state(a), "deprecated");
        assert!(outcome
            .events
            .iter()
            .any(|e| matches!(e, PromotionEvent::Deprecated { object, .. } if *object == a)));
    }

    #[test]
    fn test_official_revision_cancels_editable_previous() {
        let mut f = Fixture::new();
        let a = f.ready_part("P1", "a");
        let b = f.ready_part("P1", "b");
        let parent = f.ready_part("P0", "a");
        let now = f.now;
        f.catalog.add_child(parent, a, 1.0, 0, "-", now).unwrap();
        f.catalog.add_revision_link(a, b, now).unwrap();
        f.catalog.set_state(b, "proposed", now).unwrap();

        let owner = f.owner;
        f.entity(b).promote(owner).unwrap();
        let old = f.catalog.object(a).unwrap();
        assert!(old.cancelled);
        assert_eq!(old.owner, f.company);
        assert!(f.catalog.role_holders(a, Role::Signer(0), None).is_empty());
        assert!(!f.catalog.is_linked(a));
        assert!(!f.catalog.has_children(parent, None));
        assert!(f.entity(parent).promotion_blockers().unwrap().is_empty());
    }
}
