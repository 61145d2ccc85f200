//! Owner-side administration of a versioned object: cancellation,
//! revision and the signer roster.

use super::authority::Authority;
use super::entity::{cancel_object, Outcome, PromotableEntity};
use super::errors::{GovernanceError, GovernanceResult};
use super::observability::PromotionEvent;
use crate::catalog::{check_name, CatalogError, HistoryAction, NewObject, ObjectId, UserId};
use crate::lifecycle::Role;

impl PromotableEntity<'_> {
    // =========================================================================
    // Cancel
    // =========================================================================

    /// Only an unlinked draft with a single revision may be cancelled, by
    /// its owner.
    pub fn check_cancel(&self, acting: UserId) -> GovernanceResult<()> {
        let object = self.object()?;
        if object.cancelled {
            return Err(GovernanceError::controller(format!(
                "{} is already cancelled",
                object.label()
            )));
        }
        let lifecycle = self.catalog().lifecycle(&object.lifecycle)?;
        if object.state != lifecycle.first_state() {
            return Err(GovernanceError::permission(format!(
                "{} is not a draft",
                object.label()
            )));
        }
        Authority::new(self.catalog()).check_owner(object, acting)?;
        if self.catalog().all_revisions(object.id).len() != 1 {
            return Err(GovernanceError::permission(format!(
                "{} has more than one revision",
                object.label()
            )));
        }
        if self.catalog().is_linked(object.id) {
            return Err(GovernanceError::permission(format!(
                "{} is linked to a part",
                object.label()
            )));
        }
        Ok(())
    }

    pub fn cancel(&mut self, acting: UserId) -> GovernanceResult<Outcome<()>> {
        self.check_cancel(acting)?;
        let (id, now) = (self.id(), self.now());
        let event = cancel_object(self.catalog_mut(), id, acting, now)?;
        Ok(Outcome::new((), vec![event]))
    }

    // =========================================================================
    // Revise
    // =========================================================================

    /// Create the next revision. The new object starts at the first state of
    /// the same lifecycle, owned by `acting`.
    pub fn revise(&mut self, acting: UserId, revision: &str) -> GovernanceResult<Outcome<ObjectId>> {
        let object = self.snapshot()?;
        Authority::new(self.catalog()).check_active(acting)?;
        check_name("revision", revision).map_err(|e| GovernanceError::controller(e.to_string()))?;
        if revision == object.revision {
            return Err(GovernanceError::controller(format!(
                "bad value for new revision: {}",
                revision
            )));
        }
        if object.cancelled || self.catalog().is_deprecated(object.id)? {
            return Err(GovernanceError::controller(format!(
                "{} is deprecated or cancelled",
                object.label()
            )));
        }
        if self.catalog().next_revision(object.id).is_some() {
            return Err(GovernanceError::controller(format!(
                "a revision already exists for {}",
                object.label()
            )));
        }

        let now = self.now();
        let request = NewObject {
            kind: object.kind,
            type_name: object.type_name.clone(),
            reference: object.reference.clone(),
            revision: revision.to_string(),
            lifecycle: Some(object.lifecycle.clone()),
        };
        let catalog = self.catalog_mut();
        let new = catalog.create_object(request, acting, now)?;
        catalog.add_revision_link(object.id, new, now)?;
        catalog.record(
            object.id,
            HistoryAction::Revise,
            format!("old: {}, new: {}", object.revision, revision),
            acting,
            now,
        );
        Ok(Outcome::new(
            new,
            vec![PromotionEvent::Revised {
                object: object.id,
                revision: new,
                actor: acting,
            }],
        ))
    }

    // =========================================================================
    // Signers
    // =========================================================================

    /// The roster is frozen once someone has approved a pending promotion.
    pub fn check_edit_signer(&self, acting: UserId) -> GovernanceResult<()> {
        let object = self.object()?;
        Authority::new(self.catalog()).check_owner(object, acting)?;
        if self.catalog().approvals(object.id, None).next().is_some() {
            return Err(GovernanceError::permission(format!(
                "a user has approved a promotion of {}",
                object.label()
            )));
        }
        Ok(())
    }

    /// Signer levels stop before the last state.
    fn check_signer_role(&self, role: Role) -> GovernanceResult<()> {
        let lifecycle = self.catalog().lifecycle(&self.object()?.lifecycle)?;
        match role.signer_level() {
            Some(level) if level + 1 < lifecycle.len() => Ok(()),
            _ => Err(GovernanceError::controller(format!(
                "bad role {} for lifecycle {}",
                role,
                lifecycle.name()
            ))),
        }
    }

    pub fn add_signer(&mut self, acting: UserId, signer: UserId, role: Role) -> GovernanceResult<Outcome<()>> {
        self.check_edit_signer(acting)?;
        self.check_signer_role(role)?;
        Authority::new(self.catalog()).check_active(signer)?;
        let (id, now) = (self.id(), self.now());
        let catalog = self.catalog_mut();
        catalog.add_role(id, signer, role, now)?;
        catalog.record(id, HistoryAction::AddSigner, format!("{} {}", role, signer), acting, now);
        Ok(Outcome::quiet(()))
    }

    /// At least one holder of each signer level must remain.
    pub fn remove_signer(&mut self, acting: UserId, signer: UserId, role: Role) -> GovernanceResult<Outcome<()>> {
        self.check_edit_signer(acting)?;
        self.check_signer_role(role)?;
        let (id, now) = (self.id(), self.now());
        if self.catalog().role_holders(id, role, None).len() <= 1 {
            return Err(GovernanceError::permission(format!(
                "{} has only one {}",
                self.object()?.label(),
                role
            )));
        }
        let catalog = self.catalog_mut();
        catalog.end_role(id, signer, role, now)?;
        catalog.record(id, HistoryAction::RemoveSigner, format!("{} {}", role, signer), acting, now);
        Ok(Outcome::quiet(()))
    }

    pub fn replace_signer(
        &mut self,
        acting: UserId,
        old: UserId,
        new: UserId,
        role: Role,
    ) -> GovernanceResult<Outcome<()>> {
        self.check_edit_signer(acting)?;
        self.check_signer_role(role)?;
        Authority::new(self.catalog()).check_active(new)?;
        let (id, now) = (self.id(), self.now());
        let catalog = self.catalog_mut();
        catalog.end_role(id, old, role, now).map_err(|e| match e {
            CatalogError::NoActiveLink(_) => {
                GovernanceError::controller(format!("{} is not {} of the object", old, role))
            }
            other => other.into(),
        })?;
        catalog.add_role(id, new, role, now)?;
        catalog.record(
            id,
            HistoryAction::ReplaceSigner,
            format!("{}: {} -> {}", role, old, new),
            acting,
            now,
        );
        Ok(Outcome::quiet(()))
    }

    /// Users may subscribe themselves; the owner may subscribe anyone.
    pub fn add_notified(&mut self, acting: UserId, user: UserId) -> GovernanceResult<Outcome<()>> {
        let object = self.object()?;
        let authority = Authority::new(self.catalog());
        authority.check_active(user)?;
        if acting != user {
            authority.check_owner(object, acting)?;
        }
        let (id, now) = (self.id(), self.now());
        let catalog = self.catalog_mut();
        catalog.add_role(id, user, Role::Notified, now)?;
        catalog.record(id, HistoryAction::AddNotified, user.to_string(), acting, now);
        Ok(Outcome::quiet(()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::catalog::Catalog;
    use crate::lifecycle::LifecycleDefinition;
    use crate::promotion::eligibility::EligibilityRegistry;
    use crate::promotion::errors::GovernanceErrorKind;

    struct Fixture {
        catalog: Catalog,
        registry: EligibilityRegistry,
        owner: UserId,
        other: UserId,
        part: ObjectId,
        now: DateTime<Utc>,
    }

    fn fixture() -> Fixture {
        let now = Utc::now();
        let mut catalog = Catalog::new();
        catalog
            .register_lifecycle(
                LifecycleDefinition::new("dod", ["draft", "official", "deprecated"], "official")
                    .unwrap(),
            )
            .unwrap();
        let company = catalog.add_user("company", now).unwrap();
        catalog.set_company(company).unwrap();
        let owner = catalog.add_user("owner", now).unwrap();
        let other = catalog.add_user("other", now).unwrap();
        let part = catalog
            .create_object(NewObject::part("Part", "P1", "a"), owner, now)
            .unwrap();
        Fixture {
            catalog,
            registry: EligibilityRegistry::standard(),
            owner,
            other,
            part,
            now,
        }
    }

    impl Fixture {
        fn entity(&mut self) -> PromotableEntity<'_> {
            PromotableEntity::new(&mut self.catalog, &self.registry, self.part, self.now).unwrap()
        }
    }

    #[test]
    fn test_cancel_draft() {
        let mut f = fixture();
        let owner = f.owner;
        let outcome = f.entity().cancel(owner).unwrap();
        assert_eq!(outcome.events.len(), 1);
        let part = f.catalog.object(f.part).unwrap();
        assert!(part.cancelled);
        assert_eq!(f.catalog.company(), Some(part.owner));
    }

    #[test]
    fn test_cancel_requires_owner() {
        let mut f = fixture();
        let other = f.other;
        let err = f.entity().cancel(other).unwrap_err();
        assert_eq!(err.kind(), GovernanceErrorKind::Permission);
        assert!(!f.catalog.object(f.part).unwrap().cancelled);
    }

    #[test]
    fn test_cancel_linked_part_fails() {
        let mut f = fixture();
        let (owner, now) = (f.owner, f.now);
        let child = f
            .catalog
            .create_object(NewObject::part("Part", "P2", "a"), owner, now)
            .unwrap();
        f.catalog.add_child(f.part, child, 1.0, 0, "-", now).unwrap();

        let err = f.entity().cancel(owner).unwrap_err();
        assert_eq!(err.kind(), GovernanceErrorKind::Permission);
        assert!(!f.catalog.object(f.part).unwrap().cancelled);

        f.catalog.end_child(f.part, child, now).unwrap();
        assert!(f.entity().cancel(owner).is_ok());
    }

    #[test]
    fn test_cancel_with_revisions_fails() {
        let mut f = fixture();
        let owner = f.owner;
        f.entity().revise(owner, "b").unwrap();
        assert!(f.entity().check_cancel(owner).is_err());
    }

    #[test]
    fn test_revise_creates_linked_draft() {
        let mut f = fixture();
        let other = f.other;
        let outcome = f.entity().revise(other, "b").unwrap();
        let new = f.catalog.object(outcome.value).unwrap();
        assert_eq!(new.revision, "b");
        assert_eq!(new.state, "draft");
        assert_eq!(new.owner, other);
        assert_eq!(f.catalog.next_revision(f.part), Some(outcome.value));
    }

    #[test]
    fn test_revise_rejects_bad_values() {
        let mut f = fixture();
        let owner = f.owner;
        for bad in ["a", "b/c", "..", ""] {
            let err = f.entity().revise(owner, bad).unwrap_err();
            assert_eq!(err.kind(), GovernanceErrorKind::Controller, "{}", bad);
        }
        f.entity().revise(owner, "b").unwrap();
        let err = f.entity().revise(owner, "c").unwrap_err();
        assert_eq!(err.kind(), GovernanceErrorKind::Controller);
    }

    #[test]
    fn test_signer_roster() {
        let mut f = fixture();
        let (owner, other) = (f.owner, f.other);
        f.entity().add_signer(owner, other, Role::Signer(0)).unwrap();
        assert_eq!(
            f.catalog.role_holders(f.part, Role::Signer(0), None),
            vec![owner, other]
        );
        f.entity().remove_signer(owner, owner, Role::Signer(0)).unwrap();
        let err = f.entity().remove_signer(owner, other, Role::Signer(0)).unwrap_err();
        assert_eq!(err.kind(), GovernanceErrorKind::Permission);
    }

    #[test]
    fn test_signer_level_must_precede_last_state() {
        let mut f = fixture();
        let (owner, other) = (f.owner, f.other);
        let err = f.entity().add_signer(owner, other, Role::Signer(2)).unwrap_err();
        assert_eq!(err.kind(), GovernanceErrorKind::Controller);
    }

    #[test]
    fn test_replace_unknown_signer() {
        let mut f = fixture();
        let (owner, other) = (f.owner, f.other);
        let err = f
            .entity()
            .replace_signer(owner, other, owner, Role::Signer(1))
            .unwrap_err();
        assert_eq!(err.kind(), GovernanceErrorKind::Controller);
        f.entity()
            .replace_signer(owner, owner, other, Role::Signer(1))
            .unwrap();
        assert!(f.catalog.has_role(f.part, other, Role::Signer(1), None));
    }

    #[test]
    fn test_roster_frozen_after_approval() {
        let mut f = fixture();
        let (owner, other, part, now) = (f.owner, f.other, f.part, f.now);
        f.catalog.add_approval(part, owner, "draft", "official", now).unwrap();
        let err = f.entity().add_signer(owner, other, Role::Signer(0)).unwrap_err();
        assert_eq!(err.kind(), GovernanceErrorKind::Permission);
    }

    #[test]
    fn test_add_notified_self_or_owner() {
        let mut f = fixture();
        let (owner, other) = (f.owner, f.other);
        f.entity().add_notified(other, other).unwrap();
        assert!(f.catalog.has_role(f.part, other, Role::Notified, None));
        let err = f.entity().add_notified(other, owner).unwrap_err();
        assert_eq!(err.kind(), GovernanceErrorKind::Permission);
    }
}
