//! Catalog editing: users, objects, BOM links, documents, files and
//! delegations. Edits of an object's structure are reserved to its owner
//! while the object is still editable.

use super::PlmService;
use crate::catalog::{Catalog, HistoryAction, LinkId, NewObject, ObjectId, UserId, VersionedObject};
use crate::lifecycle::Role;
use crate::promotion::{Authority, GovernanceError, GovernanceResult, Outcome};

/// The owner may edit the object, and only before it becomes official.
fn check_editable(catalog: &Catalog, object: &VersionedObject, acting: UserId) -> GovernanceResult<()> {
    if object.cancelled {
        return Err(GovernanceError::permission(format!(
            "{} is cancelled",
            object.label()
        )));
    }
    if !catalog.lifecycle(&object.lifecycle)?.is_editable(&object.state) {
        return Err(GovernanceError::permission(format!(
            "{} is not editable in state '{}'",
            object.label(),
            object.state
        )));
    }
    Authority::new(catalog).check_owner(object, acting)
}

impl PlmService {
    // =========================================================================
    // Users and objects
    // =========================================================================

    pub fn create_user(&self, username: &str) -> GovernanceResult<UserId> {
        self.write("create_user", |catalog, now| {
            Ok(Outcome::quiet(catalog.add_user(username, now)?))
        })
    }

    pub fn set_user_active(&self, user: UserId, active: bool) -> GovernanceResult<()> {
        self.write("set_user_active", |catalog, _| {
            Ok(Outcome::quiet(catalog.set_user_active(user, active)?))
        })
    }

    /// Create an object owned by `creator`, at the first state of its
    /// lifecycle.
    pub fn create_object(&self, new: NewObject, creator: UserId) -> GovernanceResult<ObjectId> {
        self.write("create_object", |catalog, now| {
            Authority::new(catalog).check_active(creator)?;
            Ok(Outcome::quiet(catalog.create_object(new, creator, now)?))
        })
    }

    pub fn create_part(
        &self,
        type_name: &str,
        reference: &str,
        revision: &str,
        creator: UserId,
    ) -> GovernanceResult<ObjectId> {
        self.create_object(NewObject::part(type_name, reference, revision), creator)
    }

    pub fn create_document(
        &self,
        type_name: &str,
        reference: &str,
        revision: &str,
        creator: UserId,
    ) -> GovernanceResult<ObjectId> {
        self.create_object(NewObject::document(type_name, reference, revision), creator)
    }

    // =========================================================================
    // Bill of materials
    // =========================================================================

    pub fn add_child(
        &self,
        parent: ObjectId,
        child: ObjectId,
        quantity: f64,
        order: u32,
        unit: &str,
        acting: UserId,
    ) -> GovernanceResult<LinkId> {
        self.write("add_child", |catalog, now| {
            let object = catalog.object(parent)?.clone();
            check_editable(catalog, &object, acting)?;
            let link = catalog.add_child(parent, child, quantity, order, unit, now)?;
            let label = catalog.object(child)?.label();
            catalog.record(parent, HistoryAction::AddChild, label, acting, now);
            Ok(Outcome::quiet(link))
        })
    }

    pub fn remove_child(&self, parent: ObjectId, child: ObjectId, acting: UserId) -> GovernanceResult<()> {
        self.write("remove_child", |catalog, now| {
            let object = catalog.object(parent)?.clone();
            check_editable(catalog, &object, acting)?;
            catalog.end_child(parent, child, now)?;
            let label = catalog.object(child)?.label();
            catalog.record(parent, HistoryAction::RemoveChild, label, acting, now);
            Ok(Outcome::quiet(()))
        })
    }

    // =========================================================================
    // Documents and files
    // =========================================================================

    /// Attach a document to a part. Requires ownership of the document.
    pub fn attach_document(
        &self,
        document: ObjectId,
        part: ObjectId,
        acting: UserId,
    ) -> GovernanceResult<LinkId> {
        self.write("attach_document", |catalog, now| {
            let object = catalog.object(document)?.clone();
            Authority::new(catalog).check_owner(&object, acting)?;
            let link = catalog.attach_document(document, part, now)?;
            let part_label = catalog.object(part)?.label();
            catalog.record(document, HistoryAction::AttachDocument, part_label, acting, now);
            catalog.record(part, HistoryAction::AttachDocument, object.label(), acting, now);
            Ok(Outcome::quiet(link))
        })
    }

    pub fn detach_document(
        &self,
        document: ObjectId,
        part: ObjectId,
        acting: UserId,
    ) -> GovernanceResult<()> {
        self.write("detach_document", |catalog, now| {
            let object = catalog.object(document)?.clone();
            Authority::new(catalog).check_owner(&object, acting)?;
            catalog.detach_document(document, part, now)?;
            let part_label = catalog.object(part)?.label();
            catalog.record(document, HistoryAction::DetachDocument, part_label, acting, now);
            Ok(Outcome::quiet(()))
        })
    }

    pub fn add_file(&self, document: ObjectId, filename: &str, acting: UserId) -> GovernanceResult<LinkId> {
        self.write("add_file", |catalog, now| {
            let object = catalog.object(document)?.clone();
            check_editable(catalog, &object, acting)?;
            let file = catalog.add_file(document, filename)?;
            catalog.record(document, HistoryAction::AddFile, filename, acting, now);
            Ok(Outcome::quiet(file))
        })
    }

    /// Check a file out. Fails if someone else holds it.
    pub fn lock_file(&self, file: LinkId, acting: UserId) -> GovernanceResult<()> {
        self.write("lock_file", |catalog, now| {
            Authority::new(catalog).check_active(acting)?;
            let document = catalog.file(file)?.document;
            catalog.lock_file(file, acting)?;
            catalog.record(document, HistoryAction::LockFile, file.to_string(), acting, now);
            Ok(Outcome::quiet(()))
        })
    }

    pub fn unlock_file(&self, file: LinkId, acting: UserId) -> GovernanceResult<()> {
        self.write("unlock_file", |catalog, now| {
            let document = catalog.file(file)?.document;
            catalog.unlock_file(file, acting)?;
            catalog.record(document, HistoryAction::UnlockFile, file.to_string(), acting, now);
            Ok(Outcome::quiet(()))
        })
    }

    // =========================================================================
    // Delegation
    // =========================================================================

    /// `delegator` hands `role` to `delegatee` until the delegation ends.
    pub fn delegate(&self, delegator: UserId, delegatee: UserId, role: Role) -> GovernanceResult<LinkId> {
        self.write("delegate", |catalog, now| {
            let authority = Authority::new(catalog);
            authority.check_active(delegator)?;
            authority.check_active(delegatee)?;
            Ok(Outcome::quiet(catalog.add_delegation(delegator, delegatee, role, now)?))
        })
    }

    pub fn end_delegation(
        &self,
        delegator: UserId,
        delegatee: UserId,
        role: Role,
    ) -> GovernanceResult<()> {
        self.write("end_delegation", |catalog, now| {
            Ok(Outcome::quiet(catalog.end_delegation(delegator, delegatee, role, now)?))
        })
    }
}
