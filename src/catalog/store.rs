//! The Catalog
//!
//! In-memory store for every entity of the governance core. The catalog
//! enforces storage-level invariants:
//! - `(type_name, reference, revision)` is unique
//! - at most one active link per `(parent, child)`, `(document, part)`,
//!   `(object, user, role)` and `(delegator, delegatee, role)`
//! - the graph of active BOM links is acyclic
//! - an object's state belongs to its lifecycle
//!
//! Governance rules (who may promote, quorum, eligibility) live above it.
//! Mutators that bypass those rules are crate-private, except the raw
//! writes that imports and fixtures need (`set_state`, `add_approval`,
//! `add_revision_link`).

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::errors::{CatalogError, CatalogResult};
use super::ids::{LinkId, ObjectId, UserId};
use super::links::{
    DelegationLink, DocumentFile, DocumentPartLink, HistoryAction, HistoryEntry,
    ParentChildLink, PromotionApproval, RevisionLink, StateHistory, UserRoleLink, Validity,
};
use super::object::{NewObject, ObjectKind, User, VersionedObject};
use crate::lifecycle::{LifecycleDefinition, Role};

fn bad_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[?/#\n\t\r\f]|\.\.").expect("static regex"))
}

/// Reject empty names and names with path or query characters.
pub(crate) fn check_name(what: &str, value: &str) -> CatalogResult<()> {
    if value.trim().is_empty() {
        return Err(CatalogError::InvalidValue(format!("{} is empty", what)));
    }
    if bad_name_pattern().is_match(value) {
        return Err(CatalogError::InvalidValue(format!(
            "{} '{}' contains a forbidden character",
            what, value
        )));
    }
    Ok(())
}

/// Catalog of users, objects and their links.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    version: u64,
    next_link: u64,
    company: Option<UserId>,
    default_lifecycle: Option<String>,
    lifecycles: BTreeMap<String, LifecycleDefinition>,
    users: BTreeMap<UserId, User>,
    objects: BTreeMap<ObjectId, VersionedObject>,
    bom: Vec<ParentChildLink>,
    document_parts: Vec<DocumentPartLink>,
    files: Vec<DocumentFile>,
    roles: Vec<UserRoleLink>,
    delegations: Vec<DelegationLink>,
    approvals: Vec<PromotionApproval>,
    revisions: Vec<RevisionLink>,
    state_history: Vec<StateHistory>,
    history: Vec<HistoryEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed transactions that produced this snapshot.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn bump_version(&mut self) {
        self.version += 1;
    }

    fn next_link_id(&mut self) -> LinkId {
        self.next_link += 1;
        LinkId::new(self.next_link)
    }

    // =========================================================================
    // Lifecycles
    // =========================================================================

    pub fn register_lifecycle(&mut self, definition: LifecycleDefinition) -> CatalogResult<()> {
        if self.lifecycles.contains_key(definition.name()) {
            return Err(CatalogError::DuplicateLifecycle(definition.name().to_string()));
        }
        if self.default_lifecycle.is_none() {
            self.default_lifecycle = Some(definition.name().to_string());
        }
        self.lifecycles.insert(definition.name().to_string(), definition);
        Ok(())
    }

    pub fn set_default_lifecycle(&mut self, name: &str) -> CatalogResult<()> {
        self.lifecycle(name)?;
        self.default_lifecycle = Some(name.to_string());
        Ok(())
    }

    pub fn default_lifecycle(&self) -> Option<&str> {
        self.default_lifecycle.as_deref()
    }

    pub fn lifecycle(&self, name: &str) -> CatalogResult<&LifecycleDefinition> {
        self.lifecycles
            .get(name)
            .ok_or_else(|| CatalogError::UnknownLifecycle(name.to_string()))
    }

    pub fn lifecycles(&self) -> impl Iterator<Item = &LifecycleDefinition> {
        self.lifecycles.values()
    }

    /// Lifecycle of an object.
    pub fn lifecycle_of(&self, id: ObjectId) -> CatalogResult<&LifecycleDefinition> {
        let object = self.object(id)?;
        self.lifecycle(&object.lifecycle)
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub fn add_user(&mut self, username: &str, at: DateTime<Utc>) -> CatalogResult<UserId> {
        check_name("username", username)?;
        if self.users.values().any(|u| u.username == username) {
            return Err(CatalogError::DuplicateUser(username.to_string()));
        }
        let id = UserId::new();
        self.users.insert(
            id,
            User {
                id,
                username: username.to_string(),
                active: true,
                created_at: at,
            },
        );
        Ok(id)
    }

    pub fn user(&self, id: UserId) -> CatalogResult<&User> {
        self.users
            .get(&id)
            .ok_or_else(|| CatalogError::UnknownUser(id.to_string()))
    }

    pub fn user_by_name(&self, username: &str) -> CatalogResult<&User> {
        self.users
            .values()
            .find(|u| u.username == username)
            .ok_or_else(|| CatalogError::UnknownUser(username.to_string()))
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn set_user_active(&mut self, id: UserId, active: bool) -> CatalogResult<()> {
        let user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| CatalogError::UnknownUser(id.to_string()))?;
        user.active = active;
        Ok(())
    }

    /// Designate the organization account.
    pub fn set_company(&mut self, id: UserId) -> CatalogResult<()> {
        self.user(id)?;
        self.company = Some(id);
        Ok(())
    }

    pub fn company(&self) -> Option<UserId> {
        self.company
    }

    pub fn is_company(&self, user: UserId) -> bool {
        self.company == Some(user)
    }

    // =========================================================================
    // Objects
    // =========================================================================

    /// Create an object in the first state of its lifecycle.
    ///
    /// The creator becomes owner and holds every signer role of the
    /// lifecycle until signers are reassigned.
    pub fn create_object(
        &mut self,
        new: NewObject,
        creator: UserId,
        at: DateTime<Utc>,
    ) -> CatalogResult<ObjectId> {
        check_name("type", &new.type_name)?;
        check_name("reference", &new.reference)?;
        check_name("revision", &new.revision)?;
        self.user(creator)?;

        let lifecycle_name = match new.lifecycle {
            Some(name) => name,
            None => self
                .default_lifecycle
                .clone()
                .ok_or_else(|| CatalogError::UnknownLifecycle("<default>".to_string()))?,
        };
        let lifecycle = self.lifecycle(&lifecycle_name)?;
        let state = lifecycle.first_state().to_string();
        let signer_roles: Vec<Role> = lifecycle.signer_roles().collect();

        if self
            .find_object(&new.type_name, &new.reference, &new.revision)
            .is_some()
        {
            return Err(CatalogError::DuplicateObject {
                type_name: new.type_name,
                reference: new.reference,
                revision: new.revision,
            });
        }

        let id = ObjectId::new();
        let object = VersionedObject {
            id,
            kind: new.kind,
            type_name: new.type_name,
            reference: new.reference,
            revision: new.revision,
            owner: creator,
            creator,
            state,
            lifecycle: lifecycle_name,
            cancelled: false,
            created_at: at,
        };
        let details = object.label();
        self.objects.insert(id, object);

        for role in signer_roles {
            self.add_role(id, creator, role, at)?;
        }
        self.roll_state_history(id, at)?;
        self.record(id, HistoryAction::Create, details, creator, at);
        Ok(id)
    }

    pub fn object(&self, id: ObjectId) -> CatalogResult<&VersionedObject> {
        self.objects.get(&id).ok_or(CatalogError::UnknownObject(id))
    }

    pub fn objects(&self) -> impl Iterator<Item = &VersionedObject> {
        self.objects.values()
    }

    pub fn find_object(
        &self,
        type_name: &str,
        reference: &str,
        revision: &str,
    ) -> Option<&VersionedObject> {
        self.objects.values().find(|o| {
            o.type_name == type_name && o.reference == reference && o.revision == revision
        })
    }

    fn object_mut(&mut self, id: ObjectId) -> CatalogResult<&mut VersionedObject> {
        self.objects.get_mut(&id).ok_or(CatalogError::UnknownObject(id))
    }

    /// Move an object to `state` of its current lifecycle.
    ///
    /// Raw storage write, no governance check. Used for imports and by the
    /// promotion rules once they have validated a transition.
    pub fn set_state(
        &mut self,
        id: ObjectId,
        state: &str,
        at: DateTime<Utc>,
    ) -> CatalogResult<()> {
        let lifecycle = self.lifecycle_of(id)?;
        lifecycle.position(state)?;
        self.object_mut(id)?.state = state.to_string();
        self.roll_state_history(id, at)
    }

    pub(crate) fn set_owner(&mut self, id: ObjectId, owner: UserId) -> CatalogResult<()> {
        self.user(owner)?;
        self.object_mut(id)?.owner = owner;
        Ok(())
    }

    pub(crate) fn mark_cancelled(&mut self, id: ObjectId, at: DateTime<Utc>) -> CatalogResult<()> {
        self.object_mut(id)?.cancelled = true;
        self.roll_state_history(id, at)
    }

    /// Whether the object is official now (`None`) or was at `as_of`.
    pub fn is_official(&self, id: ObjectId, as_of: Option<DateTime<Utc>>) -> CatalogResult<bool> {
        let object = self.object(id)?;
        match as_of {
            None => {
                let lifecycle = self.lifecycle(&object.lifecycle)?;
                Ok(!object.cancelled && lifecycle.is_official(&object.state))
            }
            Some(t) => Ok(self
                .state_history
                .iter()
                .any(|h| h.object == id && h.validity.contains(t) && h.official)),
        }
    }

    /// Past the official state, at the end of its lifecycle.
    pub fn is_deprecated(&self, id: ObjectId) -> CatalogResult<bool> {
        let object = self.object(id)?;
        let lifecycle = self.lifecycle(&object.lifecycle)?;
        Ok(!object.cancelled
            && lifecycle.is_last(&object.state)
            && lifecycle.position(&object.state)? > lifecycle.official_position())
    }

    fn roll_state_history(&mut self, id: ObjectId, at: DateTime<Utc>) -> CatalogResult<()> {
        let object = self.object(id)?;
        let lifecycle = self.lifecycle(&object.lifecycle)?;
        let official = !object.cancelled && lifecycle.is_official(&object.state);
        let lifecycle_name = object.lifecycle.clone();
        let state = object.state.clone();

        for entry in self
            .state_history
            .iter_mut()
            .filter(|h| h.object == id && h.validity.is_active())
        {
            entry.validity.end_at(at);
        }
        let link = self.next_link_id();
        self.state_history.push(StateHistory {
            id: link,
            object: id,
            lifecycle: lifecycle_name,
            state,
            official,
            validity: Validity::starting(at),
        });
        Ok(())
    }

    pub fn state_history_of(&self, id: ObjectId) -> impl Iterator<Item = &StateHistory> + '_ {
        self.state_history.iter().filter(move |h| h.object == id)
    }

    // =========================================================================
    // Bill of materials
    // =========================================================================

    /// Add an active `parent → child` link.
    pub fn add_child(
        &mut self,
        parent: ObjectId,
        child: ObjectId,
        quantity: f64,
        order: u32,
        unit: &str,
        at: DateTime<Utc>,
    ) -> CatalogResult<LinkId> {
        for id in [parent, child] {
            let object = self.object(id)?;
            if object.kind != ObjectKind::Part {
                return Err(CatalogError::InvalidLink(format!(
                    "{} is not a part",
                    object.label()
                )));
            }
            if object.cancelled {
                return Err(CatalogError::Cancelled(id));
            }
        }
        if !(quantity.is_finite() && quantity > 0.0) {
            return Err(CatalogError::InvalidValue(format!(
                "quantity must be positive, got {}",
                quantity
            )));
        }
        if parent == child || self.is_ancestor(child, parent) {
            return Err(CatalogError::Cycle { parent, child });
        }
        if self.bom.iter().any(|l| {
            l.parent == parent && l.child == child && l.validity.is_active()
        }) {
            return Err(CatalogError::DuplicateLink(format!(
                "link {} -> {}",
                parent, child
            )));
        }

        let id = self.next_link_id();
        self.bom.push(ParentChildLink {
            id,
            parent,
            child,
            quantity,
            order,
            unit: unit.to_string(),
            validity: Validity::starting(at),
        });
        Ok(id)
    }

    /// End the active `parent → child` link.
    pub fn end_child(
        &mut self,
        parent: ObjectId,
        child: ObjectId,
        at: DateTime<Utc>,
    ) -> CatalogResult<()> {
        self.bom
            .iter_mut()
            .find(|l| l.parent == parent && l.child == child && l.validity.is_active())
            .map(|l| {
                l.validity.end_at(at);
            })
            .ok_or_else(|| CatalogError::NoActiveLink(format!("link {} -> {}", parent, child)))
    }

    /// Links below `parent`, in creation order.
    pub fn child_links(
        &self,
        parent: ObjectId,
        as_of: Option<DateTime<Utc>>,
    ) -> impl Iterator<Item = &ParentChildLink> + '_ {
        self.bom
            .iter()
            .filter(move |l| l.parent == parent && l.validity.at(as_of))
    }

    /// Links above `child`, in creation order.
    pub fn parent_links(
        &self,
        child: ObjectId,
        as_of: Option<DateTime<Utc>>,
    ) -> impl Iterator<Item = &ParentChildLink> + '_ {
        self.bom
            .iter()
            .filter(move |l| l.child == child && l.validity.at(as_of))
    }

    pub fn has_children(&self, parent: ObjectId, as_of: Option<DateTime<Utc>>) -> bool {
        self.child_links(parent, as_of).next().is_some()
    }

    /// Whether `id` takes part in an active BOM or document link.
    pub fn is_linked(&self, id: ObjectId) -> bool {
        self.bom
            .iter()
            .any(|l| (l.parent == id || l.child == id) && l.validity.is_active())
            || self
                .document_parts
                .iter()
                .any(|l| (l.document == id || l.part == id) && l.validity.is_active())
    }

    /// End every active BOM and document link touching `id`.
    pub(crate) fn end_links_of(&mut self, id: ObjectId, at: DateTime<Utc>) -> usize {
        let bom = self
            .bom
            .iter_mut()
            .filter(|l| l.parent == id || l.child == id)
            .map(|l| l.validity.end_at(at))
            .filter(|ended| *ended)
            .count();
        let documents = self
            .document_parts
            .iter_mut()
            .filter(|l| l.document == id || l.part == id)
            .map(|l| l.validity.end_at(at))
            .filter(|ended| *ended)
            .count();
        bom + documents
    }

    /// Whether `ancestor` is a transitive parent of `node` over active links.
    pub fn is_ancestor(&self, ancestor: ObjectId, node: ObjectId) -> bool {
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::from([node]);
        while let Some(current) = queue.pop_front() {
            for link in self.parent_links(current, None) {
                if link.parent == ancestor {
                    return true;
                }
                if visited.insert(link.parent) {
                    queue.push_back(link.parent);
                }
            }
        }
        false
    }

    // =========================================================================
    // Documents and files
    // =========================================================================

    pub fn attach_document(
        &mut self,
        document: ObjectId,
        part: ObjectId,
        at: DateTime<Utc>,
    ) -> CatalogResult<LinkId> {
        let doc = self.object(document)?;
        if doc.kind != ObjectKind::Document {
            return Err(CatalogError::InvalidLink(format!("{} is not a document", doc.label())));
        }
        let target = self.object(part)?;
        if target.kind != ObjectKind::Part {
            return Err(CatalogError::InvalidLink(format!("{} is not a part", target.label())));
        }
        for object in [doc, target] {
            if object.cancelled {
                return Err(CatalogError::Cancelled(object.id));
            }
        }
        if self
            .document_parts
            .iter()
            .any(|l| l.document == document && l.part == part && l.validity.is_active())
        {
            return Err(CatalogError::DuplicateLink(format!(
                "document link {} -> {}",
                document, part
            )));
        }
        let id = self.next_link_id();
        self.document_parts.push(DocumentPartLink {
            id,
            document,
            part,
            validity: Validity::starting(at),
        });
        Ok(id)
    }

    pub fn detach_document(
        &mut self,
        document: ObjectId,
        part: ObjectId,
        at: DateTime<Utc>,
    ) -> CatalogResult<()> {
        self.document_parts
            .iter_mut()
            .find(|l| l.document == document && l.part == part && l.validity.is_active())
            .map(|l| {
                l.validity.end_at(at);
            })
            .ok_or_else(|| {
                CatalogError::NoActiveLink(format!("document link {} -> {}", document, part))
            })
    }

    /// Documents attached to `part`.
    pub fn documents_of(
        &self,
        part: ObjectId,
        as_of: Option<DateTime<Utc>>,
    ) -> impl Iterator<Item = ObjectId> + '_ {
        self.document_parts
            .iter()
            .filter(move |l| l.part == part && l.validity.at(as_of))
            .map(|l| l.document)
    }

    /// Parts a document is attached to.
    pub fn parts_of(
        &self,
        document: ObjectId,
        as_of: Option<DateTime<Utc>>,
    ) -> impl Iterator<Item = ObjectId> + '_ {
        self.document_parts
            .iter()
            .filter(move |l| l.document == document && l.validity.at(as_of))
            .map(|l| l.part)
    }

    pub fn add_file(&mut self, document: ObjectId, filename: &str) -> CatalogResult<LinkId> {
        let doc = self.object(document)?;
        if doc.kind != ObjectKind::Document {
            return Err(CatalogError::InvalidLink(format!("{} is not a document", doc.label())));
        }
        if doc.cancelled {
            return Err(CatalogError::Cancelled(document));
        }
        if filename.trim().is_empty() {
            return Err(CatalogError::InvalidValue("filename is empty".to_string()));
        }
        let id = self.next_link_id();
        self.files.push(DocumentFile {
            id,
            document,
            filename: filename.to_string(),
            locked_by: None,
            deleted: false,
        });
        Ok(id)
    }

    pub fn file(&self, id: LinkId) -> CatalogResult<&DocumentFile> {
        self.files
            .iter()
            .find(|f| f.id == id && !f.deleted)
            .ok_or(CatalogError::UnknownFile(id))
    }

    /// Live files of a document.
    pub fn files_of(&self, document: ObjectId) -> impl Iterator<Item = &DocumentFile> + '_ {
        self.files
            .iter()
            .filter(move |f| f.document == document && !f.deleted)
    }

    fn file_mut(&mut self, id: LinkId) -> CatalogResult<&mut DocumentFile> {
        self.files
            .iter_mut()
            .find(|f| f.id == id && !f.deleted)
            .ok_or(CatalogError::UnknownFile(id))
    }

    /// Check a file out for `user`.
    pub fn lock_file(&mut self, id: LinkId, user: UserId) -> CatalogResult<()> {
        self.user(user)?;
        let file = self.file_mut(id)?;
        if let Some(by) = file.locked_by {
            return Err(CatalogError::FileLocked { file: id, by });
        }
        file.locked_by = Some(user);
        Ok(())
    }

    /// Check a file back in. Only the user holding the lock may release it.
    pub fn unlock_file(&mut self, id: LinkId, user: UserId) -> CatalogResult<()> {
        let file = self.file_mut(id)?;
        match file.locked_by {
            Some(by) if by == user => {
                file.locked_by = None;
                Ok(())
            }
            Some(by) => Err(CatalogError::FileLocked { file: id, by }),
            None => Err(CatalogError::NoActiveLink(format!("lock on file {}", id))),
        }
    }

    // =========================================================================
    // Roles
    // =========================================================================

    pub fn add_role(
        &mut self,
        object: ObjectId,
        user: UserId,
        role: Role,
        at: DateTime<Utc>,
    ) -> CatalogResult<LinkId> {
        self.object(object)?;
        self.user(user)?;
        if self.has_role(object, user, role, None) {
            return Err(CatalogError::DuplicateLink(format!(
                "role {} for {} on {}",
                role, user, object
            )));
        }
        let id = self.next_link_id();
        self.roles.push(UserRoleLink {
            id,
            object,
            user,
            role,
            validity: Validity::starting(at),
        });
        Ok(id)
    }

    pub fn end_role(
        &mut self,
        object: ObjectId,
        user: UserId,
        role: Role,
        at: DateTime<Utc>,
    ) -> CatalogResult<()> {
        self.roles
            .iter_mut()
            .find(|l| l.object == object && l.user == user && l.role == role && l.validity.is_active())
            .map(|l| {
                l.validity.end_at(at);
            })
            .ok_or_else(|| {
                CatalogError::NoActiveLink(format!("role {} for {} on {}", role, user, object))
            })
    }

    /// End every signer link of an object. Returns how many were ended.
    pub(crate) fn end_signer_roles(&mut self, object: ObjectId, at: DateTime<Utc>) -> usize {
        let mut ended = 0;
        for link in self
            .roles
            .iter_mut()
            .filter(|l| l.object == object && l.role.is_signer())
        {
            if link.validity.end_at(at) {
                ended += 1;
            }
        }
        ended
    }

    /// Direct holders of `role`, in link creation order.
    pub fn role_holders(
        &self,
        object: ObjectId,
        role: Role,
        as_of: Option<DateTime<Utc>>,
    ) -> Vec<UserId> {
        let mut seen = BTreeSet::new();
        self.roles
            .iter()
            .filter(|l| l.object == object && l.role == role && l.validity.at(as_of))
            .filter(|l| seen.insert(l.user))
            .map(|l| l.user)
            .collect()
    }

    pub fn has_role(
        &self,
        object: ObjectId,
        user: UserId,
        role: Role,
        as_of: Option<DateTime<Utc>>,
    ) -> bool {
        self.roles.iter().any(|l| {
            l.object == object && l.user == user && l.role == role && l.validity.at(as_of)
        })
    }

    pub fn role_links(
        &self,
        object: ObjectId,
        as_of: Option<DateTime<Utc>>,
    ) -> impl Iterator<Item = &UserRoleLink> + '_ {
        self.roles
            .iter()
            .filter(move |l| l.object == object && l.validity.at(as_of))
    }

    // =========================================================================
    // Delegation
    // =========================================================================

    pub fn add_delegation(
        &mut self,
        delegator: UserId,
        delegatee: UserId,
        role: Role,
        at: DateTime<Utc>,
    ) -> CatalogResult<LinkId> {
        self.user(delegator)?;
        self.user(delegatee)?;
        if delegator == delegatee {
            return Err(CatalogError::InvalidLink("a user cannot delegate to itself".to_string()));
        }
        if self.delegations.iter().any(|l| {
            l.delegator == delegator
                && l.delegatee == delegatee
                && l.role == role
                && l.validity.is_active()
        }) {
            return Err(CatalogError::DuplicateLink(format!(
                "delegation of {} from {} to {}",
                role, delegator, delegatee
            )));
        }
        let id = self.next_link_id();
        self.delegations.push(DelegationLink {
            id,
            delegator,
            delegatee,
            role,
            validity: Validity::starting(at),
        });
        Ok(id)
    }

    pub fn end_delegation(
        &mut self,
        delegator: UserId,
        delegatee: UserId,
        role: Role,
        at: DateTime<Utc>,
    ) -> CatalogResult<()> {
        self.delegations
            .iter_mut()
            .find(|l| {
                l.delegator == delegator
                    && l.delegatee == delegatee
                    && l.role == role
                    && l.validity.is_active()
            })
            .map(|l| {
                l.validity.end_at(at);
            })
            .ok_or_else(|| {
                CatalogError::NoActiveLink(format!(
                    "delegation of {} from {} to {}",
                    role, delegator, delegatee
                ))
            })
    }

    /// Users `delegator` directly delegated `role` to.
    pub fn delegatees(
        &self,
        delegator: UserId,
        role: Role,
        as_of: Option<DateTime<Utc>>,
    ) -> Vec<UserId> {
        self.delegations
            .iter()
            .filter(|l| l.delegator == delegator && l.role == role && l.validity.at(as_of))
            .map(|l| l.delegatee)
            .collect()
    }

    /// Users who directly delegated `role` to `delegatee`.
    pub fn delegators(
        &self,
        delegatee: UserId,
        role: Role,
        as_of: Option<DateTime<Utc>>,
    ) -> Vec<UserId> {
        self.delegations
            .iter()
            .filter(|l| l.delegatee == delegatee && l.role == role && l.validity.at(as_of))
            .map(|l| l.delegator)
            .collect()
    }

    pub fn delegation_links(&self) -> impl Iterator<Item = &DelegationLink> {
        self.delegations.iter()
    }

    // =========================================================================
    // Approvals
    // =========================================================================

    /// Store an approval as is. Raw storage write, see `set_state`.
    pub fn add_approval(
        &mut self,
        object: ObjectId,
        user: UserId,
        current_state: &str,
        next_state: &str,
        at: DateTime<Utc>,
    ) -> CatalogResult<LinkId> {
        self.object(object)?;
        self.user(user)?;
        if self.has_approved(object, user, current_state, next_state, None) {
            return Err(CatalogError::DuplicateLink(format!(
                "approval by {} on {}",
                user, object
            )));
        }
        let id = self.next_link_id();
        self.approvals.push(PromotionApproval {
            id,
            object,
            user,
            current_state: current_state.to_string(),
            next_state: next_state.to_string(),
            validity: Validity::starting(at),
        });
        Ok(id)
    }

    pub fn approvals(
        &self,
        object: ObjectId,
        as_of: Option<DateTime<Utc>>,
    ) -> impl Iterator<Item = &PromotionApproval> + '_ {
        self.approvals
            .iter()
            .filter(move |a| a.object == object && a.validity.at(as_of))
    }

    pub fn has_approved(
        &self,
        object: ObjectId,
        user: UserId,
        current_state: &str,
        next_state: &str,
        as_of: Option<DateTime<Utc>>,
    ) -> bool {
        self.approvals(object, as_of).any(|a| {
            a.user == user && a.current_state == current_state && a.next_state == next_state
        })
    }

    /// End every active approval of an object. Returns how many were ended.
    pub(crate) fn end_approvals(&mut self, object: ObjectId, at: DateTime<Utc>) -> usize {
        let mut ended = 0;
        for approval in self.approvals.iter_mut().filter(|a| a.object == object) {
            if approval.validity.end_at(at) {
                ended += 1;
            }
        }
        ended
    }

    // =========================================================================
    // Revisions
    // =========================================================================

    /// Link `new` as the next revision of `old`. Raw storage write, see
    /// `set_state`.
    pub fn add_revision_link(
        &mut self,
        old: ObjectId,
        new: ObjectId,
        at: DateTime<Utc>,
    ) -> CatalogResult<LinkId> {
        self.object(old)?;
        self.object(new)?;
        if self.next_revision(old).is_some() {
            return Err(CatalogError::DuplicateLink(format!("revision of {}", old)));
        }
        let id = self.next_link_id();
        self.revisions.push(RevisionLink {
            id,
            old,
            new,
            validity: Validity::starting(at),
        });
        Ok(id)
    }

    pub fn next_revision(&self, id: ObjectId) -> Option<ObjectId> {
        self.revisions
            .iter()
            .find(|l| l.old == id && l.validity.is_active())
            .map(|l| l.new)
    }

    pub fn previous_revision(&self, id: ObjectId) -> Option<ObjectId> {
        self.revisions
            .iter()
            .find(|l| l.new == id && l.validity.is_active())
            .map(|l| l.old)
    }

    /// Earlier revisions, oldest first.
    pub fn previous_revisions(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut chain = Vec::new();
        let mut visited = BTreeSet::from([id]);
        let mut current = id;
        while let Some(old) = self.previous_revision(current) {
            if !visited.insert(old) {
                break;
            }
            chain.push(old);
            current = old;
        }
        chain.reverse();
        chain
    }

    /// Every revision of the object's chain, oldest first, itself included.
    pub fn all_revisions(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut chain = self.previous_revisions(id);
        chain.push(id);
        let mut visited: BTreeSet<ObjectId> = chain.iter().copied().collect();
        let mut current = id;
        while let Some(new) = self.next_revision(current) {
            if !visited.insert(new) {
                break;
            }
            chain.push(new);
            current = new;
        }
        chain
    }

    // =========================================================================
    // History
    // =========================================================================

    pub(crate) fn record(
        &mut self,
        object: ObjectId,
        action: HistoryAction,
        details: impl Into<String>,
        user: UserId,
        at: DateTime<Utc>,
    ) {
        let id = self.next_link_id();
        self.history.push(HistoryEntry {
            id,
            object,
            action,
            details: details.into(),
            user,
            at,
        });
    }

    pub fn history_of(&self, object: ObjectId) -> impl Iterator<Item = &HistoryEntry> + '_ {
        self.history.iter().filter(move |h| h.object == object)
    }
}
