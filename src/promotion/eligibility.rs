//! Structural eligibility
//!
//! Each object kind supplies a `StructuralEligibility` rule, selected by
//! the object's type tag through an `EligibilityRegistry` that is injected
//! into the service. Rules are deterministic and side-effect free; they
//! return every reason an object cannot move forward, so a denial can
//! always be explained.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::catalog::{Catalog, ObjectId, ObjectKind, VersionedObject};

/// Why an object cannot be promoted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IneligibilityReason {
    /// The object has been cancelled
    Cancelled,

    /// The object is at the last state of its lifecycle
    LastState { state: String },

    /// A child in the same lifecycle is not more mature than its parent
    ImmatureChild { child: String, state: String },

    /// A child was cancelled after being linked
    CancelledChild { child: String },

    /// A leaf part without an official or draft document
    NoAttachedDocument,

    /// A document without any file
    NoFile,

    /// Every file of a document is checked out by someone else
    FilesLocked,

    /// The object's lifecycle cannot be resolved
    UnknownLifecycle(String),
}

impl IneligibilityReason {
    pub fn description(&self) -> String {
        match self {
            Self::Cancelled => "the object is cancelled".to_string(),
            Self::LastState { state } => {
                format!("the object is at its last state '{}'", state)
            }
            Self::ImmatureChild { child, state } => {
                format!("child {} is still '{}'", child, state)
            }
            Self::CancelledChild { child } => format!("child {} is cancelled", child),
            Self::NoAttachedDocument => {
                "no official or draft document is attached to this leaf part".to_string()
            }
            Self::NoFile => "the document has no file".to_string(),
            Self::FilesLocked => "every file is locked by another user".to_string(),
            Self::UnknownLifecycle(name) => format!("unknown lifecycle '{}'", name),
        }
    }
}

impl fmt::Display for IneligibilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// Inputs of an eligibility check.
pub struct EligibilityContext<'a> {
    pub catalog: &'a Catalog,
    /// Objects promoted together in the same assembly promotion. They count
    /// as already promoted when a parent looks at its children.
    pub co_promoted: &'a BTreeSet<ObjectId>,
}

/// Kind-specific promotability predicate.
pub trait StructuralEligibility: Send + Sync {
    fn blockers(
        &self,
        object: &VersionedObject,
        ctx: &EligibilityContext<'_>,
    ) -> Vec<IneligibilityReason>;
}

/// Parts: children must be ahead, leaves need a document.
#[derive(Debug, Default, Clone, Copy)]
pub struct PartEligibility;

impl StructuralEligibility for PartEligibility {
    fn blockers(
        &self,
        part: &VersionedObject,
        ctx: &EligibilityContext<'_>,
    ) -> Vec<IneligibilityReason> {
        let catalog = ctx.catalog;
        let lifecycle = match catalog.lifecycle(&part.lifecycle) {
            Ok(lc) => lc,
            Err(_) => return vec![IneligibilityReason::UnknownLifecycle(part.lifecycle.clone())],
        };
        // past the release point, only the lifecycle end matters
        if lifecycle.is_official(&part.state) {
            return Vec::new();
        }
        let position = lifecycle.position(&part.state).unwrap_or(0);

        let mut reasons = Vec::new();
        let mut has_children = false;
        for link in catalog.child_links(part.id, None) {
            has_children = true;
            let child = match catalog.object(link.child) {
                Ok(child) => child,
                Err(_) => continue,
            };
            if child.cancelled {
                reasons.push(IneligibilityReason::CancelledChild {
                    child: child.label(),
                });
                continue;
            }
            if child.lifecycle != part.lifecycle || ctx.co_promoted.contains(&child.id) {
                continue;
            }
            let child_position = lifecycle.position(&child.state).unwrap_or(0);
            if child_position <= position {
                reasons.push(IneligibilityReason::ImmatureChild {
                    child: child.label(),
                    state: child.state.clone(),
                });
            }
        }

        if !has_children && !has_attachable_document(catalog, part.id) {
            reasons.push(IneligibilityReason::NoAttachedDocument);
        }
        reasons
    }
}

fn has_attachable_document(catalog: &Catalog, part: ObjectId) -> bool {
    catalog.documents_of(part, None).any(|doc| {
        let Ok(document) = catalog.object(doc) else {
            return false;
        };
        let Ok(lifecycle) = catalog.lifecycle(&document.lifecycle) else {
            return false;
        };
        !document.cancelled
            && (lifecycle.is_official(&document.state)
                || lifecycle.first_state() == document.state)
    })
}

/// Documents: at least one file not checked out by someone else.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentEligibility;

impl StructuralEligibility for DocumentEligibility {
    fn blockers(
        &self,
        document: &VersionedObject,
        ctx: &EligibilityContext<'_>,
    ) -> Vec<IneligibilityReason> {
        let mut files = ctx.catalog.files_of(document.id).peekable();
        if files.peek().is_none() {
            return vec![IneligibilityReason::NoFile];
        }
        let usable = files.any(|f| match f.locked_by {
            None => true,
            Some(user) => user == document.owner,
        });
        if usable {
            Vec::new()
        } else {
            vec![IneligibilityReason::FilesLocked]
        }
    }
}

/// Eligibility rules by object kind.
#[derive(Clone)]
pub struct EligibilityRegistry {
    rules: BTreeMap<ObjectKind, Arc<dyn StructuralEligibility>>,
}

impl EligibilityRegistry {
    /// A registry without kind-specific rules.
    pub fn empty() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    /// Part and document rules.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(ObjectKind::Part, Arc::new(PartEligibility));
        registry.register(ObjectKind::Document, Arc::new(DocumentEligibility));
        registry
    }

    pub fn register(&mut self, kind: ObjectKind, rule: Arc<dyn StructuralEligibility>) {
        self.rules.insert(kind, rule);
    }

    /// Every reason the object cannot be promoted. Empty means eligible.
    ///
    /// Cancelled objects and objects at their last state are never
    /// promotable; otherwise the kind's rule decides.
    pub fn blockers(
        &self,
        object: &VersionedObject,
        ctx: &EligibilityContext<'_>,
    ) -> Vec<IneligibilityReason> {
        if object.cancelled {
            return vec![IneligibilityReason::Cancelled];
        }
        match ctx.catalog.lifecycle(&object.lifecycle) {
            Ok(lc) if lc.is_last(&object.state) => {
                return vec![IneligibilityReason::LastState {
                    state: object.state.clone(),
                }]
            }
            Ok(_) => {}
            Err(_) => {
                return vec![IneligibilityReason::UnknownLifecycle(
                    object.lifecycle.clone(),
                )]
            }
        }
        match self.rules.get(&object.kind) {
            Some(rule) => rule.blockers(object, ctx),
            None => Vec::new(),
        }
    }

    pub fn is_promotable(&self, object: &VersionedObject, ctx: &EligibilityContext<'_>) -> bool {
        self.blockers(object, ctx).is_empty()
    }
}

impl Default for EligibilityRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for EligibilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EligibilityRegistry")
            .field("kinds", &self.rules.keys().collect::<Vec<_>>())
            .finish()
    }
}
