//! Link records
//!
//! Every relationship in the catalog carries an explicit validity interval
//! `[start, end)`. Ending a link closes the interval; records are never
//! removed, so any past instant can be queried.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{LinkId, ObjectId, UserId};
use crate::lifecycle::Role;

/// Half-open validity interval. `end == None` means still active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl Validity {
    pub fn starting(start: DateTime<Utc>) -> Self {
        Self { start, end: None }
    }

    pub fn is_active(&self) -> bool {
        self.end.is_none()
    }

    /// `start <= t < end`.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && self.end.map(|end| t < end).unwrap_or(true)
    }

    /// Active now (`None`) or valid at the given instant.
    pub fn at(&self, as_of: Option<DateTime<Utc>>) -> bool {
        match as_of {
            None => self.is_active(),
            Some(t) => self.contains(t),
        }
    }

    /// Close the interval. Returns false if it was already closed.
    pub fn end_at(&mut self, t: DateTime<Utc>) -> bool {
        if self.end.is_some() {
            return false;
        }
        self.end = Some(t.max(self.start));
        true
    }
}

/// A BOM edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentChildLink {
    pub id: LinkId,
    pub parent: ObjectId,
    pub child: ObjectId,
    pub quantity: f64,
    pub order: u32,
    pub unit: String,
    pub validity: Validity,
}

/// A document attached to a part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPartLink {
    pub id: LinkId,
    pub document: ObjectId,
    pub part: ObjectId,
    pub validity: Validity,
}

/// A file held by a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFile {
    pub id: LinkId,
    pub document: ObjectId,
    pub filename: String,
    pub locked_by: Option<UserId>,
    #[serde(default)]
    pub deleted: bool,
}

/// A role held by a user on an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRoleLink {
    pub id: LinkId,
    pub object: ObjectId,
    pub user: UserId,
    pub role: Role,
    pub validity: Validity,
}

/// `delegatee` may act as `delegator` for `role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationLink {
    pub id: LinkId,
    pub delegator: UserId,
    pub delegatee: UserId,
    pub role: Role,
    pub validity: Validity,
}

/// A recorded approval for a pending transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionApproval {
    pub id: LinkId,
    pub object: ObjectId,
    pub user: UserId,
    pub current_state: String,
    pub next_state: String,
    pub validity: Validity,
}

/// `new` is the revision following `old`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionLink {
    pub id: LinkId,
    pub old: ObjectId,
    pub new: ObjectId,
    pub validity: Validity,
}

/// State an object was in during `validity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateHistory {
    pub id: LinkId,
    pub object: ObjectId,
    pub lifecycle: String,
    pub state: String,
    pub official: bool,
    pub validity: Validity,
}

/// Governance actions recorded in the history log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Create,
    Promote,
    Demote,
    Approve,
    DiscardApprovals,
    Cancel,
    Deprecate,
    Revise,
    AddSigner,
    RemoveSigner,
    ReplaceSigner,
    AddNotified,
    AddChild,
    RemoveChild,
    AttachDocument,
    DetachDocument,
    AddFile,
    LockFile,
    UnlockFile,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Promote => "promote",
            Self::Demote => "demote",
            Self::Approve => "approve",
            Self::DiscardApprovals => "discard_approvals",
            Self::Cancel => "cancel",
            Self::Deprecate => "deprecate",
            Self::Revise => "revise",
            Self::AddSigner => "add_signer",
            Self::RemoveSigner => "remove_signer",
            Self::ReplaceSigner => "replace_signer",
            Self::AddNotified => "add_notified",
            Self::AddChild => "add_child",
            Self::RemoveChild => "remove_child",
            Self::AttachDocument => "attach_document",
            Self::DetachDocument => "detach_document",
            Self::AddFile => "add_file",
            Self::LockFile => "lock_file",
            Self::UnlockFile => "unlock_file",
        }
    }
}

/// One entry of an object's history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: LinkId,
    pub object: ObjectId,
    pub action: HistoryAction,
    pub details: String,
    pub user: UserId,
    pub at: DateTime<Utc>,
}
