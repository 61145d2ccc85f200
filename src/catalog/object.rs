//! Users and versioned objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ObjectId, UserId};

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Type tag used to select structural eligibility rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Part,
    Document,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Part => "part",
            ObjectKind::Document => "document",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A part or document, unique by `(type_name, reference, revision)`.
///
/// Objects are never deleted: they are superseded by a new revision or
/// marked cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub type_name: String,
    pub reference: String,
    pub revision: String,
    pub owner: UserId,
    pub creator: UserId,
    pub state: String,
    pub lifecycle: String,
    #[serde(default)]
    pub cancelled: bool,
    pub created_at: DateTime<Utc>,
}

impl VersionedObject {
    /// `type/reference/revision`, for messages and logs.
    pub fn label(&self) -> String {
        format!("{}/{}/{}", self.type_name, self.reference, self.revision)
    }

    pub fn is_part(&self) -> bool {
        self.kind == ObjectKind::Part
    }

    pub fn is_document(&self) -> bool {
        self.kind == ObjectKind::Document
    }
}

/// Attributes of an object to create.
#[derive(Debug, Clone)]
pub struct NewObject {
    pub kind: ObjectKind,
    pub type_name: String,
    pub reference: String,
    pub revision: String,
    /// Lifecycle name, the catalog default when `None`.
    pub lifecycle: Option<String>,
}

impl NewObject {
    pub fn part(type_name: &str, reference: &str, revision: &str) -> Self {
        Self {
            kind: ObjectKind::Part,
            type_name: type_name.to_string(),
            reference: reference.to_string(),
            revision: revision.to_string(),
            lifecycle: None,
        }
    }

    pub fn document(type_name: &str, reference: &str, revision: &str) -> Self {
        Self {
            kind: ObjectKind::Document,
            ..Self::part(type_name, reference, revision)
        }
    }

    pub fn with_lifecycle(mut self, lifecycle: &str) -> Self {
        self.lifecycle = Some(lifecycle.to_string());
        self
    }
}
