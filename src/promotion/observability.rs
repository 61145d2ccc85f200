//! Promotion Events and Notification Sinks
//!
//! Governance operations describe what they changed as `PromotionEvent`s.
//! Events are handed to a `NotificationSink` only after the catalog
//! transaction has committed; a failed attempt produces no notification.
//! Sinks never influence the outcome of an operation.

use std::sync::Mutex;

use serde::Serialize;

use crate::catalog::{ObjectId, UserId};

/// What happened to an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PromotionEvent {
    /// plm.object.promoted
    Promoted {
        object: ObjectId,
        from: String,
        to: String,
        actor: UserId,
    },

    /// plm.object.demoted
    Demoted {
        object: ObjectId,
        from: String,
        to: String,
        actor: UserId,
    },

    /// plm.approval.recorded
    ApprovalRecorded {
        object: ObjectId,
        actor: UserId,
        /// Signers the approval was recorded for
        signers: Vec<UserId>,
        from: String,
        to: String,
    },

    /// plm.approval.discarded
    ApprovalsDiscarded {
        object: ObjectId,
        actor: UserId,
        count: usize,
    },

    /// plm.object.deprecated
    /// An official revision superseded by a newly official one.
    Deprecated {
        object: ObjectId,
        superseded_by: ObjectId,
    },

    /// plm.object.cancelled
    Cancelled {
        object: ObjectId,
        actor: UserId,
    },

    /// plm.object.revised
    Revised {
        object: ObjectId,
        revision: ObjectId,
        actor: UserId,
    },
}

impl PromotionEvent {
    /// Get the event name for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Promoted { .. } => "plm.object.promoted",
            Self::Demoted { .. } => "plm.object.demoted",
            Self::ApprovalRecorded { .. } => "plm.approval.recorded",
            Self::ApprovalsDiscarded { .. } => "plm.approval.discarded",
            Self::Deprecated { .. } => "plm.object.deprecated",
            Self::Cancelled { .. } => "plm.object.cancelled",
            Self::Revised { .. } => "plm.object.revised",
        }
    }

    /// The object the event is about.
    pub fn object(&self) -> ObjectId {
        match self {
            Self::Promoted { object, .. }
            | Self::Demoted { object, .. }
            | Self::ApprovalRecorded { object, .. }
            | Self::ApprovalsDiscarded { object, .. }
            | Self::Deprecated { object, .. }
            | Self::Cancelled { object, .. }
            | Self::Revised { object, .. } => *object,
        }
    }
}

/// Receives events after commit, with the users to notify.
///
/// Delivery is fire-and-forget: implementations must not block the caller
/// and cannot fail the operation.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: &PromotionEvent, recipients: &[UserId]);
}

/// A delivered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub event: PromotionEvent,
    pub recipients: Vec<UserId>,
}

/// Sink that keeps every notification in memory.
#[derive(Debug, Default)]
pub struct MemoryOutbox {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Notification> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().map(|sent| sent.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of every delivered event, in order.
    pub fn event_names(&self) -> Vec<&'static str> {
        self.messages().iter().map(|n| n.event.event_name()).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }
}

impl NotificationSink for MemoryOutbox {
    fn notify(&self, event: &PromotionEvent, recipients: &[UserId]) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(Notification {
                event: event.clone(),
                recipients: recipients.to_vec(),
            });
        }
    }
}

/// Sink that writes every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, event: &PromotionEvent, recipients: &[UserId]) {
        tracing::info!(
            event = event.event_name(),
            object = %event.object(),
            recipients = recipients.len(),
            "notification"
        );
    }
}
