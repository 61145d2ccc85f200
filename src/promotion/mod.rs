//! Promotion Subsystem
//!
//! Governance of versioned objects along their lifecycle:
//! - a transition only happens when structure, authority and quorum agree
//! - the official state is a one-way gate: official objects are never demoted
//! - assembly promotion is all-or-nothing
//! - notifications are emitted only for committed changes
//!
//! Operations work on a catalog transaction and return an `Outcome` holding
//! the events to deliver once the transaction has committed.

mod administration;
mod authority;
mod coordinator;
mod eligibility;
mod entity;
mod errors;
mod observability;
mod quorum;

pub use authority::Authority;
pub use coordinator::{AssemblyPromotionCoordinator, Participant};
pub use eligibility::{
    DocumentEligibility, EligibilityContext, EligibilityRegistry, IneligibilityReason,
    PartEligibility, StructuralEligibility,
};
pub use entity::{ApprovalOutcome, Outcome, PromotableEntity};
pub use errors::{GovernanceError, GovernanceErrorKind, GovernanceResult};
pub use observability::{
    MemoryOutbox, Notification, NotificationSink, PromotionEvent, TracingSink,
};
pub use quorum::Quorum;
