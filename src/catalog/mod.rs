//! Catalog
//!
//! The persistence boundary of the governance core: users, versioned
//! objects and every link between them, each link carrying an explicit
//! validity interval.

mod clock;
mod errors;
mod ids;
mod links;
mod object;
mod persist;
mod store;
mod transaction;

pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{CatalogError, CatalogResult};
pub use ids::{LinkId, ObjectId, UserId};
pub use links::{
    DelegationLink, DocumentFile, DocumentPartLink, HistoryAction, HistoryEntry,
    ParentChildLink, PromotionApproval, RevisionLink, StateHistory, UserRoleLink, Validity,
};
pub use object::{NewObject, ObjectKind, User, VersionedObject};
pub use persist::CatalogFile;
pub use store::Catalog;
pub use transaction::CatalogTransaction;
pub(crate) use store::check_name;
