//! Catalog transactions
//!
//! A transaction works on a private copy of a catalog snapshot. Nothing is
//! visible to readers until `commit` hands the copy back to the owner of
//! the published snapshot; dropping or aborting the transaction discards
//! every change.

use std::ops::{Deref, DerefMut};

use super::store::Catalog;

/// Working copy of a catalog for one all-or-nothing operation.
#[derive(Debug)]
pub struct CatalogTransaction {
    working: Catalog,
    base_version: u64,
}

impl CatalogTransaction {
    /// Start a transaction from a committed snapshot.
    pub fn begin(base: &Catalog) -> Self {
        Self {
            working: base.clone(),
            base_version: base.version(),
        }
    }

    /// Version of the snapshot this transaction started from.
    pub fn base_version(&self) -> u64 {
        self.base_version
    }

    /// Finish the transaction and return the new snapshot.
    pub fn commit(mut self) -> Catalog {
        self.working.bump_version();
        self.working
    }

    /// Discard every change.
    pub fn abort(self) {}
}

impl Deref for CatalogTransaction {
    type Target = Catalog;

    fn deref(&self) -> &Catalog {
        &self.working
    }
}

impl DerefMut for CatalogTransaction {
    fn deref_mut(&mut self) -> &mut Catalog {
        &mut self.working
    }
}
