//! PLM Service
//!
//! The entry point of the governance core. The service publishes the
//! current catalog as an immutable snapshot and serializes writers:
//!
//! 1. take the writer lock
//! 2. copy the current snapshot into a transaction
//! 3. validate and apply the operation on the copy
//! 4. publish the copy (commit point)
//! 5. deliver notifications
//!
//! An error at step 3 drops the copy, so readers never observe a partial
//! change and no notification is sent. Readers clone the `Arc` of the
//! current snapshot and never wait for a writer to finish validating.

mod admin;

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use crate::bom::{BomEntry, BomTraversal, TraversalDirection, TraversalOptions};
use crate::catalog::{Catalog, CatalogTransaction, Clock, ObjectId, SystemClock, UserId};
use crate::config::{ConfigResult, PlmConfig};
use crate::delegation::DelegationResolver;
use crate::lifecycle::Role;
use crate::promotion::{
    ApprovalOutcome, AssemblyPromotionCoordinator, EligibilityContext, EligibilityRegistry,
    GovernanceResult, IneligibilityReason, NotificationSink, Outcome,
    PromotableEntity, PromotionEvent, Quorum, TracingSink,
};

/// Thread-safe façade over the catalog and the governance rules.
pub struct PlmService {
    current: RwLock<Arc<Catalog>>,
    writer: Mutex<()>,
    registry: EligibilityRegistry,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
}

impl PlmService {
    /// A service over `catalog` with the standard rules, the system clock
    /// and a sink that logs notifications.
    pub fn new(catalog: Catalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
            writer: Mutex::new(()),
            registry: EligibilityRegistry::standard(),
            sink: Arc::new(TracingSink),
            clock: Arc::new(SystemClock),
        }
    }

    /// A service over a freshly seeded catalog.
    pub fn from_config(config: &PlmConfig) -> ConfigResult<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let catalog = config.seed_catalog(clock.now())?;
        Ok(Self::new(catalog))
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_registry(mut self, registry: EligibilityRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// The current committed catalog.
    pub fn snapshot(&self) -> Arc<Catalog> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&current)
    }

    pub fn version(&self) -> u64 {
        self.snapshot().version()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // =========================================================================
    // Transaction plumbing
    // =========================================================================

    /// Run `op` on a transaction and commit it if it succeeds.
    fn write<T>(
        &self,
        operation: &'static str,
        op: impl FnOnce(&mut Catalog, DateTime<Utc>) -> GovernanceResult<Outcome<T>>,
    ) -> GovernanceResult<T> {
        let writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut tx = CatalogTransaction::begin(&self.snapshot());
        let base_version = tx.base_version();
        let now = self.clock.now();

        let outcome = match op(&mut *tx, now) {
            Ok(outcome) => outcome,
            Err(e) => {
                tx.abort();
                tracing::warn!(
                    operation,
                    code = e.kind().code(),
                    error = %e,
                    "operation rejected"
                );
                return Err(e);
            }
        };

        let committed = Arc::new(tx.commit());
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&committed);
        drop(writer);

        tracing::debug!(
            operation,
            base_version,
            version = committed.version(),
            events = outcome.events.len(),
            "committed"
        );
        self.dispatch(&committed, &outcome.events);
        Ok(outcome.value)
    }

    fn dispatch(&self, catalog: &Catalog, events: &[PromotionEvent]) {
        for event in events {
            let recipients = recipients(catalog, event.object());
            self.sink.notify(event, &recipients);
        }
    }

    // =========================================================================
    // Promotion
    // =========================================================================

    /// Promote one object. Returns its new state.
    pub fn promote(&self, object: ObjectId, acting: UserId) -> GovernanceResult<String> {
        let state = self.write("promote", |catalog, now| {
            PromotableEntity::new(catalog, &self.registry, object, now)?.promote(acting)
        })?;
        tracing::info!(object = %object, actor = %acting, to = %state, "promoted");
        Ok(state)
    }

    /// Demote one object. Returns its new state.
    pub fn demote(&self, object: ObjectId, acting: UserId) -> GovernanceResult<String> {
        let state = self.write("demote", |catalog, now| {
            PromotableEntity::new(catalog, &self.registry, object, now)?.demote(acting)
        })?;
        tracing::info!(object = %object, actor = %acting, to = %state, "demoted");
        Ok(state)
    }

    /// Promote an assembly atomically. Returns every promoted object.
    pub fn promote_assembly(
        &self,
        root: ObjectId,
        acting: UserId,
    ) -> GovernanceResult<BTreeSet<ObjectId>> {
        let promoted = self.write("promote_assembly", |catalog, now| {
            AssemblyPromotionCoordinator::new(catalog, &self.registry, now)
                .promote_assembly(root, acting)
        })?;
        tracing::info!(
            root = %root,
            actor = %acting,
            participants = promoted.len(),
            "assembly promoted"
        );
        Ok(promoted)
    }

    pub fn record_approval(
        &self,
        object: ObjectId,
        acting: UserId,
    ) -> GovernanceResult<ApprovalOutcome> {
        self.write("record_approval", |catalog, now| {
            PromotableEntity::new(catalog, &self.registry, object, now)?.record_approval(acting)
        })
    }

    /// Returns how many approvals were discarded.
    pub fn discard_approvals(&self, object: ObjectId, acting: UserId) -> GovernanceResult<usize> {
        self.write("discard_approvals", |catalog, now| {
            PromotableEntity::new(catalog, &self.registry, object, now)?.discard_approvals(acting)
        })
    }

    pub fn cancel(&self, object: ObjectId, acting: UserId) -> GovernanceResult<()> {
        self.write("cancel", |catalog, now| {
            PromotableEntity::new(catalog, &self.registry, object, now)?.cancel(acting)
        })
    }

    /// Create the next revision of `object`. Returns the new object.
    pub fn revise(
        &self,
        object: ObjectId,
        revision: &str,
        acting: UserId,
    ) -> GovernanceResult<ObjectId> {
        self.write("revise", |catalog, now| {
            PromotableEntity::new(catalog, &self.registry, object, now)?.revise(acting, revision)
        })
    }

    // =========================================================================
    // Signers
    // =========================================================================

    pub fn add_signer(
        &self,
        object: ObjectId,
        signer: UserId,
        role: Role,
        acting: UserId,
    ) -> GovernanceResult<()> {
        self.write("add_signer", |catalog, now| {
            PromotableEntity::new(catalog, &self.registry, object, now)?
                .add_signer(acting, signer, role)
        })
    }

    pub fn remove_signer(
        &self,
        object: ObjectId,
        signer: UserId,
        role: Role,
        acting: UserId,
    ) -> GovernanceResult<()> {
        self.write("remove_signer", |catalog, now| {
            PromotableEntity::new(catalog, &self.registry, object, now)?
                .remove_signer(acting, signer, role)
        })
    }

    pub fn replace_signer(
        &self,
        object: ObjectId,
        old: UserId,
        new: UserId,
        role: Role,
        acting: UserId,
    ) -> GovernanceResult<()> {
        self.write("replace_signer", |catalog, now| {
            PromotableEntity::new(catalog, &self.registry, object, now)?
                .replace_signer(acting, old, new, role)
        })
    }

    pub fn add_notified(
        &self,
        object: ObjectId,
        user: UserId,
        acting: UserId,
    ) -> GovernanceResult<()> {
        self.write("add_notified", |catalog, now| {
            PromotableEntity::new(catalog, &self.registry, object, now)?.add_notified(acting, user)
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn promotion_blockers(&self, object: ObjectId) -> GovernanceResult<Vec<IneligibilityReason>> {
        let catalog = self.snapshot();
        let ctx = EligibilityContext {
            catalog: &catalog,
            co_promoted: &BTreeSet::new(),
        };
        Ok(self.registry.blockers(catalog.object(object)?, &ctx))
    }

    /// Structurally eligible, with recorded approvals meeting the quorum of
    /// the next transition.
    pub fn is_promotable(&self, object: ObjectId) -> GovernanceResult<bool> {
        if !self.promotion_blockers(object)?.is_empty() {
            return Ok(false);
        }
        let catalog = self.snapshot();
        let current = catalog.object(object)?;
        let next = catalog.lifecycle(&current.lifecycle)?.next(&current.state)?;
        Ok(Quorum::evaluate(&catalog, current, next, None, None)?.is_met())
    }

    pub fn get_children(
        &self,
        object: ObjectId,
        max_depth: i32,
        as_of: Option<DateTime<Utc>>,
        official_only: bool,
    ) -> GovernanceResult<Vec<BomEntry>> {
        self.traverse(object, TraversalDirection::Children, max_depth, as_of, official_only)
    }

    pub fn get_parents(
        &self,
        object: ObjectId,
        max_depth: i32,
        as_of: Option<DateTime<Utc>>,
        official_only: bool,
    ) -> GovernanceResult<Vec<BomEntry>> {
        self.traverse(object, TraversalDirection::Parents, max_depth, as_of, official_only)
    }

    fn traverse(
        &self,
        object: ObjectId,
        direction: TraversalDirection,
        max_depth: i32,
        as_of: Option<DateTime<Utc>>,
        official_only: bool,
    ) -> GovernanceResult<Vec<BomEntry>> {
        let catalog = self.snapshot();
        catalog.object(object)?;
        let options = TraversalOptions {
            max_depth,
            as_of,
            official_only,
        };
        Ok(BomTraversal::new(&catalog, object, direction, options).collect())
    }

    /// Users able to approve for `role` on `object` after delegation.
    pub fn effective_approvers(
        &self,
        object: ObjectId,
        role: Role,
        as_of: Option<DateTime<Utc>>,
    ) -> GovernanceResult<BTreeSet<UserId>> {
        let catalog = self.snapshot();
        catalog.object(object)?;
        Ok(DelegationResolver::new(&catalog).effective_approvers(object, role, as_of))
    }

    pub fn user_id(&self, username: &str) -> GovernanceResult<UserId> {
        Ok(self.snapshot().user_by_name(username)?.id)
    }
}

/// Owner and active role holders of an object, without duplicates.
fn recipients(catalog: &Catalog, object: ObjectId) -> Vec<UserId> {
    let mut seen = HashSet::new();
    let owner = catalog.object(object).map(|o| o.owner).ok();
    owner
        .into_iter()
        .chain(catalog.role_links(object, None).map(|l| l.user))
        .filter(|user| seen.insert(*user))
        .collect()
}
