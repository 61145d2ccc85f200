//! Shared fixtures for the integration tests.
//!
//! `Assembly::build` turns a tree of `Node`s into a catalog: every node is a
//! part created by `user`, moved to the requested state, and linked below
//! its parent. Leaves get the official document `d1` unless told otherwise.
//! A node repeated with the same reference and revision is created once and
//! linked several times.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use plmcore::catalog::{Catalog, ManualClock, NewObject, ObjectId, UserId};
use plmcore::config::PlmConfig;
use plmcore::lifecycle::LifecycleDefinition;
use plmcore::promotion::{GovernanceError, GovernanceErrorKind, MemoryOutbox};
use plmcore::service::PlmService;

pub const DRAFT: &str = "draft";
pub const PROPOSED: &str = "proposed";
pub const ISSUE: &str = "issue";
pub const OFFICIAL: &str = "official";
pub const DEPRECATED: &str = "deprecated";

pub const DOD: &str = "draft_official_deprecated";
pub const DPOD: &str = "draft_proposed_official_deprecated";
pub const ISSUE_LIFECYCLE: &str = "draft_proposed_issue_official_deprecated";

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// A catalog with the built-in lifecycles, the issue lifecycle, and the
/// users `user`, `brian` and `john`.
pub fn seeded_catalog() -> Catalog {
    let mut catalog = PlmConfig::default().seed_catalog(epoch()).unwrap();
    catalog
        .register_lifecycle(
            LifecycleDefinition::new(
                ISSUE_LIFECYCLE,
                [DRAFT, PROPOSED, ISSUE, OFFICIAL, DEPRECATED],
                OFFICIAL,
            )
            .unwrap(),
        )
        .unwrap();
    for name in ["user", "brian", "john"] {
        catalog.add_user(name, epoch()).unwrap();
    }
    catalog
}

// =============================================================================
// Assembly description
// =============================================================================

#[derive(Debug, Clone)]
pub struct Node {
    reference: &'static str,
    state: &'static str,
    revision: &'static str,
    lifecycle: &'static str,
    doc: Option<bool>,
    signers: Vec<&'static str>,
    approvers: Vec<&'static str>,
    previous: Option<&'static str>,
    next: Option<&'static str>,
    children: Vec<Node>,
}

/// A part at `state` of the default lifecycle, revision `a`.
pub fn part(reference: &'static str, state: &'static str) -> Node {
    Node {
        reference,
        state,
        revision: "a",
        lifecycle: DOD,
        doc: None,
        signers: Vec::new(),
        approvers: Vec::new(),
        previous: None,
        next: None,
        children: Vec::new(),
    }
}

impl Node {
    pub fn with(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    pub fn lifecycle(mut self, lifecycle: &'static str) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn revision(mut self, revision: &'static str) -> Self {
        self.revision = revision;
        self
    }

    pub fn without_doc(mut self) -> Self {
        self.doc = Some(false);
        self
    }

    /// Replace the holders of every signer role.
    pub fn signers(mut self, usernames: &[&'static str]) -> Self {
        self.signers = usernames.to_vec();
        self
    }

    /// Approvals already recorded for the next transition.
    pub fn approvers(mut self, usernames: &[&'static str]) -> Self {
        self.approvers = usernames.to_vec();
        self
    }

    /// Next revision of the node's revision `previous`, built earlier.
    pub fn previous(mut self, previous: &'static str) -> Self {
        self.previous = Some(previous);
        self
    }

    /// Previous revision of the node's revision `next`, built earlier.
    pub fn next(mut self, next: &'static str) -> Self {
        self.next = Some(next);
        self
    }
}

// =============================================================================
// Built assembly
// =============================================================================

#[derive(Debug, Clone)]
pub struct Built {
    pub id: ObjectId,
    pub lifecycle: String,
    pub state: String,
}

pub struct Assembly {
    pub service: PlmService,
    pub outbox: Arc<MemoryOutbox>,
    pub clock: Arc<ManualClock>,
    pub user: UserId,
    pub root: ObjectId,
    pub document: ObjectId,
    parts: BTreeMap<(String, String), Built>,
}

impl Assembly {
    pub fn build(root: Node) -> Self {
        let mut catalog = seeded_catalog();
        let user = user_id(&catalog, "user");
        let document = catalog
            .create_object(
                NewObject::document("Document", "d1", "a").with_lifecycle(DPOD),
                user,
                epoch(),
            )
            .unwrap();
        catalog.set_state(document, OFFICIAL, epoch()).unwrap();

        let mut builder = Builder {
            catalog,
            user,
            document,
            parts: BTreeMap::new(),
        };
        let root = builder.build(&root);

        let outbox = Arc::new(MemoryOutbox::new());
        let clock = Arc::new(ManualClock::new(epoch() + chrono::Duration::hours(1)));
        let service = PlmService::new(builder.catalog)
            .with_sink(outbox.clone())
            .with_clock(clock.clone());
        Self {
            service,
            outbox,
            clock,
            user,
            root,
            document,
            parts: builder.parts,
        }
    }

    pub fn id(&self, reference: &str, revision: &str) -> ObjectId {
        self.parts[&(reference.to_string(), revision.to_string())].id
    }

    pub fn state(&self, reference: &str, revision: &str) -> String {
        let snapshot = self.service.snapshot();
        snapshot
            .object(self.id(reference, revision))
            .unwrap()
            .state
            .clone()
    }

    pub fn user(&self, username: &str) -> UserId {
        self.service.user_id(username).unwrap()
    }

    /// Promote the root assembly as `user` and check that exactly the parts
    /// sharing the root's lifecycle and state moved to `to`.
    pub fn assert_promoted(&self, to: &str) {
        let root = self.root_built();
        let promoted = self
            .service
            .promote_assembly(self.root, self.user)
            .unwrap_or_else(|e| panic!("assembly promotion failed: {}", e));

        let snapshot = self.service.snapshot();
        for ((reference, revision), built) in &self.parts {
            let state = &snapshot.object(built.id).unwrap().state;
            if built.lifecycle == root.lifecycle && built.state == root.state {
                assert_eq!(state, to, "{}/{} was not promoted", reference, revision);
                assert!(promoted.contains(&built.id));
            } else {
                assert_eq!(state, &built.state, "{}/{} moved", reference, revision);
                assert!(!promoted.contains(&built.id));
            }
        }
    }

    /// Attempt the promotion and check that nothing changed.
    pub fn assert_not_promoted(&self) -> GovernanceError {
        let version = self.service.version();
        let sent = self.outbox.len();

        let err = self
            .service
            .promote_assembly(self.root, self.user)
            .expect_err("assembly promotion should fail");
        assert!(
            matches!(
                err.kind(),
                GovernanceErrorKind::Promotion
                    | GovernanceErrorKind::Controller
                    | GovernanceErrorKind::Permission
            ),
            "unexpected error {:?}",
            err
        );

        let snapshot = self.service.snapshot();
        for ((reference, revision), built) in &self.parts {
            assert_eq!(
                snapshot.object(built.id).unwrap().state,
                built.state,
                "{}/{} moved",
                reference,
                revision
            );
        }
        assert_eq!(self.service.version(), version);
        assert_eq!(self.outbox.len(), sent);
        err
    }

    fn root_built(&self) -> &Built {
        self.parts
            .values()
            .find(|b| b.id == self.root)
            .expect("root is built")
    }
}

pub fn user_id(catalog: &Catalog, username: &str) -> UserId {
    catalog.user_by_name(username).unwrap().id
}

struct Builder {
    catalog: Catalog,
    user: UserId,
    document: ObjectId,
    parts: BTreeMap<(String, String), Built>,
}

impl Builder {
    fn build(&mut self, node: &Node) -> ObjectId {
        let id = self.create(node);
        for (order, child) in node.children.iter().enumerate() {
            let child_id = self.build(child);
            self.catalog
                .add_child(id, child_id, (order + 1) as f64, order as u32, "-", epoch())
                .unwrap();
        }
        id
    }

    fn create(&mut self, node: &Node) -> ObjectId {
        let key = (node.reference.to_string(), node.revision.to_string());
        if let Some(built) = self.parts.get(&key) {
            return built.id;
        }
        let at = epoch();
        let catalog = &mut self.catalog;
        let id = catalog
            .create_object(
                NewObject::part("Part", node.reference, node.revision)
                    .with_lifecycle(node.lifecycle),
                self.user,
                at,
            )
            .unwrap();

        if node.doc.unwrap_or(node.children.is_empty()) {
            catalog.attach_document(self.document, id, at).unwrap();
        }
        if catalog.lifecycle(node.lifecycle).unwrap().first_state() != node.state {
            catalog.set_state(id, node.state, at).unwrap();
        }

        if !node.signers.is_empty() {
            let roles: Vec<_> = catalog.lifecycle(node.lifecycle).unwrap().signer_roles().collect();
            for role in roles {
                for holder in catalog.role_holders(id, role, None) {
                    catalog.end_role(id, holder, role, at).unwrap();
                }
                for username in &node.signers {
                    let signer = user_id(catalog, username);
                    catalog.add_role(id, signer, role, at).unwrap();
                }
            }
        }

        if let Some(previous) = node.previous {
            let old = self.parts[&(node.reference.to_string(), previous.to_string())].id;
            self.catalog.add_revision_link(old, id, at).unwrap();
        }
        if let Some(next) = node.next {
            let new = self.parts[&(node.reference.to_string(), next.to_string())].id;
            self.catalog.add_revision_link(id, new, at).unwrap();
        }

        if !node.approvers.is_empty() {
            let next_state = self
                .catalog
                .lifecycle(node.lifecycle)
                .unwrap()
                .next(node.state)
                .unwrap()
                .to_string();
            for username in &node.approvers {
                let approver = user_id(&self.catalog, username);
                self.catalog
                    .add_approval(id, approver, node.state, &next_state, at)
                    .unwrap();
            }
        }

        self.parts.insert(
            key,
            Built {
                id,
                lifecycle: node.lifecycle.to_string(),
                state: node.state.to_string(),
            },
        );
        id
    }
}
