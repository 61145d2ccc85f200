//! Promotion Atomicity Tests
//!
//! - a rejected operation leaves the catalog version and the outbox untouched
//! - readers keep the snapshot they took while writers commit
//! - concurrent writers are serialized
//! - officialization settles earlier revisions in the same commit

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::*;
use plmcore::catalog::{NewObject, ObjectId, UserId};
use plmcore::promotion::{GovernanceErrorKind, IneligibilityReason, MemoryOutbox, PromotionEvent};
use plmcore::service::PlmService;

fn service() -> (Arc<PlmService>, Arc<MemoryOutbox>, UserId) {
    let outbox = Arc::new(MemoryOutbox::new());
    let service = PlmService::new(seeded_catalog()).with_sink(outbox.clone());
    let user = service.user_id("user").unwrap();
    (Arc::new(service), outbox, user)
}

fn document_with_file(service: &PlmService, reference: &str, user: UserId) -> ObjectId {
    let document = service.create_document("Document", reference, "a", user).unwrap();
    service.add_file(document, "file.txt", user).unwrap();
    document
}

// =============================================================================
// Rejection leaves no trace
// =============================================================================

/// A document without file cannot be promoted and nothing is committed.
#[test]
fn test_rejected_promotion_commits_nothing() {
    let (service, outbox, user) = service();
    let document = service.create_document("Document", "D1", "a", user).unwrap();
    let version = service.version();

    let err = service.promote(document, user).unwrap_err();
    assert_eq!(err.kind(), GovernanceErrorKind::Promotion);
    assert!(err.to_string().contains("no file"));
    assert_eq!(service.version(), version);
    assert!(outbox.is_empty());
    assert_eq!(service.snapshot().history_of(document).count(), 1);
}

/// A file locked by someone else blocks the promotion.
#[test]
fn test_locked_file_blocks() {
    let (service, outbox, user) = service();
    let brian = service.user_id("brian").unwrap();
    let document = service.create_document("Document", "D1", "a", user).unwrap();
    let file = service.add_file(document, "file.txt", user).unwrap();
    service.lock_file(file, brian).unwrap();

    assert!(!service.is_promotable(document).unwrap());
    assert!(service.promote(document, user).is_err());
    assert!(outbox.is_empty());

    service.unlock_file(file, brian).unwrap();
    assert_eq!(service.promote(document, user).unwrap(), OFFICIAL);
    assert_eq!(outbox.event_names(), vec!["plm.object.promoted"]);
}

/// Eligible objects still need the recorded approvals of their signers.
#[test]
fn test_is_promotable_needs_approvals() {
    let mut catalog = seeded_catalog();
    let user = user_id(&catalog, "user");
    let document = catalog
        .create_object(NewObject::document("Document", "D1", "a"), user, epoch())
        .unwrap();
    catalog.add_file(document, "file.txt").unwrap();

    let service = PlmService::new(catalog.clone());
    assert!(service.promotion_blockers(document).unwrap().is_empty());
    assert!(!service.is_promotable(document).unwrap());

    catalog
        .add_approval(document, user, DRAFT, OFFICIAL, epoch())
        .unwrap();
    assert!(PlmService::new(catalog).is_promotable(document).unwrap());
}

/// A snapshot taken before a promotion does not see it.
#[test]
fn test_snapshot_isolation() {
    let (service, _, user) = service();
    let document = document_with_file(&service, "D1", user);
    let before = service.snapshot();

    service.promote(document, user).unwrap();

    assert_eq!(before.object(document).unwrap().state, DRAFT);
    assert_eq!(service.snapshot().object(document).unwrap().state, OFFICIAL);
    assert!(service.snapshot().version() > before.version());
}

// =============================================================================
// Concurrent writers
// =============================================================================

/// The same link added from eight threads exists once.
#[test]
fn test_concurrent_duplicate_links() {
    let (service, _, user) = service();
    let parent = service.create_part("Part", "A", "a", user).unwrap();
    let child = service.create_part("Part", "B", "a", user).unwrap();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                service.add_child(parent, child, 1.0, i, "-", user).is_ok()
            })
        })
        .collect();
    let succeeded = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(succeeded, 1);
    assert_eq!(service.get_children(parent, 1, None, false).unwrap().len(), 1);
}

/// Eight concurrent creations produce eight objects and eight commits.
#[test]
fn test_concurrent_creations_all_commit() {
    let (service, _, user) = service();
    let version = service.version();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                service
                    .create_part("Part", &format!("C{}", i), "a", user)
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(service.version(), version + 8);
    assert_eq!(service.snapshot().objects().count(), 8);
}

/// Only one of two racing promotions of a draft to official wins the draft.
#[test]
fn test_concurrent_promotions_serialize() {
    let (service, outbox, user) = service();
    let document = document_with_file(&service, "D1", user);
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                service.promote(document, user)
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let to_official = results
        .iter()
        .filter(|r| matches!(r, Ok(state) if state == OFFICIAL))
        .count();
    assert_eq!(to_official, 1);
    let promoted_from_draft = outbox
        .messages()
        .iter()
        .filter(|n| matches!(&n.event, PromotionEvent::Promoted { from, .. } if from == DRAFT))
        .count();
    assert_eq!(promoted_from_draft, 1);
}

// =============================================================================
// Revisions
// =============================================================================

/// Promoting revision b deprecates the official revision a.
#[test]
fn test_new_official_revision_deprecates_previous() {
    let (service, outbox, user) = service();
    let a = document_with_file(&service, "D1", user);
    service.promote(a, user).unwrap();
    let b = service.revise(a, "b", user).unwrap();
    service.add_file(b, "file.txt", user).unwrap();
    outbox.clear();

    service.promote(b, user).unwrap();

    let snapshot = service.snapshot();
    assert_eq!(snapshot.object(a).unwrap().state, DEPRECATED);
    assert_eq!(snapshot.object(b).unwrap().state, OFFICIAL);
    assert!(outbox
        .messages()
        .iter()
        .any(|n| n.event == PromotionEvent::Deprecated { object: a, superseded_by: b }));
}

/// Promoting revision b cancels the draft revision a.
#[test]
fn test_new_official_revision_cancels_draft_previous() {
    let (service, _, user) = service();
    let a = document_with_file(&service, "D1", user);
    let b = service.revise(a, "b", user).unwrap();
    service.add_file(b, "file.txt", user).unwrap();

    service.promote(b, user).unwrap();

    let snapshot = service.snapshot();
    let old = snapshot.object(a).unwrap();
    assert!(old.cancelled);
    assert_eq!(old.owner, snapshot.company().unwrap());
    assert!(service.promote(a, user).is_err());
}

/// The cancelled revision leaves the structure it was linked into, so its
/// parent is not blocked by it.
#[test]
fn test_cancelled_revision_leaves_bom() {
    let (service, _, user) = service();
    let parent = service.create_part("Part", "P1", "a", user).unwrap();
    let old = service.create_part("Part", "P2", "a", user).unwrap();
    service.add_child(parent, old, 1.0, 0, "-", user).unwrap();
    let new = service.revise(old, "b", user).unwrap();
    let document = document_with_file(&service, "D1", user);
    service.attach_document(document, new, user).unwrap();

    service.promote(new, user).unwrap();

    assert!(service.snapshot().object(old).unwrap().cancelled);
    assert!(service.get_children(parent, -1, None, false).unwrap().is_empty());
    assert!(service.get_parents(old, -1, None, false).unwrap().is_empty());
    let blockers = service.promotion_blockers(parent).unwrap();
    assert!(!blockers
        .iter()
        .any(|r| matches!(r, IneligibilityReason::CancelledChild { .. })));
}

/// A revision can only be created once per object.
#[test]
fn test_revise_twice_rejected() {
    let (service, _, user) = service();
    let a = document_with_file(&service, "D1", user);
    service.revise(a, "b", user).unwrap();
    let err = service.revise(a, "c", user).unwrap_err();
    assert_eq!(err.kind(), GovernanceErrorKind::Controller);
}
