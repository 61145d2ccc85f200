//! Catalog Persistence Tests
//!
//! A saved catalog reloads with its links, validity intervals, approvals
//! and history intact, so past structures and pending signatures survive a
//! restart.

mod common;

use std::fs;
use std::sync::Arc;

use chrono::Duration;
use tempfile::TempDir;

use common::*;
use plmcore::catalog::{CatalogError, CatalogFile, HistoryAction, ManualClock};
use plmcore::lifecycle::Role;
use plmcore::promotion::{ApprovalOutcome, GovernanceError};
use plmcore::service::PlmService;

/// Past structure is still readable after a reload.
#[test]
fn test_reload_keeps_validity() {
    let dir = TempDir::new().unwrap();
    let file = CatalogFile::new(dir.path().join("catalog.json"));
    let clock = Arc::new(ManualClock::new(epoch()));
    let service = PlmService::new(seeded_catalog()).with_clock(clock.clone());
    let user = service.user_id("user").unwrap();
    let root = service.create_part("Part", "R", "a", user).unwrap();
    let child = service.create_part("Part", "C", "a", user).unwrap();
    service.add_child(root, child, 3.0, 0, "kg", user).unwrap();
    let linked = clock.advance(Duration::hours(1));
    clock.advance(Duration::hours(1));
    service.remove_child(root, child, user).unwrap();
    file.save(&service.snapshot()).unwrap();

    let reloaded = PlmService::new(file.load().unwrap());
    assert_eq!(reloaded.version(), service.version());
    assert!(reloaded.get_children(root, -1, None, false).unwrap().is_empty());
    let past = reloaded.get_children(root, -1, Some(linked), false).unwrap();
    assert_eq!(past.len(), 1);
    assert_eq!(past[0].link.unit, "kg");
}

/// A pending approval is completed after a restart.
#[test]
fn test_reload_keeps_pending_approvals() {
    let dir = TempDir::new().unwrap();
    let file = CatalogFile::new(dir.path().join("catalog.json"));
    let service = PlmService::new(seeded_catalog());
    let user = service.user_id("user").unwrap();
    let brian = service.user_id("brian").unwrap();
    let document = service.create_document("Document", "D1", "a", user).unwrap();
    service.add_file(document, "a.txt", user).unwrap();
    service
        .add_signer(document, brian, Role::signer(0), user)
        .unwrap();
    service.record_approval(document, brian).unwrap();
    file.save(&service.snapshot()).unwrap();

    let reloaded = PlmService::new(file.load().unwrap());
    let outcome = reloaded.record_approval(document, user).unwrap();
    assert!(matches!(outcome, ApprovalOutcome::Promoted { .. }));

    let snapshot = reloaded.snapshot();
    let actions: Vec<_> = snapshot.history_of(document).map(|h| h.action).collect();
    assert!(actions.contains(&HistoryAction::Create));
    assert!(actions.contains(&HistoryAction::Approve));
    assert!(actions.contains(&HistoryAction::Promote));
}

#[test]
fn test_load_missing_file() {
    let dir = TempDir::new().unwrap();
    let file = CatalogFile::new(dir.path().join("absent.json"));
    assert!(matches!(file.load(), Err(CatalogError::Persistence(_))));
}

/// A truncated file is reported, not half-loaded.
#[test]
fn test_load_corrupt_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("catalog.json");
    let file = CatalogFile::new(&path);
    file.save(&seeded_catalog()).unwrap();
    let content = fs::read_to_string(&path).unwrap();
    fs::write(&path, &content[..content.len() / 2]).unwrap();

    let err = file.load().unwrap_err();
    assert!(err.to_string().contains("corrupt catalog file"));
    let governance: GovernanceError = err.into();
    assert!(!governance.is_recoverable());
}

/// Saving twice replaces the snapshot and leaves no temporary file.
#[test]
fn test_save_replaces() {
    let dir = TempDir::new().unwrap();
    let file = CatalogFile::new(dir.path().join("catalog.json"));
    let service = PlmService::new(seeded_catalog());
    file.save(&service.snapshot()).unwrap();
    let user = service.user_id("user").unwrap();
    service.create_part("Part", "P1", "a", user).unwrap();
    file.save(&service.snapshot()).unwrap();

    let loaded = file.load().unwrap();
    assert!(loaded.find_object("Part", "P1", "a").is_some());
    let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}
