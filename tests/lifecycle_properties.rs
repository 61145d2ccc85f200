//! Lifecycle Tests
//!
//! - definitions are validated on construction
//! - next and previous are inverse steps
//! - only states before the official one are editable
//! - demotion is refused at the first and at the official state

mod common;

use proptest::prelude::*;

use common::*;
use plmcore::catalog::NewObject;
use plmcore::lifecycle::{LifecycleDefinition, LifecycleError, Role};
use plmcore::promotion::GovernanceErrorKind;
use plmcore::service::PlmService;

fn state_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("s{}", i)).collect()
}

// =============================================================================
// Definition checks
// =============================================================================

#[test]
fn test_rejects_single_state() {
    let err = LifecycleDefinition::new("one", ["official"], "official").unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidDefinition { .. }));
}

#[test]
fn test_rejects_duplicate_state() {
    let err =
        LifecycleDefinition::new("dup", ["draft", "draft", "official"], "official").unwrap_err();
    assert!(err.to_string().contains("duplicate state"));
}

#[test]
fn test_rejects_unlisted_official() {
    let err = LifecycleDefinition::new("lost", ["draft", "released"], "official").unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidDefinition { .. }));
}

/// The five-state lifecycle has four signer levels.
#[test]
fn test_issue_lifecycle_shape() {
    let catalog = seeded_catalog();
    let lifecycle = catalog.lifecycle(ISSUE_LIFECYCLE).unwrap();
    assert_eq!(lifecycle.official_position(), 3);
    assert_eq!(lifecycle.next(ISSUE).unwrap(), OFFICIAL);
    assert_eq!(lifecycle.previous(ISSUE).unwrap(), PROPOSED);
    assert!(lifecycle.is_editable(ISSUE));
    assert!(!lifecycle.is_editable(DEPRECATED));
    assert_eq!(
        lifecycle.signer_roles().collect::<Vec<_>>(),
        (0..4).map(Role::signer).collect::<Vec<_>>()
    );
    assert_eq!(lifecycle.signer_role_for(ISSUE).unwrap(), Role::signer(2));
}

#[test]
fn test_last_state_has_no_next() {
    let catalog = seeded_catalog();
    let lifecycle = catalog.lifecycle(DOD).unwrap();
    assert!(matches!(
        lifecycle.next(DEPRECATED),
        Err(LifecycleError::NoSuchTransition { .. })
    ));
    assert!(matches!(
        lifecycle.next("archived"),
        Err(LifecycleError::UnknownState { .. })
    ));
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    /// `previous(next(s)) == s` and editability stops at the official state.
    #[test]
    fn prop_steps_are_inverse(count in 2..9usize, official in 0..9usize) {
        let official = official % count;
        let states = state_names(count);
        let lifecycle =
            LifecycleDefinition::new("generated", states.clone(), &states[official]).unwrap();

        prop_assert_eq!(lifecycle.first_state(), states[0].as_str());
        prop_assert_eq!(lifecycle.last_state(), states[count - 1].as_str());
        prop_assert_eq!(lifecycle.signer_roles().count(), count - 1);
        for (i, state) in states.iter().enumerate() {
            prop_assert_eq!(lifecycle.position(state).unwrap(), i);
            prop_assert_eq!(lifecycle.is_editable(state), i < official);
            prop_assert_eq!(lifecycle.is_official(state), i == official);
            if i + 1 < count {
                let next = lifecycle.next(state).unwrap();
                prop_assert_eq!(next, states[i + 1].as_str());
                prop_assert_eq!(lifecycle.previous(next).unwrap(), state.as_str());
            } else {
                prop_assert!(lifecycle.next(state).is_err());
            }
        }
        prop_assert!(lifecycle.previous(&states[0]).is_err());
    }

    /// Demotion succeeds everywhere except the first and the official state.
    #[test]
    fn prop_demote_outcome(count in 2..7usize, official in 0..7usize, at in 0..7usize) {
        let official = official % count;
        let at = at % count;
        let states = state_names(count);

        let mut catalog = seeded_catalog();
        catalog
            .register_lifecycle(
                LifecycleDefinition::new("generated", states.clone(), &states[official]).unwrap(),
            )
            .unwrap();
        let user = user_id(&catalog, "user");
        let part = catalog
            .create_object(
                NewObject::part("Part", "P", "a").with_lifecycle("generated"),
                user,
                epoch(),
            )
            .unwrap();
        catalog.set_state(part, &states[at], epoch()).unwrap();
        let service = PlmService::new(catalog);

        let result = service.demote(part, user);
        if at == official {
            prop_assert_eq!(result.unwrap_err().kind(), GovernanceErrorKind::Promotion);
        } else if at == 0 {
            prop_assert_eq!(result.unwrap_err().kind(), GovernanceErrorKind::NoSuchTransition);
        } else {
            prop_assert_eq!(result.unwrap(), states[at - 1].clone());
        }
    }
}
