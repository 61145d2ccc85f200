//! Lifecycles
//!
//! Ordered maturity states ("draft" → "official" → "deprecated", or custom
//! variants) and the roles that gate movement between them.

mod definition;
mod errors;
mod role;

pub use definition::{LifecycleDefinition, LifecycleSpec};
pub use errors::{Direction, LifecycleError, LifecycleResult};
pub use role::Role;

/// Name of the built-in lifecycle used when none is given.
pub const DEFAULT_LIFECYCLE: &str = "draft_official_deprecated";

/// The built-in lifecycles: `draft → official → deprecated` and
/// `draft → proposed → official → deprecated`.
pub fn builtin_lifecycles() -> Vec<LifecycleSpec> {
    vec![
        LifecycleSpec {
            name: DEFAULT_LIFECYCLE.to_string(),
            states: vec!["draft".into(), "official".into(), "deprecated".into()],
            official: "official".into(),
        },
        LifecycleSpec {
            name: "draft_proposed_official_deprecated".to_string(),
            states: vec![
                "draft".into(),
                "proposed".into(),
                "official".into(),
                "deprecated".into(),
            ],
            official: "official".into(),
        },
    ]
}
