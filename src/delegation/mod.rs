//! Delegation
//!
//! Resolution of role holders through delegation chains.

mod resolver;

pub use resolver::DelegationResolver;
