//! plmcore - lifecycle governance for versioned parts and documents
//!
//! Objects move along ordered lifecycles ("draft" → "official" →
//! "deprecated"), gated by signer roles, approvals and delegation. Parts
//! form bills of materials whose links carry validity intervals, so the
//! structure can be queried at any past instant. Assemblies are promoted
//! all-or-nothing.
//!
//! Entry point: `service::PlmService`.

pub mod bom;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod delegation;
pub mod lifecycle;
pub mod observability;
pub mod promotion;
pub mod service;
