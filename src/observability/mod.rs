//! Observability
//!
//! Structured logging through `tracing`. Library code only emits events;
//! binaries decide where they go by calling `init_logging` once at start.
//!
//! Governance notifications are a separate concern, see
//! `promotion::NotificationSink`. `TracingSink` bridges the two.

mod logger;

pub use logger::{build_filter, init_logging, FALLBACK_FILTER};
