//! Resolution strategies
//!
//! Exactly one of these answers a routed turn. Neither lets a capability
//! failure escape; failures are recorded on the session state.

pub mod general;
pub mod structured;

pub use general::GeneralKnowledgeResolver;
pub use structured::StructuredDataResolver;
