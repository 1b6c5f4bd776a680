//! Structured-data capability
//!
//! The router only sees [`StructuredDataSource`]; [`SqlAgent`] is the Postgres-backed
//! implementation that translates questions into read-only SQL.

use crate::models::StructuredPayload;
use crate::Result;
use async_trait::async_trait;

pub mod guard;
pub mod sql_agent;

pub use sql_agent::SqlAgent;

/// Answers a natural-language question from the user's expense / income / investment data
#[async_trait]
pub trait StructuredDataSource: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<StructuredPayload>;
}
