//! Budget Assistant
//!
//! A personal-finance assistant that answers one user query per turn:
//! - Classifies whether the query needs the user's own financial records
//! - Resolves it against the expense/income/investment store or general knowledge
//! - Formats a single user-facing response and extends the conversation history
//! - Optionally lets an agent loop pick tools (database, market snapshot) instead
//!
//! ROUTED TURN:
//! QUERY → CLASSIFY → RESOLVE (structured | general) → FORMAT → DONE

pub mod api;
pub mod assistant;
pub mod classifier;
pub mod config;
pub mod database;
pub mod dispatcher;
pub mod error;
pub mod formatter;
pub mod gemini;
pub mod market;
pub mod models;
pub mod resolvers;
pub mod router;
pub mod state;
pub mod tools;

#[cfg(test)]
mod testing;

pub use error::{AssistantError, Result};

// Re-export common types
pub use assistant::{AssistantMode, BudgetAssistant};
pub use config::AppConfig;
pub use dispatcher::ToolDispatcher;
pub use models::*;
pub use router::QueryRouter;
pub use state::SessionState;
