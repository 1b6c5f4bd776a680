//! Error types for the budget assistant

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Error, Debug)]
pub enum AssistantError {

    // =============================
    // Capability Errors
    // =============================

    #[error("LLM error: {0}")]
    Llm(String),

    /// Store unreachable. Displays the bare cause so it can be shown to the user verbatim.
    #[error("{0}")]
    Connection(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Market data error: {0}")]
    MarketData(String),

    // =============================
    // Tool Errors
    // =============================

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
