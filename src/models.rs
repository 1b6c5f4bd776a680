//! Core data models for the budget assistant

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Conversation =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the conversation transcript
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

//
// ================= Routing =================
//

/// Which resolution strategy answers a turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoutingDecision {
    NeedsStructuredData,
    GeneralKnowledge,
}

/// Outcome of whichever resolution strategy ran
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ResolutionResult {
    Success { output: String },
    Failure { message: String },
}

/// Payload returned by the structured-data capability.
/// `output` may be missing when the store produced nothing usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StructuredPayload {
    #[serde(default)]
    pub output: Option<String>,
}

impl StructuredPayload {
    pub fn with_output(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
        }
    }
}

//
// ================= Turn Result =================
//

/// What a caller gets back from one turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResponse {
    pub final_response: String,
    pub conversation_history: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

//
// ================= Tool I/O =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    pub tool_name: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub data: serde_json::Value,
    pub error: Option<String>,
}

//
// ================= Market Data =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketSnapshot {
    pub name: String,
    pub symbol: String,
    pub price: f64,
    pub currency: String,
    pub day_change_percent: Option<f64>,
    pub week_change_percent: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoutingDecision::NeedsStructuredData => "needs-structured-data",
            RoutingDecision::GeneralKnowledge => "general-knowledge",
        };
        write!(f, "{}", s)
    }
}
