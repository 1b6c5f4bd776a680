//! Per-turn session state
//!
//! Every stage takes the state by value and hands back the updated value.
//! History is append-only; set-once fields keep their first value.

use crate::models::{ChatMessage, ResolutionResult, RoutingDecision, TurnResponse};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    turn_id: Uuid,
    query: String,
    conversation_history: Vec<ChatMessage>,
    routing_decision: Option<RoutingDecision>,
    resolution_result: Option<ResolutionResult>,
    error: Option<String>,
    final_response: Option<String>,
}

impl SessionState {
    /// Create the state for a new turn, carrying forward earlier history
    pub fn new(query: impl Into<String>, prior_history: Vec<ChatMessage>) -> Self {
        Self {
            turn_id: Uuid::new_v4(),
            query: query.into(),
            conversation_history: prior_history,
            routing_decision: None,
            resolution_result: None,
            error: None,
            final_response: None,
        }
    }

    /// Record the user entry that opens the turn
    pub fn begin_turn(mut self) -> Self {
        self.conversation_history
            .push(ChatMessage::user(self.query.clone()));
        self
    }

    pub fn with_routing_decision(mut self, decision: RoutingDecision) -> Self {
        match self.routing_decision {
            Some(existing) => warn!(
                turn_id = %self.turn_id,
                %existing,
                ignored = %decision,
                "Routing decision already set"
            ),
            None => self.routing_decision = Some(decision),
        }
        self
    }

    pub fn with_resolution(mut self, result: ResolutionResult) -> Self {
        self.resolution_result = Some(result);
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// Set the final response and close the turn with the assistant entry
    pub fn complete(mut self, response: impl Into<String>) -> Self {
        if self.final_response.is_some() {
            warn!(turn_id = %self.turn_id, "Final response already set");
            return self;
        }

        let response = response.into();
        self.conversation_history
            .push(ChatMessage::assistant(response.clone()));
        self.final_response = Some(response);
        self
    }

    pub fn turn_id(&self) -> Uuid {
        self.turn_id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn conversation_history(&self) -> &[ChatMessage] {
        &self.conversation_history
    }

    pub fn routing_decision(&self) -> Option<RoutingDecision> {
        self.routing_decision
    }

    pub fn resolution_result(&self) -> Option<&ResolutionResult> {
        self.resolution_result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn final_response(&self) -> Option<&str> {
        self.final_response.as_deref()
    }

    pub fn into_response(self) -> TurnResponse {
        TurnResponse {
            final_response: self.final_response.unwrap_or_default(),
            conversation_history: self.conversation_history,
            error: self.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_begin_and_complete_append_in_order() {
        let prior = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")];
        let state = SessionState::new("What is my income?", prior)
            .begin_turn()
            .complete("$5,000.00");

        let history = state.conversation_history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[2], ChatMessage::user("What is my income?"));
        assert_eq!(history[3].role, Role::Assistant);
        assert_eq!(state.final_response(), Some("$5,000.00"));
    }

    #[test]
    fn test_final_response_is_set_once() {
        let state = SessionState::new("q", vec![])
            .begin_turn()
            .complete("first")
            .complete("second");

        assert_eq!(state.final_response(), Some("first"));
        assert_eq!(state.conversation_history().len(), 2);
    }

    #[test]
    fn test_routing_decision_is_set_once() {
        let state = SessionState::new("q", vec![])
            .with_routing_decision(RoutingDecision::GeneralKnowledge)
            .with_routing_decision(RoutingDecision::NeedsStructuredData);

        assert_eq!(
            state.routing_decision(),
            Some(RoutingDecision::GeneralKnowledge)
        );
    }

    #[test]
    fn test_into_response_carries_error() {
        let response = SessionState::new("q", vec![])
            .begin_turn()
            .with_error("boom")
            .complete("failed")
            .into_response();

        assert_eq!(response.error.as_deref(), Some("boom"));
        assert_eq!(response.final_response, "failed");
        assert_eq!(response.conversation_history.len(), 2);
    }
}
