//! Query router - the per-turn state machine
//!
//! START → CLASSIFIED → RESOLVING (structured | general) → FORMATTED → DONE
//!
//! Exactly one resolver runs per turn. The structured branch always ends in the
//! formatter; the general branch completes the turn itself.

use crate::classifier::QueryClassifier;
use crate::database::StructuredDataSource;
use crate::formatter::format_response;
use crate::gemini::TextGenerator;
use crate::models::{ChatMessage, RoutingDecision, TurnResponse};
use crate::resolvers::{GeneralKnowledgeResolver, StructuredDataResolver};
use crate::state::SessionState;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnStage {
    Start,
    Classified(RoutingDecision),
    ResolvingStructured,
    ResolvingGeneral,
    Formatted,
    Done,
}

pub struct QueryRouter {
    classifier: QueryClassifier,
    structured: StructuredDataResolver,
    general: GeneralKnowledgeResolver,
}

impl QueryRouter {
    pub fn new(
        classifier: QueryClassifier,
        structured: StructuredDataResolver,
        general: GeneralKnowledgeResolver,
    ) -> Self {
        Self {
            classifier,
            structured,
            general,
        }
    }

    /// Wire a router where one text generator serves both classification and answers
    pub fn from_capabilities(
        llm: Arc<dyn TextGenerator>,
        store: Arc<dyn StructuredDataSource>,
    ) -> Self {
        Self::new(
            QueryClassifier::new(llm.clone()),
            StructuredDataResolver::new(store),
            GeneralKnowledgeResolver::new(llm),
        )
    }

    /// Caller-facing entry point: one query in, one response out
    pub async fn process(&self, query: &str, prior_history: Vec<ChatMessage>) -> TurnResponse {
        self.run_turn(SessionState::new(query, prior_history))
            .await
            .into_response()
    }

    /// Drive a fresh state through the stages until DONE
    pub async fn run_turn(&self, state: SessionState) -> SessionState {
        let start_time = Instant::now();
        let turn_id = state.turn_id();

        info!(%turn_id, query = %state.query(), "Router: turn started");

        let mut state = state.begin_turn();
        let mut stage = TurnStage::Start;

        loop {
            debug!(%turn_id, ?stage, "Router stage");

            stage = match stage {
                TurnStage::Start => {
                    let decision = self.classifier.classify(state.query()).await;
                    state = state.with_routing_decision(decision);
                    TurnStage::Classified(decision)
                }
                TurnStage::Classified(RoutingDecision::NeedsStructuredData) => {
                    TurnStage::ResolvingStructured
                }
                TurnStage::Classified(RoutingDecision::GeneralKnowledge) => {
                    TurnStage::ResolvingGeneral
                }
                TurnStage::ResolvingStructured => {
                    state = self.structured.resolve(state).await;
                    state = format_response(state);
                    TurnStage::Formatted
                }
                TurnStage::ResolvingGeneral => {
                    state = self.general.resolve(state).await;
                    TurnStage::Done
                }
                TurnStage::Formatted => TurnStage::Done,
                TurnStage::Done => break,
            };
        }

        info!(
            %turn_id,
            decision = ?state.routing_decision(),
            failed = state.error().is_some(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Router: turn complete"
        );

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::{ERROR_PREFIX, NO_DATABASE_RESPONSE};
    use crate::models::{Role, StructuredPayload};
    use crate::testing::{FailingGenerator, ScriptedGenerator, StaticSource};

    fn router_with(
        llm: Arc<ScriptedGenerator>,
        store: Arc<StaticSource>,
    ) -> QueryRouter {
        QueryRouter::from_capabilities(llm, store)
    }

    #[tokio::test]
    async fn test_expenses_scenario_uses_structured_branch() {
        let llm = Arc::new(ScriptedGenerator::new(["YES"]));
        let store = Arc::new(StaticSource::answering("$432.10 across 14 transactions"));
        let router = router_with(llm.clone(), store.clone());

        let state = router
            .run_turn(SessionState::new("What were my expenses last month?", vec![]))
            .await;

        assert_eq!(
            state.routing_decision(),
            Some(RoutingDecision::NeedsStructuredData)
        );
        assert_eq!(state.final_response(), Some("$432.10 across 14 transactions"));
        assert_eq!(store.calls(), 1);
        // classifier only; no general-knowledge call
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_capital_scenario_uses_general_branch() {
        let llm = Arc::new(ScriptedGenerator::new(["NO", "Paris."]));
        let store = Arc::new(StaticSource::answering("unused"));
        let router = router_with(llm.clone(), store.clone());

        let response = router.process("What is the capital of France?", vec![]).await;

        assert_eq!(response.final_response, "Paris.");
        assert_eq!(store.calls(), 0);
        assert_eq!(llm.calls(), 2);
        let assistant_entries = response
            .conversation_history
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .count();
        assert_eq!(assistant_entries, 1);
    }

    #[tokio::test]
    async fn test_unreachable_store_scenario() {
        let llm = Arc::new(ScriptedGenerator::new(["YES"]));
        let store = Arc::new(StaticSource::unreachable("db unreachable"));
        let router = router_with(llm, store);

        let response = router.process("How much did I invest in 2024?", vec![]).await;

        assert_eq!(
            response.final_response,
            "I encountered an error while processing your query: db unreachable"
        );
        assert_eq!(response.error.as_deref(), Some("db unreachable"));
    }

    #[tokio::test]
    async fn test_payload_without_output() {
        let llm = Arc::new(ScriptedGenerator::new(["yes"]));
        let store = Arc::new(StaticSource::with_payload(StructuredPayload::default()));
        let router = router_with(llm, store);

        let response = router.process("Show me my income sources", vec![]).await;

        assert_eq!(response.final_response, NO_DATABASE_RESPONSE);
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_history_grows_by_two_each_turn() {
        let llm = Arc::new(ScriptedGenerator::new([
            "YES",
            " no ",
            "An index fund tracks a market index.",
        ]));
        let store = Arc::new(StaticSource::answering("You earned $5,000.00 in May"));
        let router = router_with(llm, store);

        let prior = vec![ChatMessage::user("hi"), ChatMessage::assistant("Hello!")];
        let first = router.process("What was my income in May?", prior.clone()).await;
        assert_eq!(first.conversation_history.len(), prior.len() + 2);
        assert_eq!(&first.conversation_history[..2], &prior[..]);

        let second = router
            .process("What is an index fund?", first.conversation_history.clone())
            .await;
        assert_eq!(second.conversation_history.len(), first.conversation_history.len() + 2);
        assert_eq!(
            second.conversation_history[4],
            ChatMessage::user("What is an index fund?")
        );
        assert_eq!(
            second.final_response,
            "An index fund tracks a market index."
        );
    }

    #[tokio::test]
    async fn test_noisy_classifier_output_routes_general() {
        for noisy in ["YES, definitely", "Y", "", "NO"] {
            let llm = Arc::new(ScriptedGenerator::new([noisy, "general answer"]));
            let store = Arc::new(StaticSource::answering("should not run"));
            let router = router_with(llm, store.clone());

            let state = router.run_turn(SessionState::new("q", vec![])).await;

            assert_eq!(state.routing_decision(), Some(RoutingDecision::GeneralKnowledge));
            assert_eq!(state.final_response(), Some("general answer"));
            assert_eq!(store.calls(), 0);
        }
    }

    #[tokio::test]
    async fn test_generator_down_still_completes_turn() {
        let store = Arc::new(StaticSource::answering("unused"));
        let router =
            QueryRouter::from_capabilities(Arc::new(FailingGenerator::new("service unavailable")), store);

        let response = router.process("What is my net worth?", vec![]).await;

        assert!(response.final_response.starts_with(ERROR_PREFIX));
        assert_eq!(response.conversation_history.len(), 2);
    }
}
