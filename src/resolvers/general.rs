//! General-knowledge resolver
//!
//! Terminal for its branch: sets the final response and closes the turn itself.
//! A failed generation is answered with the same error template the formatter uses.

use crate::formatter::error_response;
use crate::gemini::TextGenerator;
use crate::models::ResolutionResult;
use crate::state::SessionState;
use std::sync::Arc;
use tracing::{info, warn};

pub struct GeneralKnowledgeResolver {
    llm: Arc<dyn TextGenerator>,
}

impl GeneralKnowledgeResolver {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    pub async fn resolve(&self, state: SessionState) -> SessionState {
        let prompt = build_prompt(state.query());

        match self.llm.generate(&prompt).await {
            Ok(answer) => {
                info!(turn_id = %state.turn_id(), "General-knowledge answer ready");
                state
                    .with_resolution(ResolutionResult::Success {
                        output: answer.clone(),
                    })
                    .complete(answer)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(turn_id = %state.turn_id(), "General-knowledge generation failed: {}", message);
                let response = error_response(&message);
                state
                    .with_resolution(ResolutionResult::Failure {
                        message: message.clone(),
                    })
                    .with_error(message)
                    .complete(response)
            }
        }
    }
}

fn build_prompt(query: &str) -> String {
    format!(
        r#"Answer the following question using your general knowledge.
This question does not require access to the user's financial database.

Question: {query}"#
    )
}
