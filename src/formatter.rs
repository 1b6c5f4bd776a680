//! Response formatting for the structured-data branch

use crate::models::ResolutionResult;
use crate::state::SessionState;
use tracing::debug;

pub const ERROR_PREFIX: &str = "I encountered an error while processing your query: ";
pub const NO_DATABASE_RESPONSE: &str = "No response from database";

/// User-facing text for a captured failure
pub fn error_response(message: &str) -> String {
    format!("{}{}", ERROR_PREFIX, message)
}

/// Turn the resolution outcome into the final response. An error always wins.
pub fn format_response(state: SessionState) -> SessionState {
    let response = match (state.error(), state.resolution_result()) {
        (Some(error), _) => error_response(error),
        (None, Some(ResolutionResult::Success { output })) if !output.trim().is_empty() => {
            output.clone()
        }
        (None, Some(ResolutionResult::Failure { message })) => error_response(message),
        (None, _) => NO_DATABASE_RESPONSE.to_string(),
    };

    debug!(turn_id = %state.turn_id(), response_len = response.len(), "Formatted response");
    state.complete(response)
}
