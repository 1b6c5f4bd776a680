//! Structured-data resolver

use crate::database::StructuredDataSource;
use crate::models::ResolutionResult;
use crate::state::SessionState;
use std::sync::Arc;
use tracing::{info, warn};

pub struct StructuredDataResolver {
    source: Arc<dyn StructuredDataSource>,
}

impl StructuredDataResolver {
    pub fn new(source: Arc<dyn StructuredDataSource>) -> Self {
        Self { source }
    }

    /// Query the store. Leaves `final_response` for the formatter.
    pub async fn resolve(&self, state: SessionState) -> SessionState {
        match self.source.resolve(state.query()).await {
            Ok(payload) => {
                info!(turn_id = %state.turn_id(), has_output = payload.output.is_some(), "Store answered");
                state.with_resolution(ResolutionResult::Success {
                    output: payload.output.unwrap_or_default(),
                })
            }
            Err(e) => {
                let message = e.to_string();
                warn!(turn_id = %state.turn_id(), "Structured-data resolution failed: {}", message);
                state
                    .with_resolution(ResolutionResult::Failure {
                        message: message.clone(),
                    })
                    .with_error(message)
            }
        }
    }
}
