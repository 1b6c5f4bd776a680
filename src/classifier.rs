//! Query Classifier
//!
//! Decides whether a query needs the user's financial store or can be answered
//! from general knowledge. Anything but a clear YES falls back to general knowledge,
//! including a failed classification call.

use crate::gemini::TextGenerator;
use crate::models::RoutingDecision;
use std::sync::Arc;
use tracing::{debug, warn};

/// Tables the structured-data path can answer about
pub const STRUCTURED_ENTITIES: &[&str] = &["expense", "income", "investment"];

pub struct QueryClassifier {
    llm: Arc<dyn TextGenerator>,
}

impl QueryClassifier {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    pub async fn classify(&self, query: &str) -> RoutingDecision {
        let prompt = build_prompt(query);

        match self.llm.generate(&prompt).await {
            Ok(raw) => {
                let decision = parse_decision(&raw);
                debug!(raw = %raw.trim(), %decision, "Classifier answered");
                decision
            }
            Err(e) => {
                warn!("Classification failed, defaulting to general knowledge: {}", e);
                RoutingDecision::GeneralKnowledge
            }
        }
    }
}

/// Map the capability's answer onto a routing decision
pub fn parse_decision(raw: &str) -> RoutingDecision {
    if raw.trim().eq_ignore_ascii_case("YES") {
        RoutingDecision::NeedsStructuredData
    } else {
        RoutingDecision::GeneralKnowledge
    }
}

fn build_prompt(query: &str) -> String {
    let tables = STRUCTURED_ENTITIES
        .iter()
        .map(|t| format!("'{}'", t))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"Determine if the following query requires access to the user's financial database:

Query: {query}

Respond with only 'YES' if the query is specifically about the user's personal financial data
that would be stored in the {tables} tables.

Respond with only 'NO' if the query is general knowledge or does not relate to the user's
financial data stored in these specific tables."#
    )
}
