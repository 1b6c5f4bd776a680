//! Tool trait and registry
//!
//! Named capabilities the tool dispatcher can pick from on each round.

use crate::database::StructuredDataSource;
use crate::error::AssistantError;
use crate::formatter::NO_DATABASE_RESPONSE;
use crate::market::MarketDataSource;
use crate::models::{ToolInput, ToolOutput};
use crate::Result;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Trait for a single tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput>;
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// "- name: description" lines, in name order
    pub fn catalog(&self) -> String {
        self.tools
            .values()
            .map(|t| format!("- {}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Accept `{"query": "..."}`, `{"input": "..."}` or a bare JSON string
fn require_query(input: &ToolInput) -> Result<String> {
    let query = match &input.parameters {
        Value::String(s) => Some(s.as_str()),
        params => params
            .get("query")
            .and_then(|v| v.as_str())
            .or_else(|| params.get("input").and_then(|v| v.as_str())),
    };

    query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            AssistantError::InvalidToolInput("Expected 'query' in tool input".to_string())
        })
}

pub struct FinancialDatabaseTool {
    source: Arc<dyn StructuredDataSource>,
}

impl FinancialDatabaseTool {
    pub fn new(source: Arc<dyn StructuredDataSource>) -> Self {
        Self { source }
    }
}

#[async_trait::async_trait]
impl Tool for FinancialDatabaseTool {
    fn name(&self) -> &str {
        "query_financial_database"
    }

    fn description(&self) -> &str {
        "Query the user's financial database for expenses, income, and investments. \
         Input: {\"query\": \"<natural language question>\"}. \
         Examples: \"What were my expenses last month?\", \"How much did I spend on groceries in 2023?\", \
         \"What is my average monthly income?\", \"Show me my investment portfolio\""
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let query = require_query(input)?;
        let payload = self.source.resolve(&query).await?;
        let output = payload
            .output
            .filter(|o| !o.trim().is_empty())
            .unwrap_or_else(|| NO_DATABASE_RESPONSE.to_string());

        Ok(ToolOutput {
            success: true,
            data: json!({ "output": output }),
            error: None,
        })
    }
}

pub struct MarketSnapshotTool {
    source: Arc<dyn MarketDataSource>,
    description: String,
}

impl MarketSnapshotTool {
    pub fn new(source: Arc<dyn MarketDataSource>) -> Self {
        let description = format!(
            "Get current {} stock data: price, daily change percentage, and weekly performance. \
             Use when the user asks how {} stock is doing or about their {} investment. Input: {{}}",
            source.symbol(),
            source.symbol(),
            source.symbol()
        );
        Self {
            source,
            description,
        }
    }
}

#[async_trait::async_trait]
impl Tool for MarketSnapshotTool {
    fn name(&self) -> &str {
        "get_stock_snapshot"
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn execute(&self, _input: &ToolInput) -> Result<ToolOutput> {
        let snapshot = self.source.snapshot().await?;

        Ok(ToolOutput {
            success: true,
            data: serde_json::to_value(snapshot)?,
            error: None,
        })
    }
}

/// Registry with the database and market-data tools
pub fn create_default_registry(
    store: Arc<dyn StructuredDataSource>,
    market: Arc<dyn MarketDataSource>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(FinancialDatabaseTool::new(store)));
    registry.register(Arc::new(MarketSnapshotTool::new(market)));
    registry
}
