//! Assistant facade
//!
//! Wires the real capabilities from configuration and exposes both entry points.

use crate::config::AppConfig;
use crate::database::{SqlAgent, StructuredDataSource};
use crate::dispatcher::{DispatcherConfig, ToolDispatcher};
use crate::gemini::{GeminiClient, TextGenerator};
use crate::market::{MarketDataSource, YahooMarketData};
use crate::models::{ChatMessage, TurnResponse};
use crate::router::QueryRouter;
use crate::tools::create_default_registry;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::info;

/// Which orchestration answers a turn
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssistantMode {
    /// Fixed classifier → resolver → formatter path
    #[default]
    Router,
    /// Tool-selecting agent loop
    Agent,
}

pub struct BudgetAssistant {
    router: QueryRouter,
    dispatcher: ToolDispatcher,
}

impl BudgetAssistant {
    pub fn new(router: QueryRouter, dispatcher: ToolDispatcher) -> Self {
        Self { router, dispatcher }
    }

    /// Build from capabilities; both entry points share them
    pub fn from_capabilities(
        llm: Arc<dyn TextGenerator>,
        store: Arc<dyn StructuredDataSource>,
        market: Arc<dyn MarketDataSource>,
        dispatcher_config: DispatcherConfig,
    ) -> Self {
        let router = QueryRouter::from_capabilities(llm.clone(), store.clone());
        let registry = create_default_registry(store, market);
        let dispatcher = ToolDispatcher::new(llm, registry, dispatcher_config);
        Self::new(router, dispatcher)
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let llm: Arc<dyn TextGenerator> = Arc::new(GeminiClient::new(&config.llm)?);
        let store: Arc<dyn StructuredDataSource> =
            Arc::new(SqlAgent::connect_lazy(&config.database, llm.clone())?);
        let market: Arc<dyn MarketDataSource> = Arc::new(YahooMarketData::new(&config.market)?);

        info!(
            model = %config.llm.model,
            symbol = %config.market.symbol,
            max_rounds = config.agent_max_rounds,
            "Budget assistant initialized"
        );

        Ok(Self::from_capabilities(
            llm,
            store,
            market,
            DispatcherConfig {
                max_rounds: config.agent_max_rounds,
                ..DispatcherConfig::default()
            },
        ))
    }

    pub async fn process(
        &self,
        query: &str,
        prior_history: Vec<ChatMessage>,
        mode: AssistantMode,
    ) -> TurnResponse {
        match mode {
            AssistantMode::Router => self.router.process(query, prior_history).await,
            AssistantMode::Agent => self.dispatcher.process(query, prior_history).await,
        }
    }

    /// Line-oriented chat session; history carries across turns until EOF or `exit`
    pub async fn run_session<R, W>(
        &self,
        input: R,
        output: &mut W,
        mode: AssistantMode,
    ) -> Result<Vec<ChatMessage>>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let mut history: Vec<ChatMessage> = Vec::new();

        output
            .write_all(
                format!(
                    "Budget assistant ({:?} mode). Ask about your expenses, income, or investments.\n\
                     Type 'exit' to quit.\n\n",
                    mode
                )
                .as_bytes(),
            )
            .await?;

        loop {
            output.write_all(b"You: ").await?;
            output.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let query = line.trim();

            if query.is_empty() {
                continue;
            }
            if matches!(query.to_lowercase().as_str(), "exit" | "quit") {
                break;
            }

            let response = self.process(query, history, mode).await;
            output
                .write_all(format!("Assistant: {}\n\n", response.final_response).as_bytes())
                .await?;
            history = response.conversation_history;
        }

        output.flush().await?;
        info!(turns = history.len() / 2, "Session ended");
        Ok(history)
    }
}
