//! Tool dispatcher - capability-selecting agent loop
//!
//! Each round the model either answers or asks for tool calls. Tool results
//! (including failures) are folded back into the next prompt. After
//! `max_rounds` tool rounds the model is asked for a direct answer.

use crate::error::AssistantError;
use crate::formatter::error_response;
use crate::gemini::TextGenerator;
use crate::models::{ChatMessage, ResolutionResult, ToolInput, TurnResponse};
use crate::state::SessionState;
use crate::tools::ToolRegistry;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const MAX_CALLS_PER_ROUND: usize = 8;

const BUDGET_EXHAUSTED_RESPONSE: &str =
    "I wasn't able to finish answering within the allowed number of tool calls.";

const SYSTEM_PROMPT: &str = r#"You are a helpful financial assistant that can answer questions about the user's personal finances.
You have access to the user's financial database which contains information about their expenses, income, and investments.
You can also provide current stock market information.

When analyzing financial data:
- For expenses: Focus on categories, amounts, dates, and patterns
- For income: Look at sources, frequency, and trends
- For investments: Consider performance, allocation, and growth

Always format currency values properly with the appropriate symbol.
Present numerical data in a clear, readable format.
When showing date ranges or time periods, be specific about the timeframe.

If you need to perform calculations:
- Be precise with mathematical operations
- Show your reasoning when appropriate
- Round monetary values to two decimal places

If you don't know the answer to a question, say so. Do not make up information."#;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Tool-selection rounds before a direct answer is forced
    pub max_rounds: usize,
    /// Most recent history entries included in the prompt
    pub max_history_messages: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            max_history_messages: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub input: Value,
}

/// What the model asked for in one round
#[derive(Debug, Clone, PartialEq)]
pub enum AgentStep {
    Answer(String),
    CallTools(Vec<ToolCall>),
}

#[derive(Debug, Deserialize)]
struct AgentReply {
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
    answer: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolObservation {
    pub round: usize,
    pub tool: String,
    pub input: Value,
    pub success: bool,
    pub output: Value,
}

pub struct ToolDispatcher {
    llm: Arc<dyn TextGenerator>,
    registry: ToolRegistry,
    config: DispatcherConfig,
}

impl ToolDispatcher {
    pub fn new(llm: Arc<dyn TextGenerator>, registry: ToolRegistry, config: DispatcherConfig) -> Self {
        Self {
            llm,
            registry,
            config,
        }
    }

    pub async fn process(&self, query: &str, prior_history: Vec<ChatMessage>) -> TurnResponse {
        self.run_turn(SessionState::new(query, prior_history))
            .await
            .into_response()
    }

    pub async fn run_turn(&self, state: SessionState) -> SessionState {
        let start_time = Instant::now();
        let turn_id = state.turn_id();

        let history = recent_history(state.conversation_history(), self.config.max_history_messages);
        let state = state.begin_turn();
        let mut observations: Vec<ToolObservation> = Vec::new();

        info!(%turn_id, query = %state.query(), tools = ?self.registry.list(), "Dispatcher: turn started");

        for round in 1..=self.config.max_rounds {
            let prompt = self.build_prompt(state.query(), &history, &observations, false);

            let reply = match self.llm.generate(&prompt).await {
                Ok(reply) => reply,
                Err(e) => return fail(state, e),
            };

            match parse_agent_reply(&reply) {
                AgentStep::Answer(answer) => {
                    info!(
                        %turn_id,
                        round,
                        tool_calls = observations.len(),
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Dispatcher: answered"
                    );
                    return finish(state, answer);
                }
                AgentStep::CallTools(calls) if calls.is_empty() => {
                    warn!(%turn_id, round, "Reply carried neither tool calls nor an answer");
                }
                AgentStep::CallTools(calls) => {
                    debug!(%turn_id, round, requested = calls.len(), "Tool calls requested");
                    for call in calls.into_iter().take(MAX_CALLS_PER_ROUND) {
                        observations.push(self.invoke(round, call).await);
                    }
                }
            }
        }

        warn!(
            %turn_id,
            max_rounds = self.config.max_rounds,
            "Tool round budget exhausted, forcing direct answer"
        );

        let prompt = self.build_prompt(state.query(), &history, &observations, true);
        match self.llm.generate(&prompt).await {
            Ok(reply) => match parse_agent_reply(&reply) {
                AgentStep::Answer(answer) => finish(state, answer),
                AgentStep::CallTools(_) => finish(state, BUDGET_EXHAUSTED_RESPONSE.to_string()),
            },
            Err(e) => fail(state, e),
        }
    }

    async fn invoke(&self, round: usize, call: ToolCall) -> ToolObservation {
        let input = ToolInput {
            tool_name: call.tool.clone(),
            parameters: call.input.clone(),
        };

        let started = Instant::now();
        let result = match self.registry.get(&call.tool) {
            Some(tool) => tool.execute(&input).await,
            None => Err(AssistantError::ToolNotFound(call.tool.clone())),
        };

        let (success, output) = match result {
            Ok(out) => (out.success, out.data),
            Err(e) => {
                warn!(tool_name = %call.tool, round, "Tool failed: {}", e);
                (false, json!({ "error": e.to_string() }))
            }
        };

        debug!(
            tool_name = %call.tool,
            round,
            success,
            execution_time_ms = started.elapsed().as_millis() as u64,
            "Tool invoked"
        );

        ToolObservation {
            round,
            tool: call.tool,
            input: call.input,
            success,
            output,
        }
    }

    fn build_prompt(
        &self,
        query: &str,
        history: &[ChatMessage],
        observations: &[ToolObservation],
        force_answer: bool,
    ) -> String {
        let mut prompt = String::from(SYSTEM_PROMPT);

        if force_answer {
            prompt.push_str(
                "\n\nNo more tools may be called. Answer the user now using only the tool \
                 results below; if they are not enough, say what you could not find.\n\
                 Respond with JSON: {\"answer\": \"<your answer>\"}",
            );
        } else {
            prompt.push_str("\n\nAvailable tools:\n");
            prompt.push_str(&self.registry.catalog());
            prompt.push_str(
                "\n\nRespond with ONLY valid JSON, one of:\n\
                 {\"tool_calls\": [{\"tool\": \"<tool name>\", \"input\": {...}}]}\n\
                 {\"answer\": \"<final answer for the user>\"}\n\
                 If a tool returned an error, decide whether to try a different tool or explain the problem.",
            );
        }

        if !history.is_empty() {
            prompt.push_str("\n\nConversation so far:\n");
            for msg in history {
                prompt.push_str(&format!("{}: {}\n", msg.role, msg.content));
            }
        }

        prompt.push_str(&format!("\nUser question: {}\n", query));

        if !observations.is_empty() {
            prompt.push_str("\nTool results:\n");
            for obs in observations {
                prompt.push_str(&format!(
                    "[round {}] {}({}) -> {}\n",
                    obs.round, obs.tool, obs.input, obs.output
                ));
            }
        }

        prompt
    }
}

fn recent_history(history: &[ChatMessage], limit: usize) -> Vec<ChatMessage> {
    let skip = history.len().saturating_sub(limit);
    history[skip..].to_vec()
}

fn finish(state: SessionState, answer: String) -> SessionState {
    state
        .with_resolution(ResolutionResult::Success {
            output: answer.clone(),
        })
        .complete(answer)
}

fn fail(state: SessionState, error: AssistantError) -> SessionState {
    let message = error.to_string();
    warn!(turn_id = %state.turn_id(), "Dispatcher generation failed: {}", message);
    let response = error_response(&message);
    state
        .with_resolution(ResolutionResult::Failure {
            message: message.clone(),
        })
        .with_error(message)
        .complete(response)
}

/// Parse a model reply. Anything that is not the JSON protocol is taken as the answer;
/// a protocol reply with neither calls nor an answer is an empty round.
pub fn parse_agent_reply(raw: &str) -> AgentStep {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    match serde_json::from_str::<AgentReply>(cleaned) {
        Ok(reply) if !reply.tool_calls.is_empty() => AgentStep::CallTools(reply.tool_calls),
        Ok(AgentReply {
            answer: Some(answer),
            ..
        }) if !answer.trim().is_empty() => AgentStep::Answer(answer),
        // Protocol reply with nothing to do; never surfaced as the answer
        Ok(_) => AgentStep::CallTools(Vec::new()),
        Err(_) => AgentStep::Answer(raw.trim().to_string()),
    }
}
