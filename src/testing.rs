//! Scripted capabilities for unit tests

use crate::database::StructuredDataSource;
use crate::error::AssistantError;
use crate::gemini::TextGenerator;
use crate::market::MarketDataSource;
use crate::models::{MarketSnapshot, StructuredPayload};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Replies with queued answers in order and records every prompt
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AssistantError::Llm("script exhausted".to_string()))
    }
}

pub struct FailingGenerator {
    message: String,
}

impl FailingGenerator {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(AssistantError::Llm(self.message.clone()))
    }
}

/// Structured-data capability returning a fixed payload or a connection failure
pub struct StaticSource {
    payload: Option<StructuredPayload>,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl StaticSource {
    pub fn answering(output: &str) -> Self {
        Self::with_payload(StructuredPayload::with_output(output))
    }

    pub fn with_payload(payload: StructuredPayload) -> Self {
        Self {
            payload: Some(payload),
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unreachable(message: &str) -> Self {
        Self {
            payload: None,
            failure: Some(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StructuredDataSource for StaticSource {
    async fn resolve(&self, _query: &str) -> Result<StructuredPayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match (&self.payload, &self.failure) {
            (_, Some(message)) => Err(AssistantError::Connection(message.clone())),
            (Some(payload), None) => Ok(payload.clone()),
            (None, None) => Ok(StructuredPayload::default()),
        }
    }
}

pub struct StaticMarket {
    failure: Option<String>,
}

impl StaticMarket {
    pub fn healthy() -> Self {
        Self { failure: None }
    }

    pub fn down(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl MarketDataSource for StaticMarket {
    fn symbol(&self) -> &str {
        "AAPL"
    }

    async fn snapshot(&self) -> Result<MarketSnapshot> {
        if let Some(message) = &self.failure {
            return Err(AssistantError::MarketData(message.clone()));
        }

        Ok(MarketSnapshot {
            name: "Apple Inc.".to_string(),
            symbol: "AAPL".to_string(),
            price: 212.44,
            currency: "USD".to_string(),
            day_change_percent: Some(1.25),
            week_change_percent: Some(-0.8),
            timestamp: Utc::now(),
        })
    }
}
