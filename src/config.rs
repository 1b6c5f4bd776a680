//! Runtime configuration
//!
//! Values come from the process environment (optionally seeded from `.env`).

use crate::error::AssistantError;
use crate::Result;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub max_rows: usize,
}

#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub symbol: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub database: DatabaseConfig,
    pub market: MarketConfig,
    pub agent_max_rounds: usize,
    pub api_port: u16,
}

impl AppConfig {
    /// Load `.env` if present, then read the environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let database_url = match lookup("DATABASE_URL") {
            Some(url) => url,
            None => format!(
                "postgres://{}:{}@{}:{}/{}",
                get("DB_USER", "admin"),
                get("DB_PASSWORD", "admin"),
                get("DB_HOST", "localhost"),
                get("DB_PORT", "5433"),
                get("DB_NAME", "budget_assistant"),
            ),
        };

        let api_port = match lookup("PORT").or_else(|| lookup("API_PORT")) {
            Some(raw) => parse_value("PORT", &raw)?,
            None => 8080,
        };

        Ok(Self {
            llm: LlmConfig {
                api_key: get("GEMINI_API_KEY", ""),
                model: get("GEMINI_MODEL", "gemini-2.0-flash"),
                temperature: parse_value("LLM_TEMPERATURE", &get("LLM_TEMPERATURE", "0.4"))?,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_value("DB_MAX_CONNECTIONS", &get("DB_MAX_CONNECTIONS", "5"))?,
                max_rows: parse_value("SQL_MAX_ROWS", &get("SQL_MAX_ROWS", "200"))?,
            },
            market: MarketConfig {
                symbol: get("MARKET_SYMBOL", "AAPL"),
                base_url: get("MARKET_DATA_BASE_URL", "https://query1.finance.yahoo.com"),
            },
            agent_max_rounds: parse_value("AGENT_MAX_ROUNDS", &get("AGENT_MAX_ROUNDS", "5"))?,
            api_port,
        })
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| AssistantError::Config(format!("{} has invalid value '{}'", key, raw)))
}
