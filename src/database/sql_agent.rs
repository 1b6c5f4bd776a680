//! Natural-language to SQL agent over the Postgres finance store
//!
//! question → generated SELECT → rows as JSON → generated answer

use super::guard::{ensure_read_only, extract_sql};
use super::StructuredDataSource;
use crate::config::DatabaseConfig;
use crate::error::AssistantError;
use crate::gemini::TextGenerator;
use crate::models::StructuredPayload;
use crate::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Rows handed to the answer prompt are cut off after this many characters
const MAX_ROWS_CHARS: usize = 20_000;

const SCHEMA: &str = r#"Table "expense":
  id uuid, amount integer, description varchar NULL, category varchar,
  importance varchar NULL, date timestamp, location varchar NULL,
  "createdAt" timestamp, "updatedAt" timestamp
Table "income":
  id uuid, amount integer, source varchar, date timestamp,
  description varchar NULL, "createdAt" timestamp, "updatedAt" timestamp
Table "investment":
  id uuid, amount integer, type varchar, date timestamp,
  description varchar NULL, "createdAt" timestamp, "updatedAt" timestamp"#;

const ANALYST_GUIDANCE: &str = r#"You are an AI assistant with expertise in personal finance. You have access to a PostgreSQL database
containing the user's financial data across three specific tables: 'expense', 'income', and 'investment'.

When analyzing financial data:
- For expenses: Focus on categories, amounts, dates, and patterns
- For income: Look at sources, frequency, and trends
- For investments: Consider performance, allocation, and growth"#;

pub struct SqlAgent {
    pool: PgPool,
    llm: Arc<dyn TextGenerator>,
    max_rows: usize,
}

impl SqlAgent {
    pub fn new(pool: PgPool, llm: Arc<dyn TextGenerator>, max_rows: usize) -> Self {
        Self {
            pool,
            llm,
            max_rows,
        }
    }

    /// Build a lazily connecting pool; the first query opens the connection
    pub fn connect_lazy(config: &DatabaseConfig, llm: Arc<dyn TextGenerator>) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_lazy(&config.url)
            .map_err(|e| AssistantError::Connection(format!("Failed to connect to database: {}", e)))?;

        info!("Finance store pool configured");
        Ok(Self::new(pool, llm, config.max_rows))
    }

    async fn translate(&self, question: &str) -> Result<String> {
        let raw = self.llm.generate(&build_sql_prompt(question)).await?;
        let sql = extract_sql(&raw);
        ensure_read_only(&sql)?;
        debug!(%sql, "Generated SQL");
        Ok(sql)
    }

    async fn execute(&self, sql: &str) -> Result<String> {
        let wrapped = format!(
            "SELECT COALESCE(json_agg(t), '[]'::json)::text FROM (SELECT * FROM ({}) AS q LIMIT {}) AS t",
            sql, self.max_rows
        );

        let mut tx = self.pool.begin().await.map_err(map_sql_error)?;

        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(map_sql_error)?;

        let rows: String = sqlx::query_scalar(&wrapped)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sql_error)?;

        tx.rollback().await.map_err(map_sql_error)?;

        Ok(rows)
    }
}

#[async_trait]
impl StructuredDataSource for SqlAgent {
    async fn resolve(&self, query: &str) -> Result<StructuredPayload> {
        let sql = self.translate(query).await?;
        let rows = self.execute(&sql).await?;
        debug!(rows_len = rows.len(), "Query executed");

        let answer = self
            .llm
            .generate(&build_answer_prompt(query, &sql, &rows))
            .await?;

        let answer = answer.trim();
        if answer.is_empty() {
            return Ok(StructuredPayload::default());
        }
        Ok(StructuredPayload::with_output(answer))
    }
}

fn build_sql_prompt(question: &str) -> String {
    format!(
        r#"{ANALYST_GUIDANCE}

Schema:
{SCHEMA}

Write ONE PostgreSQL SELECT statement that answers the question below.
Rules:
- Read-only: SELECT or WITH only
- Quote camelCase columns with double quotes, e.g. "createdAt"
- Use the date column for time periods relative to CURRENT_DATE
- Return ONLY the SQL, no explanation

Question: {question}"#
    )
}

fn build_answer_prompt(question: &str, sql: &str, rows: &str) -> String {
    let rows: String = rows.chars().take(MAX_ROWS_CHARS).collect();

    format!(
        r#"{ANALYST_GUIDANCE}

Always format currency values properly with the appropriate symbol.
Present numerical data in a clear, readable format.
When showing date ranges or time periods, be specific about the timeframe.
Be precise with mathematical operations and round monetary values to two decimal places.
If the rows do not answer the question, say so. Do not make up information.

Question: {question}
SQL used: {sql}
Rows (JSON): {rows}

Answer:"#
    )
}

fn map_sql_error(e: sqlx::Error) -> AssistantError {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Configuration(_) => AssistantError::Connection(e.to_string()),
        sqlx::Error::Database(db) => AssistantError::Database(db.message().to_string()),
        other => AssistantError::Sql(other),
    }
}
