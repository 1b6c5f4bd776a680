use budget_assistant::{api::start_server, AppConfig, BudgetAssistant};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;

    if config.llm.api_key.is_empty() {
        warn!("GEMINI_API_KEY not set; see .env.example");
    }

    info!("Budget Assistant - API Server");
    info!("Port: {}", config.api_port);

    let assistant = Arc::new(BudgetAssistant::from_config(&config)?);

    info!("Assistant initialized, starting API server");

    start_server(assistant, config.api_port).await?;

    Ok(())
}
