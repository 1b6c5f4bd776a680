use budget_assistant::{AppConfig, AssistantMode, BudgetAssistant};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing; stdout belongs to the session
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::from_env()?;

    let mode = if std::env::args().skip(1).any(|arg| arg == "--agent") {
        AssistantMode::Agent
    } else {
        AssistantMode::Router
    };

    let assistant = BudgetAssistant::from_config(&config)?;

    info!(?mode, "Budget assistant session starting");

    let mut stdout = tokio::io::stdout();
    assistant
        .run_session(BufReader::new(tokio::io::stdin()), &mut stdout, mode)
        .await?;

    Ok(())
}
