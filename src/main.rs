use anyhow::Result;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt};

use ebook_kilat::config::RelayConfig;
use ebook_kilat::services::llm::LLMClient;
use ebook_kilat::{AppState, build_router};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = RelayConfig::from_env()?;
    let llm_client = LLMClient::new(&config.vendor)?;
    if !llm_client.has_credential() {
        tracing::warn!("GEMINI_API_KEY is not set; generation requests will be rejected");
    }

    let app = build_router(AppState::new(llm_client));

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Relay listening on {}", listener.local_addr()?);
    tracing::info!("Endpoints: GET /api/health, POST /api/generate-outline, POST /api/generate-chapter");
    axum::serve(listener, app).await?;

    Ok(())
}
