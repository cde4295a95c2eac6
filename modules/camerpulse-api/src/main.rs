use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_client::OpenAi;
use camerpulse_api::{build_router, AppState};
use camerpulse_common::Config;
use camerpulse_pipeline::PollGenerator;
use camerpulse_store::PulseStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env().add_directive("camerpulse=info".parse()?))
        .init();

    let config = Config::from_env()?;
    config.log_redacted();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    camerpulse_store::migrate(&pool).await?;

    let mut openai = OpenAi::new(&config.openai_api_key, &config.openai_model)?;
    if let Some(url) = &config.openai_base_url {
        openai = openai.with_base_url(url);
    }

    let state = Arc::new(AppState {
        generator: PollGenerator::new(Arc::new(PulseStore::new(pool)), Arc::new(openai)),
    });
    let app = build_router(state);

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("CamerPulse API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
