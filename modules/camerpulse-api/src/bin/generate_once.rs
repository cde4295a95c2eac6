//! Runs one generation pass and prints the response envelope as JSON.
//!
//! Intended for cron or a scheduler. Exits non-zero when the run fails.

use std::process::ExitCode;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use ai_client::OpenAi;
use camerpulse_api::envelope::run_envelope;
use camerpulse_common::Config;
use camerpulse_pipeline::PollGenerator;
use camerpulse_store::PulseStore;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("camerpulse=info".parse()?))
        .init();

    let config = Config::from_env()?;
    config.log_redacted();

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await?;

    let mut openai = OpenAi::new(&config.openai_api_key, &config.openai_model)?;
    if let Some(url) = &config.openai_base_url {
        openai = openai.with_base_url(url);
    }

    let generator = PollGenerator::new(Arc::new(PulseStore::new(pool)), Arc::new(openai));
    let result = generator.run().await;
    let (status, body) = run_envelope(&result);

    println!("{}", serde_json::to_string_pretty(&body)?);

    if status.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
