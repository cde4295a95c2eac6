//! Applies pending SQLx migrations to DATABASE_URL.
//!
//! Migrations are embedded at compile time; run this before starting the API.

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    println!("Running database migrations...");

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;

    camerpulse_store::migrate(&pool).await?;

    println!("Migrations completed successfully.");

    Ok(())
}
